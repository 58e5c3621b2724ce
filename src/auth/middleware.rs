use super::SESSION_USER_ID;
use crate::error::AppError;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    match session.get::<i64>(SESSION_USER_ID).await {
        Ok(Some(_)) => next.run(request).await,
        Ok(None) => AppError::Unauthorized.into_response(),
        Err(e) => AppError::Internal(format!("session lookup failed: {e}")).into_response(),
    }
}
