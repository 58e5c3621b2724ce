use super::{SESSION_AUTH_TIMESTAMP, SESSION_EMAIL, SESSION_USER_ID};
use crate::error::{AppError, Result};
use crate::models::PublicUser;
use crate::services::auth_service::LoginRequest;
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    #[serde(rename = "contrasena")]
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(rename = "mensaje")]
    message: String,
    #[serde(rename = "usuario")]
    user: PublicUser,
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    session: Session,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>> {
    let request = LoginRequest {
        email: body.email,
        password: body.password,
    };

    let user = app_state.auth_service.authenticate(request).await?;

    // fresh session id on every login
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session cycle failed: {e}")))?;
    session
        .insert(SESSION_USER_ID, user.id)
        .await
        .map_err(|e| AppError::Internal(format!("session insert failed: {e}")))?;
    session
        .insert(SESSION_EMAIL, &user.email)
        .await
        .map_err(|e| AppError::Internal(format!("session insert failed: {e}")))?;
    session
        .insert(SESSION_AUTH_TIMESTAMP, chrono::Utc::now().timestamp())
        .await
        .map_err(|e| AppError::Internal(format!("session insert failed: {e}")))?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user: PublicUser::from(&user),
    }))
}

pub async fn logout_handler(session: Session) -> impl IntoResponse {
    if let Err(e) = session.flush().await {
        tracing::warn!(error = %e, "failed to flush session on logout");
    }
    "Logged out"
}

pub async fn me_handler(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Json<PublicUser>> {
    let user_id = session
        .get::<i64>(SESSION_USER_ID)
        .await
        .map_err(|e| AppError::Internal(format!("session lookup failed: {e}")))?
        .ok_or(AppError::Unauthorized)?;

    let user = app_state.auth_service.get_user_by_id(user_id).await?;
    Ok(Json(PublicUser::from(&user)))
}
