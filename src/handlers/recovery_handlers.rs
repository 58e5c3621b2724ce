use crate::error::Result;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct RecoveryRequestBody {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordBody {
    #[serde(default)]
    token: String,
    #[serde(rename = "nuevaPassword", default)]
    new_password: String,
}

/// `POST /api/recuperar-password`
pub async fn request_recovery_handler(
    State(app_state): State<AppState>,
    Json(body): Json<RecoveryRequestBody>,
) -> Result<&'static str> {
    let issued = app_state
        .recovery_service
        .request_recovery(&body.email)
        .await?;

    if issued.delivered {
        Ok("Recovery email sent. Check your inbox.")
    } else {
        Ok("A recovery link was generated but the email could not be sent. Please contact support.")
    }
}

/// `POST /api/restablecer-password`
pub async fn reset_password_handler(
    State(app_state): State<AppState>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<&'static str> {
    app_state
        .recovery_service
        .reset_with_token(&body.token, &body.new_password)
        .await?;

    Ok("Password updated. You can now log in.")
}
