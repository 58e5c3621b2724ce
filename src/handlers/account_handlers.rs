use crate::error::Result;
use crate::services::user_service::RegisterRequest;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct RegisterBody {
    #[serde(rename = "nombre")]
    name: String,
    email: String,
    #[serde(rename = "contrasena")]
    password: String,
    #[serde(rename = "edad", default)]
    age: Option<i64>,
}

#[derive(Deserialize)]
pub struct VerifyBody {
    token: String,
}

pub async fn register_handler(
    State(app_state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<&'static str> {
    let registration = app_state
        .user_service
        .register(RegisterRequest {
            name: body.name,
            email: body.email,
            password: body.password,
            age: body.age,
        })
        .await?;

    if registration.delivered {
        Ok("Registration successful. Check your email to verify the account.")
    } else {
        Ok("Registration saved, but the verification email could not be sent. Please contact support.")
    }
}

pub async fn verify_handler(
    State(app_state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Result<&'static str> {
    app_state.user_service.verify_email(&body.token).await?;
    Ok("Account verified. You can now log in.")
}
