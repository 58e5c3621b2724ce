use crate::error::Result;
use crate::services::ContactRequest;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ContactBody {
    #[serde(rename = "nombre", default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(rename = "asunto", default)]
    subject: Option<String>,
    #[serde(rename = "mensaje", default)]
    message: String,
}

pub async fn contact_handler(
    State(app_state): State<AppState>,
    Json(body): Json<ContactBody>,
) -> Result<&'static str> {
    app_state
        .contact_service
        .submit(ContactRequest {
            name: body.name,
            email: body.email,
            subject: body.subject,
            message: body.message,
        })
        .await?;

    Ok("Message sent. We will get back to you soon.")
}
