// src/models/class.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A school class. `qr_token` is generated once at creation and never changes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub grade: String,
    pub major: Option<String>,
    pub qr_token: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateClassPayload {
    pub name: String,
    pub grade: String,
    #[serde(default)]
    pub major: Option<String>,
}

/// The printable QR code of a class: the encoded text and the rendered SVG.
#[derive(Debug, Serialize)]
pub struct ClassQrPayload {
    pub class: Class,
    pub qr_payload: String,
    pub qr_image: String, // image/svg+xml
}
