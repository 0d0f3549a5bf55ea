//! Shared response envelope types for API handlers.
//!
//! Successful responses use a `{ "success": true, "data": ... }` envelope;
//! actions such as cancel and restart add a human-readable `message`.

use serde::Serialize;

/// Standard `{ "success": true, "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// `{ "success": true, "message": "...", "data": T }` for job actions.
#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}
