//! Standard success/error response envelope.

use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

/// Uniform envelope rendered for every API response, success or error.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    pub status: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ErrorInfo {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Upper-snake label for a status code, e.g. `NOT_FOUND`.
pub fn status_label(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
        .replace(' ', "_")
}

fn envelope<T: Serialize>(status: StatusCode, message: String, data: Option<T>) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        message,
        status_code: status.as_u16(),
        status: status_label(status),
        data,
        error: None,
        timestamp: Utc::now().to_rfc3339(),
    }
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::OK,
        Json(envelope(StatusCode::OK, message.into(), Some(data))),
    )
}

pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::CREATED,
        Json(envelope(StatusCode::CREATED, message.into(), Some(data))),
    )
}

/// OK envelope with no payload (e.g. delete).
pub fn ok_empty(message: impl Into<String>) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    (
        StatusCode::OK,
        Json(envelope(StatusCode::OK, message.into(), None)),
    )
}

pub fn failure(
    message: String,
    status_code: u16,
    status: String,
    code: &str,
    details: Option<serde_json::Value>,
) -> ApiResponse<serde_json::Value> {
    ApiResponse {
        success: false,
        message,
        status_code,
        status,
        data: None,
        error: Some(ErrorInfo {
            code: code.to_string(),
            details,
        }),
        timestamp: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(status_label(StatusCode::OK), "OK");
        assert_eq!(status_label(StatusCode::NOT_FOUND), "NOT_FOUND");
        assert_eq!(
            status_label(StatusCode::INTERNAL_SERVER_ERROR),
            "INTERNAL_SERVER_ERROR"
        );
    }

    #[test]
    fn success_envelope_shape() {
        let (status, body) = created("created", serde_json::json!({"id": 1}));
        assert_eq!(status, StatusCode::CREATED);
        let v = serde_json::to_value(&body.0).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["statusCode"], 201);
        assert_eq!(v["status"], "CREATED");
        assert_eq!(v["data"]["id"], 1);
        assert!(v.get("error").is_none());
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn error_envelope_shape() {
        let body = failure(
            "boom".into(),
            409,
            "CONFLICT".into(),
            "conflict",
            Some(serde_json::json!([{"fields": ["email"]}])),
        );
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["statusCode"], 409);
        assert_eq!(v["error"]["code"], "conflict");
        assert!(v["error"]["details"].is_array());
    }
}
