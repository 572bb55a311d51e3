// Bearer token check for the management API.
// Handlers call `validate_request` first and return its response on failure.

use actix_web::{HttpRequest, HttpResponse};

pub fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").trim().to_string())
        .filter(|s| !s.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

pub fn validate_request(api_token: &str, req: &HttpRequest) -> Result<(), HttpResponse> {
    let token = extract_token(req).ok_or_else(|| {
        HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "No authorization token provided"
        }))
    })?;

    if constant_time_eq(token.as_bytes(), api_token.as_bytes()) {
        Ok(())
    } else {
        log::warn!("Rejected request to {} with an invalid API token", req.path());
        Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid API token"
        })))
    }
}
