use actix_web::{web, HttpResponse, Responder};

use crate::webhook::{WebhookEnvelope, WebhookError};
use crate::AppState;

/// Headroom for the envelope around an inline media payload
const ENVELOPE_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Largest accepted body: the media cap after base64 growth (4/3) plus the envelope
pub fn body_limit(max_media_bytes: u64) -> usize {
    let encoded = (max_media_bytes as usize).div_ceil(3) * 4;
    encoded + ENVELOPE_OVERHEAD_BYTES
}

/// Provider routes. Events may inline media as base64, so the body limit follows
/// `max_media_bytes` instead of the 256 KiB actix default.
pub fn config(max_media_bytes: u64) -> impl FnOnce(&mut web::ServiceConfig) {
    let limit = body_limit(max_media_bytes);
    move |cfg| {
        cfg.service(
            web::resource("/webhook/evolution")
                .app_data(web::PayloadConfig::new(limit))
                .route(web::post().to(receive_event)),
        );
        // "Webhook by events" mode appends the event name; the body's `event` wins
        cfg.service(
            web::resource("/webhook/evolution/{event}")
                .app_data(web::PayloadConfig::new(limit))
                .route(web::post().to(receive_event)),
        );
    }
}

fn error_response(e: &WebhookError) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": e.to_string()
    }))
}

/// Receive one provider event. Always 200 on success, 400 on any failure.
async fn receive_event(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::warn!("[WEBHOOK] Rejected malformed body: {}", e);
            return error_response(&WebhookError::InvalidPayload(e.to_string()));
        }
    };

    match state.webhook.process(&envelope).await {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": outcome.message
        })),
        Err(e) => {
            match &e {
                WebhookError::Database(_) => log::error!("[WEBHOOK] {} failed: {}", envelope.event, e),
                _ => log::warn!("[WEBHOOK] {} rejected: {}", envelope.event, e),
            }
            error_response(&e)
        }
    }
}
