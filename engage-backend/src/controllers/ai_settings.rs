use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::middleware::api_auth::validate_request;
use crate::models::{AiAgentSettingsResponse, UpdateAiAgentSettingsRequest};
use crate::AppState;
use super::{bad_request, database_error, require_company};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/companies/{company_id}/ai-settings")
            .route(web::get().to(get_ai_settings))
            .route(web::put().to(update_ai_settings)),
    );
}

async fn get_ai_settings(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    match state.db.get_ai_settings(&company_id) {
        Ok(settings) => HttpResponse::Ok().json(AiAgentSettingsResponse::from(settings)),
        Err(e) => database_error("Failed to get AI settings", e),
    }
}

async fn update_ai_settings(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateAiAgentSettingsRequest>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    let request = body.into_inner();

    let current = match state.db.get_ai_settings(&company_id) {
        Ok(settings) => settings,
        Err(e) => return database_error("Failed to get AI settings", e),
    };
    if let Err(message) = request.validate(&current) {
        return bad_request(message);
    }

    match state.db.update_ai_settings(&company_id, &request) {
        Ok(settings) => {
            log::info!(
                "Updated AI settings for {} (enabled={})",
                company_id,
                settings.enabled
            );
            HttpResponse::Ok().json(AiAgentSettingsResponse::from(settings))
        }
        Err(e) => database_error("Failed to update AI settings", e),
    }
}
