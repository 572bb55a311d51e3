use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::db::StartCampaignOutcome;
use crate::middleware::api_auth::validate_request;
use crate::models::CreateCampaignRequest;
use crate::AppState;
use super::{bad_request, database_error, not_found, require_company};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/companies/{company_id}/campaigns")
            .route(web::get().to(list_campaigns))
            .route(web::post().to(create_campaign)),
    );
    cfg.service(web::resource("/api/campaigns/{id}/start").route(web::post().to(start_campaign)));
    cfg.service(web::resource("/api/campaigns/{id}/recipients").route(web::get().to(list_recipients)));
}

async fn create_campaign(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<CreateCampaignRequest>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    let request = body.into_inner();
    if let Err(message) = request.validate() {
        return bad_request(message);
    }

    match state.db.create_campaign(&company_id, &request) {
        Ok(campaign) => {
            log::info!("Created campaign {} for {}", campaign.id, company_id);
            HttpResponse::Created().json(campaign)
        }
        Err(e) => database_error("Failed to create campaign", e),
    }
}

async fn list_campaigns(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    match state.db.list_campaigns(&company_id) {
        Ok(campaigns) => HttpResponse::Ok().json(campaigns),
        Err(e) => database_error("Failed to list campaigns", e),
    }
}

/// Queue recipients and mark the campaign running; sending is done by the automation platform
async fn start_campaign(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    match state.db.start_campaign(path.into_inner()) {
        Ok(StartCampaignOutcome::Started(campaign)) => {
            log::info!(
                "Started campaign {} with {} recipient(s)",
                campaign.id,
                campaign.total_recipients
            );
            HttpResponse::Ok().json(campaign)
        }
        Ok(StartCampaignOutcome::NotFound) => not_found("Campaign"),
        Ok(StartCampaignOutcome::InvalidStatus(status)) => HttpResponse::Conflict().json(serde_json::json!({
            "error": format!("Campaign is {}, only drafts can be started", status.as_str())
        })),
        Err(e) => database_error("Failed to start campaign", e),
    }
}

async fn list_recipients(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let campaign_id = path.into_inner();
    match state.db.get_campaign(campaign_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Campaign"),
        Err(e) => return database_error("Failed to load campaign", e),
    }
    match state.db.list_campaign_recipients(campaign_id) {
        Ok(phones) => HttpResponse::Ok().json(serde_json::json!({ "phones": phones })),
        Err(e) => database_error("Failed to list campaign recipients", e),
    }
}
