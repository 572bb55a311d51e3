use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::middleware::api_auth::validate_request;
use crate::models::BlockReason;
use crate::webhook::jid::phone_from_jid;
use crate::AppState;
use super::{bad_request, database_error, not_found, require_company};

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub phone: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/companies/{company_id}/blocklist")
            .route(web::get().to(list_blocked))
            .route(web::post().to(block)),
    );
    cfg.service(web::resource("/api/companies/{company_id}/blocklist/{phone}").route(web::delete().to(unblock)));
}

async fn list_blocked(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    match state.db.list_blocked(&company_id) {
        Ok(blocked) => HttpResponse::Ok().json(blocked),
        Err(e) => database_error("Failed to list blocklist", e),
    }
}

async fn block(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<BlockRequest>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    // Same normalisation as the webhook so `+55 (11) 9...` and JIDs match stored phones
    let Some(phone) = phone_from_jid(&body.phone) else {
        return bad_request("phone is required");
    };

    match state.db.block_phone(&company_id, &phone, BlockReason::Manual) {
        Ok(created) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "phone": phone,
            "created": created
        })),
        Err(e) => database_error("Failed to block phone", e),
    }
}

async fn unblock(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let (company_id, raw_phone) = path.into_inner();
    let phone = phone_from_jid(&raw_phone).unwrap_or(raw_phone);
    match state.db.unblock_phone(&company_id, &phone) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Blocked phone"),
        Err(e) => database_error("Failed to unblock phone", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{bearer, test_state};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_block_list_unblock() {
        let (_dir, state) = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/companies/acme/blocklist")
            .insert_header(bearer())
            .set_json(json!({ "phone": "+55 (11) 99999-0000" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["phone"], "5511999990000");
        assert!(state.db.is_phone_blocked("acme", "5511999990000").unwrap());

        let req = test::TestRequest::get()
            .uri("/api/companies/acme/blocklist")
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["reason"], "manual");

        let req = test::TestRequest::delete()
            .uri("/api/companies/acme/blocklist/5511999990000")
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::delete()
            .uri("/api/companies/acme/blocklist/5511999990000")
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
