use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::middleware::api_auth::validate_request;
use crate::models::CreateCompanyRequest;
use crate::AppState;
use super::{bad_request, database_error, is_constraint_violation, not_found, require_company};

#[derive(Debug, Deserialize)]
pub struct RegisterInstanceRequest {
    pub instance_name: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/companies")
            .route(web::get().to(list_companies))
            .route(web::post().to(create_company)),
    );
    cfg.service(
        web::resource("/api/companies/{company_id}/instances")
            .route(web::get().to(list_instances))
            .route(web::post().to(register_instance)),
    );
    cfg.service(web::resource("/api/instances/{instance_name}").route(web::delete().to(delete_instance)));
}

async fn create_company(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateCompanyRequest>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let request = body.into_inner();
    let name = request.name.trim();
    if name.is_empty() {
        return bad_request("name is required");
    }
    let id = request.id.as_deref().map(str::trim).filter(|id| !id.is_empty());

    match state.db.create_company(id, name) {
        Ok(company) => {
            log::info!("Created company {} ({})", company.id, company.name);
            HttpResponse::Created().json(company)
        }
        Err(e) if is_constraint_violation(&e) => HttpResponse::Conflict().json(serde_json::json!({
            "error": "Company already exists"
        })),
        Err(e) => database_error("Failed to create company", e),
    }
}

async fn list_companies(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    match state.db.list_companies() {
        Ok(companies) => HttpResponse::Ok().json(companies),
        Err(e) => database_error("Failed to list companies", e),
    }
}

async fn register_instance(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<RegisterInstanceRequest>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    let instance_name = body.instance_name.trim();
    if instance_name.is_empty() {
        return bad_request("instance_name is required");
    }

    match state.db.register_instance(&company_id, instance_name) {
        Ok(instance) => {
            log::info!("Registered instance {} for company {}", instance_name, company_id);
            HttpResponse::Created().json(instance)
        }
        Err(e) if is_constraint_violation(&e) => HttpResponse::Conflict().json(serde_json::json!({
            "error": "Instance name already registered"
        })),
        Err(e) => database_error("Failed to register instance", e),
    }
}

async fn list_instances(
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
    match state.db.list_instances(&company_id) {
        Ok(instances) => HttpResponse::Ok().json(instances),
        Err(e) => database_error("Failed to list instances", e),
    }
}

async fn delete_instance(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    match state.db.delete_instance(&path.into_inner()) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Instance"),
        Err(e) => database_error("Failed to delete instance", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{bearer, test_state};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_requires_token() {
        let (_dir, state) = test_state();
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/companies").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No authorization token provided");

        let req = test::TestRequest::get()
            .uri("/api/companies")
            .insert_header(("Authorization", "Bearer nope"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid API token");
    }

    #[actix_web::test]
    async fn test_company_and_instance_lifecycle() {
        let (_dir, state) = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/companies")
            .insert_header(bearer())
            .set_json(json!({ "id": "globex", "name": "Globex" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/companies")
            .insert_header(bearer())
            .set_json(json!({ "id": "globex", "name": "Globex again" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/companies/globex/instances")
            .insert_header(bearer())
            .set_json(json!({ "instance_name": "globex-sales" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/companies/globex/instances")
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["instance_name"], "globex-sales");
        assert_eq!(body[0]["connection_state"], "close");

        let req = test::TestRequest::delete()
            .uri("/api/instances/globex-sales")
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(state.db.get_instance_by_name("globex-sales").unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_instance_for_unknown_company() {
        let (_dir, state) = test_state();
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/companies/nobody/instances")
            .insert_header(bearer())
            .set_json(json!({ "instance_name": "x" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
