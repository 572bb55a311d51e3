use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::middleware::api_auth::validate_request;
use crate::AppState;
use super::{database_error, not_found, page_size, require_company};

#[derive(Debug, Deserialize)]
pub struct ContactQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    /// Agent-facing name; null or empty clears it
    pub name: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/companies/{company_id}/contacts").route(web::get().to(list_contacts)));
    cfg.service(
        web::resource("/api/companies/{company_id}/contacts/{contact_id}")
            .route(web::get().to(get_contact))
            .route(web::put().to(update_contact)),
    );
}

async fn list_contacts(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ContactQuery>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    match state
        .db
        .list_contacts(&company_id, query.search.as_deref(), page_size(query.limit))
    {
        Ok(contacts) => HttpResponse::Ok().json(contacts),
        Err(e) => database_error("Failed to list contacts", e),
    }
}

async fn get_contact(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, i64)>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let (company_id, contact_id) = path.into_inner();
    match state.db.get_contact(&company_id, contact_id) {
        Ok(Some(contact)) => HttpResponse::Ok().json(contact),
        Ok(None) => not_found("Contact"),
        Err(e) => database_error("Failed to load contact", e),
    }
}

async fn update_contact(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, i64)>,
    body: web::Json<UpdateContactRequest>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let (company_id, contact_id) = path.into_inner();
    let name = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    match state.db.update_contact_name(&company_id, contact_id, name) {
        Ok(Some(contact)) => HttpResponse::Ok().json(contact),
        Ok(None) => not_found("Contact"),
        Err(e) => database_error("Failed to update contact", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{bearer, test_state};
    use crate::db::ContactUpsert;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_list_search_and_rename() {
        let (_dir, state) = test_state();
        let maria = state
            .db
            .upsert_contact(
                "acme",
                &ContactUpsert {
                    phone: "5511999990000".into(),
                    push_name: Some("Maria".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        state
            .db
            .upsert_contact("acme", &ContactUpsert { phone: "5521988887777".into(), ..Default::default() })
            .unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::get()
            .uri("/api/companies/acme/contacts?search=mar")
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["phone"], "5511999990000");

        let req = test::TestRequest::put()
            .uri(&format!("/api/companies/acme/contacts/{}", maria.id))
            .insert_header(bearer())
            .set_json(json!({ "name": "Maria Souza" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "Maria Souza");
        assert_eq!(body["push_name"], "Maria");
    }

    #[actix_web::test]
    async fn test_contact_of_other_tenant_is_hidden() {
        let (_dir, state) = test_state();
        state.db.create_company(Some("globex"), "Globex").unwrap();
        let other = state
            .db
            .upsert_contact("globex", &ContactUpsert { phone: "1".into(), ..Default::default() })
            .unwrap();
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/companies/acme/contacts/{}", other.id))
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
