use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::db::Database;
use crate::middleware::api_auth::validate_request;
use crate::models::{Conversation, ConversationStatus};
use crate::AppState;
use super::{bad_request, database_error, not_found, page_size, require_company};

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<i64>,
    /// Message id cursor; only older messages are returned
    pub before: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HandoffRequest {
    pub assigned_to: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/companies/{company_id}/conversations").route(web::get().to(list_conversations)),
    );
    cfg.service(web::resource("/api/conversations/{id}/messages").route(web::get().to(list_messages)));
    cfg.service(web::resource("/api/conversations/{id}/read").route(web::post().to(mark_read)));
    cfg.service(web::resource("/api/conversations/{id}/handoff").route(web::post().to(handoff)));
    cfg.service(web::resource("/api/conversations/{id}/resume-ai").route(web::post().to(resume_ai)));
    cfg.service(web::resource("/api/conversations/{id}/close").route(web::post().to(close)));
}

async fn list_conversations(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ConversationQuery>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let company_id = path.into_inner();
    if let Err(resp) = require_company(&state, &company_id) {
        return resp;
    }
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match ConversationStatus::from_str(raw) {
            Some(status) => Some(status),
            None => return bad_request(format!("Unknown status '{}'", raw)),
        },
        None => None,
    };

    match state.db.list_conversations(&company_id, status, page_size(query.limit)) {
        Ok(conversations) => HttpResponse::Ok().json(conversations),
        Err(e) => database_error("Failed to list conversations", e),
    }
}

async fn list_messages(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<MessageQuery>,
) -> impl Responder {
    if let Err(resp) = validate_request(&state.config.api_token, &req) {
        return resp;
    }
    let conversation_id = path.into_inner();
    match state.db.get_conversation(conversation_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Conversation"),
        Err(e) => return database_error("Failed to load conversation", e),
    }
    match state
        .db
        .list_messages(conversation_id, page_size(query.limit), query.before)
    {
        Ok(messages) => HttpResponse::Ok().json(messages),
        Err(e) => database_error("Failed to list messages", e),
    }
}

/// Run a state transition and render the updated conversation
fn transition<F>(state: &AppState, req: &HttpRequest, id: i64, action: &str, apply: F) -> HttpResponse
where
    F: FnOnce(&Database, i64) -> rusqlite::Result<Option<Conversation>>,
{
    if let Err(resp) = validate_request(&state.config.api_token, req) {
        return resp;
    }
    match apply(state.db.as_ref(), id) {
        Ok(Some(conversation)) => {
            log::info!("Conversation {} {}", id, action);
            HttpResponse::Ok().json(conversation)
        }
        Ok(None) => not_found("Conversation"),
        Err(e) => database_error(&format!("Failed to {} conversation", action), e),
    }
}

async fn mark_read(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    transition(&state, &req, path.into_inner(), "read", |db, id| db.mark_conversation_read(id))
}

async fn handoff(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: Option<web::Json<HandoffRequest>>,
) -> impl Responder {
    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    let assigned_to = request.assigned_to.as_deref().map(str::trim).filter(|a| !a.is_empty());
    transition(&state, &req, path.into_inner(), "handoff", |db, id| {
        db.handoff_conversation(id, assigned_to)
    })
}

async fn resume_ai(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    transition(&state, &req, path.into_inner(), "resume-ai", |db, id| db.resume_ai_conversation(id))
}

async fn close(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    transition(&state, &req, path.into_inner(), "close", |db, id| db.close_conversation(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{bearer, test_state};
    use crate::db::ContactUpsert;
    use crate::models::{MessageStatus, MessageType, NewMessage};
    use actix_web::{http::StatusCode, test, App};
    use chrono::Utc;
    use serde_json::json;

    fn ingest(db: &Database, external_id: &str, text: &str) -> i64 {
        let contact = ContactUpsert {
            phone: "5511999990000".into(),
            ..Default::default()
        };
        let message = NewMessage {
            external_id: external_id.into(),
            from_me: false,
            message_type: MessageType::Text,
            content: text.into(),
            media_url: None,
            media_mime: None,
            file_name: None,
            status: MessageStatus::Delivered,
            raw_payload: "{}".into(),
            sent_at: Utc::now(),
        };
        db.ingest_message("acme", "acme-main", &contact, &message)
            .unwrap()
            .conversation_id
    }

    #[actix_web::test]
    async fn test_inbox_and_transcript() {
        let (_dir, state) = test_state();
        ingest(&state.db, "M1", "oi");
        let conversation_id = ingest(&state.db, "M2", "tudo bem?");
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get()
            .uri("/api/companies/acme/conversations?status=open")
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["unread_count"], 2);

        let req = test::TestRequest::get()
            .uri(&format!("/api/conversations/{}/messages?limit=1", conversation_id))
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["external_id"], "M2");

        let req = test::TestRequest::get()
            .uri("/api/companies/acme/conversations?status=archived")
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_handoff_resume_read_close() {
        let (_dir, state) = test_state();
        let id = ingest(&state.db, "M1", "quero falar com humano");
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/conversations/{}/handoff", id))
            .insert_header(bearer())
            .set_json(json!({ "assigned_to": "ana@acme.com" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["ai_enabled"], false);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["assigned_to"], "ana@acme.com");

        let req = test::TestRequest::post()
            .uri(&format!("/api/conversations/{}/resume-ai", id))
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["ai_enabled"], true);
        assert_eq!(body["status"], "open");

        let req = test::TestRequest::post()
            .uri(&format!("/api/conversations/{}/read", id))
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["unread_count"], 0);

        let req = test::TestRequest::post()
            .uri(&format!("/api/conversations/{}/close", id))
            .insert_header(bearer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "closed");

        let req = test::TestRequest::post()
            .uri("/api/conversations/9999/close")
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
