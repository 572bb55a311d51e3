pub mod ai_settings;
pub mod blocklist;
pub mod campaigns;
pub mod companies;
pub mod contacts;
pub mod conversations;
pub mod health;
pub mod webhook;

use actix_web::HttpResponse;

use crate::AppState;

/// 500 with the database error in the body, logged with some context
pub(crate) fn database_error(context: &str, e: rusqlite::Error) -> HttpResponse {
    log::error!("{}: {}", context, e);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("Database error: {}", e)
    }))
}

pub(crate) fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "error": format!("{} not found", what)
    }))
}

pub(crate) fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": message.into()
    }))
}

pub(crate) const DEFAULT_PAGE_SIZE: i64 = 50;
pub(crate) const MAX_PAGE_SIZE: i64 = 500;

/// Clamp a `?limit=` query value
pub(crate) fn page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// 404 unless the tenant exists
pub(crate) fn require_company(state: &AppState, company_id: &str) -> Result<(), HttpResponse> {
    match state.db.get_company(company_id) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(not_found("Company")),
        Err(e) => Err(database_error("Failed to load company", e)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use actix_web::web;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::db::Database;
    use crate::webhook::automation::AutomationForwarder;
    use crate::webhook::media::{LocalMediaStorage, MediaRehoster};
    use crate::webhook::WebhookProcessor;
    use crate::AppState;

    pub const TOKEN: &str = "test-token";

    pub fn bearer() -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", TOKEN))
    }

    /// App state over a fresh database seeded with company `acme` and instance `acme-main`
    pub fn test_state() -> (TempDir, web::Data<AppState>) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("engage.db");
        let media_dir = dir.path().join("media");
        let db_path_str = db_path.to_str().unwrap().to_string();
        let media_dir_str = media_dir.to_str().unwrap().to_string();

        let config = Config::from_lookup(|key| match key {
            "API_TOKEN" => Some(TOKEN.to_string()),
            "DATABASE_URL" => Some(db_path_str.clone()),
            "MEDIA_DIR" => Some(media_dir_str.clone()),
            _ => None,
        })
        .unwrap();

        let db = Arc::new(Database::new(&config.database_url).unwrap());
        db.create_company(Some("acme"), "Acme").unwrap();
        db.register_instance("acme", "acme-main").unwrap();

        let http = reqwest::Client::new();
        let storage = Arc::new(LocalMediaStorage::new(&config.media_dir, &config.public_base_url));
        let webhook = Arc::new(WebhookProcessor::new(
            db.clone(),
            MediaRehoster::new(http.clone(), storage, config.max_media_bytes),
            AutomationForwarder::new(http),
            None,
        ));

        let state = web::Data::new(AppState {
            db,
            config,
            webhook,
        });
        (dir, state)
    }
}
