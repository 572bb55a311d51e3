pub mod api_auth;
