//! Mock Canvas OAuth2 authorization server.
//!
//! Emulates the authorization-code dance a Canvas LMS integration expects,
//! without any real identity provider behind it.
//!
//! ## Endpoints
//!
//! - `GET /login/oauth2/auth` - Authorization endpoint
//! - `GET /login/oauth2/select-role` - Role selection page
//! - `POST /login/oauth2/select-role` - Commit the chosen role, redirect with a code
//! - `POST /login/oauth2/token` - Token endpoint
//! - `DELETE /login/oauth2/token` - Logout
//! - `GET /login/session_token` - Session URL
//! - `GET /api/v1/users/self` - Access token introspection

pub mod endpoints;
pub mod flow;
pub mod login;
mod state;

pub use endpoints::router;
pub use flow::FlowController;
pub use state::OAuth2State;

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
