//! OAuth2 HTTP endpoints.
//!
//! Thin axum adapters over [`FlowController`](super::FlowController):
//! - Authorization endpoint
//! - Token endpoint and logout
//! - Session token
//! - Current user (token introspection)

use crate::error::ErrorResponse;
use crate::oauth2::flow::{
    AuthorizeRequest, LogoutResponse, SessionTokenResponse, TokenRequest, TokenResponse,
};
use crate::oauth2::{OAUTH2_TAG, login, state::OAuth2State};
use crate::registry::UserProfile;
use crate::session::SESSION_COOKIE;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the OAuth2 router.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize))
        .routes(routes!(token, logout))
        .routes(routes!(session_token))
        .routes(routes!(users_self))
        .merge(login::router())
        .with_state(state)
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogoutParams {
    /// `1` to receive the identity provider's logout URL
    pub expire_sessions: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionTokenParams {
    /// Accepted, unused
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserInfoParams {
    /// Access token; an `Authorization: Bearer` header is used when absent
    pub access_token: Option<String>,
}

// =============================================================================
// Endpoints
// =============================================================================

/// OAuth2 Authorization endpoint.
///
/// Records the request in the browser session and sends the user to the role
/// selection page, which stands in for a real login.
#[tracing::instrument(skip(state, jar, params), fields(client_id = ?params.client_id))]
#[utoipa::path(
    get,
    path = "/login/oauth2/auth",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Start the authorization code flow",
    description = "Validates `response_type=code`, stores `client_id`, `redirect_uri`, `state` and `scope` \
                   in the browser session and redirects to the role selection page.\n\n\
                   `purpose`, `force_login`, `unique_id` and `prompt` are accepted and ignored.",
    params(AuthorizeRequest),
    responses(
        (status = 302, description = "Redirect to the role selection page"),
        (status = 400, description = "response_type is not `code`", body = ErrorResponse),
    )
)]
pub async fn authorize(
    State(state): State<OAuth2State>,
    jar: CookieJar,
    Query(params): Query<AuthorizeRequest>,
) -> Response {
    let (jar, session_id) = ensure_session(jar);

    match state.flow.authorize(&state.session(&session_id), params) {
        Ok(location) => (jar, found(location)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected authorization request");
            e.into_response()
        }
    }
}

/// OAuth2 Token endpoint.
#[tracing::instrument(skip(state, params), fields(grant_type = ?params.grant_type))]
#[utoipa::path(
    post,
    path = "/login/oauth2/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange a grant for an access token",
    description = "**Supported grant types:**\n\
                   - `authorization_code`: exchange a code minted by role selection. Codes stay valid after use.\n\
                   - `refresh_token`: always answers as the instructor, whatever token is submitted.\n\
                   - `client_credentials`: a fresh random token with no user attached.\n\n\
                   Client authentication parameters are accepted and ignored.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Unknown code or unsupported grant type", body = ErrorResponse),
    )
)]
pub async fn token(State(state): State<OAuth2State>, Form(params): Form<TokenRequest>) -> Response {
    match state.flow.exchange(params) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected token request");
            e.into_response()
        }
    }
}

/// Logout endpoint.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/login/oauth2/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Logout",
    summary = "Log out",
    description = "Nothing is revoked. With `expire_sessions=1` the response carries the identity \
                   provider's logout URL, otherwise the body is empty.",
    params(LogoutParams),
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
    )
)]
pub async fn logout(
    State(state): State<OAuth2State>,
    Query(params): Query<LogoutParams>,
) -> Response {
    match state.flow.logout(params.expire_sessions.as_deref()) {
        Some(forward) => (StatusCode::OK, Json(forward)).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

/// Session token endpoint.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/login/session_token",
    tag = OAUTH2_TAG,
    operation_id = "Session Token",
    summary = "Get a session URL",
    params(SessionTokenParams),
    responses(
        (status = 200, description = "Fixed session URL", body = SessionTokenResponse),
    )
)]
pub async fn session_token(
    State(state): State<OAuth2State>,
    Query(params): Query<SessionTokenParams>,
) -> Json<SessionTokenResponse> {
    Json(state.flow.session_token(params.return_to.as_deref()))
}

/// Current user endpoint, used by integrations to validate an access token.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/api/v1/users/self",
    tag = OAUTH2_TAG,
    operation_id = "Current User",
    summary = "Get the user an access token belongs to",
    description = "Looks up the role bound to the access token, taken from the `access_token` query \
                   parameter or, when that is absent or empty, an `Authorization: Bearer` header.",
    params(UserInfoParams),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Missing or unknown access token", body = ErrorResponse),
    )
)]
pub async fn users_self(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Query(params): Query<UserInfoParams>,
) -> Response {
    let access_token = params
        .access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers));

    match state.flow.introspect(access_token) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected access token");
            e.into_response()
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// 302 redirect to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

pub(crate) fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// Token from an `Authorization` header using the `Bearer` scheme, matched
/// case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty()).then_some(token)
}

/// Returns the session id from the cookie jar, minting one if the browser has
/// none yet.
fn ensure_session(jar: CookieJar) -> (CookieJar, String) {
    if let Some(id) = session_id(&jar) {
        return (jar, id);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}
