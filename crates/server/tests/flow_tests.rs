//! Flow controller tests.
//!
//! Drives the authorize → select role → exchange state machine directly,
//! without the HTTP layer.

use fake_canvas_oauth::{
    config::{OAuthConfig, RoleConfig},
    error::FlowError,
    oauth2::{
        FlowController,
        flow::{AuthorizeRequest, CANVAS_REGION, EXPIRES_IN, SELECT_ROLE_PATH, TokenRequest},
    },
    registry::{CredentialRegistry, Role},
    session::{FlowContext, MemorySessionStore, Session},
};
use std::sync::Arc;
use std::time::Duration;

const INSTRUCTOR_TOKEN: &str = "instructor-access-token";
const STUDENT_TOKEN: &str = "student-access-token";

fn test_oauth_config() -> OAuthConfig {
    OAuthConfig {
        instructor: RoleConfig {
            access_token: Some(INSTRUCTOR_TOKEN.into()),
            id: Some(4242),
            ..Default::default()
        },
        student: RoleConfig {
            access_token: Some(STUDENT_TOKEN.into()),
            ..Default::default()
        },
    }
}

fn controller() -> FlowController {
    let registry = CredentialRegistry::from_config(&test_oauth_config()).expect("registry");
    FlowController::new(Arc::new(registry))
}

fn authorize_request(redirect_uri: &str, state: Option<&str>) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: Some("code".into()),
        client_id: Some("test-client".into()),
        redirect_uri: Some(redirect_uri.into()),
        state: state.map(String::from),
        scope: Some("url:GET|/api/v1/users/self".into()),
        ..Default::default()
    }
}

fn grant(grant_type: &str) -> TokenRequest {
    TokenRequest {
        grant_type: Some(grant_type.into()),
        ..Default::default()
    }
}

/// Runs authorize + role selection and returns the issued code.
fn code_for(flow: &FlowController, store: &MemorySessionStore, role: &str) -> String {
    let session = Session::new(store, "session-1");
    flow.authorize(&session, authorize_request("https://app.test/cb", Some("xyz")))
        .expect("authorize");
    let location = flow.select_role(&session, role).expect("select role");
    let code = location
        .split_once("code=")
        .and_then(|(_, rest)| rest.split('&').next())
        .expect("code in redirect");
    code.to_string()
}

// =============================================================================
// Authorize
// =============================================================================

#[test]
fn test_authorize_stores_context_and_redirects_to_role_selection() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let session = Session::new(&store, "s");

    let location = flow
        .authorize(&session, authorize_request("https://app.test/cb", Some("xyz")))
        .expect("authorize");

    assert_eq!(location, SELECT_ROLE_PATH);
    let context = FlowContext::load(&session);
    assert_eq!(context.redirect_uri.as_deref(), Some("https://app.test/cb"));
    assert_eq!(context.state.as_deref(), Some("xyz"));
    assert_eq!(context.client_id.as_deref(), Some("test-client"));
}

#[test]
fn test_authorize_rejects_other_response_types_without_touching_session() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let session = Session::new(&store, "s");

    for response_type in [Some("token"), Some("CODE"), Some(""), None] {
        let mut request = authorize_request("https://app.test/cb", Some("xyz"));
        request.response_type = response_type.map(String::from);

        let err = flow.authorize(&session, request).unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedResponseType(_)));
        assert!(err.is_client_input());
    }

    assert_eq!(FlowContext::load(&session), FlowContext::default());
    assert!(store.is_empty());
}

#[test]
fn test_authorize_ignores_compatibility_params() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let session = Session::new(&store, "s");

    let mut request = authorize_request("https://app.test/cb", None);
    request.purpose = Some("mobile".into());
    request.force_login = Some("1".into());
    request.unique_id = Some("someone".into());
    request.prompt = Some("none".into());

    assert_eq!(flow.authorize(&session, request), Ok(SELECT_ROLE_PATH));
}

// =============================================================================
// Role selection
// =============================================================================

#[test]
fn test_select_role_redirects_with_code_and_state() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let session = Session::new(&store, "s");
    flow.authorize(&session, authorize_request("https://app.test/cb", Some("xyz")))
        .unwrap();

    let location = flow.select_role(&session, "instructor").unwrap();

    assert!(location.starts_with("https://app.test/cb?code="));
    assert!(location.ends_with("&state=xyz"));
    assert_eq!(flow.registry().issued_codes(), 1);
}

#[test]
fn test_select_role_with_absent_state_does_not_leak_null() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let session = Session::new(&store, "s");
    flow.authorize(&session, authorize_request("https://app.test/cb", None))
        .unwrap();

    let location = flow.select_role(&session, "student").unwrap();

    assert!(location.ends_with("&state="));
    assert!(!location.contains("null"));
}

#[test]
fn test_select_role_without_authorize_mints_nothing() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let session = Session::new(&store, "fresh");

    assert_eq!(
        flow.select_role(&session, "instructor"),
        Err(FlowError::MissingFlowContext)
    );
    assert_eq!(flow.registry().issued_codes(), 0);
}

#[test]
fn test_select_role_after_session_expiry_fails() {
    let flow = controller();
    let store = MemorySessionStore::new(Duration::ZERO);
    let session = Session::new(&store, "s");
    flow.authorize(&session, authorize_request("https://app.test/cb", Some("xyz")))
        .unwrap();

    assert_eq!(
        flow.select_role(&session, "instructor"),
        Err(FlowError::MissingFlowContext)
    );
}

#[test]
fn test_select_role_in_other_session_fails() {
    let flow = controller();
    let store = MemorySessionStore::default();
    flow.authorize(
        &Session::new(&store, "a"),
        authorize_request("https://app.test/cb", Some("xyz")),
    )
    .unwrap();

    assert_eq!(
        flow.select_role(&Session::new(&store, "b"), "instructor"),
        Err(FlowError::MissingFlowContext)
    );
}

// =============================================================================
// Token exchange
// =============================================================================

#[test]
fn test_exchange_authorization_code() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let code = code_for(&flow, &store, "instructor");

    let mut request = grant("authorization_code");
    request.code = Some(code);
    let response = flow.exchange(request).expect("exchange");

    assert_eq!(response.access_token, INSTRUCTOR_TOKEN);
    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.expires_in, EXPIRES_IN);
    assert_eq!(
        response.refresh_token.as_deref(),
        Some("refresh-token-instructor-67890")
    );
    assert_eq!(response.canvas_region.as_deref(), Some(CANVAS_REGION));
    let user = response.user.expect("user");
    assert_eq!(user.id, 4242);
    assert_eq!(user.email, Role::Instructor.contact());
}

#[test]
fn test_exchange_code_can_be_replayed() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let code = code_for(&flow, &store, "student");

    for _ in 0..3 {
        let mut request = grant("authorization_code");
        request.code = Some(code.clone());
        let response = flow.exchange(request).expect("exchange");
        assert_eq!(response.access_token, STUDENT_TOKEN);
    }
}

#[test]
fn test_exchange_unknown_or_missing_code() {
    let flow = controller();

    let mut request = grant("authorization_code");
    request.code = Some("not-a-code".into());
    assert_eq!(flow.exchange(request).unwrap_err(), FlowError::InvalidCode);

    assert_eq!(
        flow.exchange(grant("authorization_code")).unwrap_err(),
        FlowError::InvalidCode
    );
}

#[test]
fn test_exchange_code_for_unknown_role_fails_at_exchange() {
    let flow = controller();
    let store = MemorySessionStore::default();
    let code = code_for(&flow, &store, "admin");

    let mut request = grant("authorization_code");
    request.code = Some(code);
    let err = flow.exchange(request).unwrap_err();

    assert_eq!(err, FlowError::UnknownRole("admin".into()));
    assert!(!err.is_client_input());
}

#[test]
fn test_refresh_grant_always_answers_as_instructor() {
    let flow = controller();

    let mut request = grant("refresh_token");
    request.refresh_token = Some("refresh-token-student-fghij".into());
    let response = flow.exchange(request).expect("refresh");

    assert_eq!(response.access_token, INSTRUCTOR_TOKEN);
    assert_eq!(response.user.map(|u| u.id), Some(4242));
    assert!(response.refresh_token.is_none());
    assert!(response.canvas_region.is_none());
}

#[test]
fn test_client_credentials_tokens_are_unrelated() {
    let flow = controller();

    let mut request = grant("client_credentials");
    request.scope = Some("read".into());
    let first = flow.exchange(request).expect("client credentials");
    let second = flow.exchange(grant("client_credentials")).unwrap();

    assert_eq!(first.scope.as_deref(), Some("read"));
    assert!(first.user.is_none());
    assert_eq!(first.expires_in, EXPIRES_IN);
    assert_ne!(first.access_token, second.access_token);
    assert!(second.scope.is_none());
    assert_eq!(flow.registry().role_for_access_token(Some(&first.access_token)), None);
    assert_eq!(flow.registry().issued_codes(), 0);
}

#[test]
fn test_unsupported_grant_types() {
    let flow = controller();

    assert_eq!(
        flow.exchange(grant("password")).unwrap_err(),
        FlowError::UnsupportedGrantType(Some("password".into()))
    );
    assert_eq!(
        flow.exchange(TokenRequest::default()).unwrap_err(),
        FlowError::UnsupportedGrantType(None)
    );
}

// =============================================================================
// Logout, session token, introspection
// =============================================================================

#[test]
fn test_logout_forward_url_only_when_expiring_sessions() {
    let flow = controller();

    let forward = flow.logout(Some("1")).expect("forward url");
    assert_eq!(forward.forward_url, "https://idp.school.edu/opaque_url");
    assert!(flow.logout(Some("0")).is_none());
    assert!(flow.logout(None).is_none());
}

#[test]
fn test_session_token_is_fixed() {
    let flow = controller();
    assert_eq!(
        flow.session_token(Some("https://anywhere.test")).session_url,
        flow.session_token(None).session_url
    );
}

#[test]
fn test_introspect_known_and_unknown_tokens() {
    let flow = controller();

    let profile = flow.introspect(Some(STUDENT_TOKEN)).expect("student");
    assert_eq!(profile.id, 202);
    assert_eq!(profile.login_id, "student@school.edu");

    assert_eq!(flow.introspect(Some("bogus")), Err(FlowError::InvalidToken));
    assert_eq!(flow.introspect(None), Err(FlowError::InvalidToken));
}

#[test]
fn test_issued_tokens_introspect_to_their_role() {
    let flow = controller();
    let store = MemorySessionStore::default();

    for role in Role::ALL {
        let mut request = grant("authorization_code");
        request.code = Some(code_for(&flow, &store, role.as_str()));
        let token = flow.exchange(request).unwrap().access_token;
        let profile = flow.introspect(Some(&token)).unwrap();
        assert_eq!(profile.email, role.contact());
    }
}
