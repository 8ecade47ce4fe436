//! Authorization-code flow state machine.
//!
//! Each browser session walks `authorize` → `select_role` → `exchange`. The
//! authorize step records the request in the session, role selection mints a
//! code from the registry, and the token exchange turns a code into the role's
//! static credentials. Codes are not consumed by the exchange.

use crate::error::FlowError;
use crate::registry::{CredentialRegistry, Role, UserProfile};
use crate::session::{FlowContext, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// Where the authorize step sends the browser.
pub const SELECT_ROLE_PATH: &str = "/login/oauth2/select-role";
/// Lifetime advertised in every token response. Tokens never actually expire.
pub const EXPIRES_IN: i64 = 3600;
pub const TOKEN_TYPE: &str = "Bearer";
pub const CANVAS_REGION: &str = "us-east-1";
pub const IDP_LOGOUT_URL: &str = "https://idp.school.edu/opaque_url";
pub const SESSION_URL: &str = "https://canvas.instructure.com/opaque_url";

/// Authorization request query parameters.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeRequest {
    /// Must be `code`
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    /// Opaque value echoed back on the code redirect
    pub state: Option<String>,
    pub scope: Option<String>,
    /// Accepted for client compatibility, ignored
    pub purpose: Option<String>,
    /// Accepted for client compatibility, ignored
    pub force_login: Option<String>,
    /// Accepted for client compatibility, ignored
    pub unique_id: Option<String>,
    /// Accepted for client compatibility, ignored
    pub prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// `authorization_code`, `refresh_token` or `client_credentials`
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_assertion_type: Option<String>,
    pub client_assertion: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas_region: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub forward_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionTokenResponse {
    pub session_url: String,
}

/// Drives the simulated protocol over an injected registry.
#[derive(Clone, Debug)]
pub struct FlowController {
    registry: Arc<CredentialRegistry>,
}

impl FlowController {
    pub fn new(registry: Arc<CredentialRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    /// Validates the authorization request and stores it in the session.
    /// Returns the role-selection location to redirect to.
    pub fn authorize(
        &self,
        session: &Session<'_>,
        request: AuthorizeRequest,
    ) -> Result<&'static str, FlowError> {
        if request.response_type.as_deref() != Some("code") {
            return Err(FlowError::UnsupportedResponseType(request.response_type));
        }

        FlowContext {
            client_id: request.client_id,
            redirect_uri: request.redirect_uri,
            state: request.state,
            scope: request.scope,
        }
        .save(session);

        Ok(SELECT_ROLE_PATH)
    }

    /// Mints a code for `role` and returns the client redirect carrying it.
    pub fn select_role(&self, session: &Session<'_>, role: &str) -> Result<String, FlowError> {
        let context = FlowContext::load(session);
        let redirect_uri = context
            .redirect_uri
            .ok_or(FlowError::MissingFlowContext)?;

        let code = self.registry.issue_code(role);
        tracing::info!(role, client_id = ?context.client_id, "Issued authorization code");

        Ok(code_redirect(&redirect_uri, &code, context.state.as_deref()))
    }

    pub fn exchange(&self, request: TokenRequest) -> Result<TokenResponse, FlowError> {
        match request.grant_type.as_deref() {
            Some("authorization_code") => self.exchange_code(request.code.as_deref()),
            Some("refresh_token") => self.refresh(),
            Some("client_credentials") => Ok(client_credentials(request.scope)),
            _ => Err(FlowError::UnsupportedGrantType(request.grant_type)),
        }
    }

    fn exchange_code(&self, code: Option<&str>) -> Result<TokenResponse, FlowError> {
        let role_name = code
            .and_then(|code| self.registry.resolve_code(code))
            .ok_or(FlowError::InvalidCode)?;
        let role: Role = role_name
            .parse()
            .map_err(|_| FlowError::UnknownRole(role_name.clone()))?;
        let user = self
            .registry
            .profile_for(role.as_str())
            .ok_or(FlowError::UnknownRole(role_name))?;

        Ok(TokenResponse {
            access_token: self.registry.access_token_for(role).to_string(),
            token_type: TOKEN_TYPE.to_string(),
            user: Some(user),
            refresh_token: Some(self.registry.refresh_token_for(role).to_string()),
            expires_in: EXPIRES_IN,
            scope: None,
            canvas_region: Some(CANVAS_REGION.to_string()),
        })
    }

    /// The submitted refresh token is not inspected; the mock always answers
    /// as the instructor.
    fn refresh(&self) -> Result<TokenResponse, FlowError> {
        let role = Role::Instructor;
        let user = self
            .registry
            .profile_for(role.as_str())
            .ok_or_else(|| FlowError::UnknownRole(role.to_string()))?;

        Ok(TokenResponse {
            access_token: self.registry.access_token_for(role).to_string(),
            token_type: TOKEN_TYPE.to_string(),
            user: Some(user),
            refresh_token: None,
            expires_in: EXPIRES_IN,
            scope: None,
            canvas_region: None,
        })
    }

    /// Nothing is invalidated; only the response shape depends on the flag.
    pub fn logout(&self, expire_sessions: Option<&str>) -> Option<LogoutResponse> {
        (expire_sessions == Some("1")).then(|| LogoutResponse {
            forward_url: IDP_LOGOUT_URL.to_string(),
        })
    }

    pub fn session_token(&self, _return_to: Option<&str>) -> SessionTokenResponse {
        SessionTokenResponse {
            session_url: SESSION_URL.to_string(),
        }
    }

    /// Resolves a bearer token to the profile of the role it belongs to.
    pub fn introspect(&self, access_token: Option<&str>) -> Result<UserProfile, FlowError> {
        self.registry
            .role_for_access_token(access_token)
            .and_then(|role| self.registry.profile_for(role.as_str()))
            .ok_or(FlowError::InvalidToken)
    }
}

/// Stateless token that is not tied to any role.
fn client_credentials(scope: Option<String>) -> TokenResponse {
    TokenResponse {
        access_token: uuid::Uuid::new_v4().to_string(),
        token_type: TOKEN_TYPE.to_string(),
        user: None,
        refresh_token: None,
        expires_in: EXPIRES_IN,
        scope,
        canvas_region: None,
    }
}

/// Appends `code` and `state` to the client's redirect URI. A missing state is
/// sent as an empty value.
fn code_redirect(redirect_uri: &str, code: &str, state: Option<&str>) -> String {
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    format!(
        "{redirect_uri}{separator}code={}&state={}",
        urlencoding::encode(code),
        urlencoding::encode(state.unwrap_or_default()),
    )
}
