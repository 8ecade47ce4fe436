//! Role selection, standing in for a real login.
//!
//! - Role selection page (GET)
//! - Role selection submission (POST)

use crate::error::{ErrorResponse, FlowError};
use crate::oauth2::endpoints::{found, session_id};
use crate::oauth2::state::OAuth2State;
use crate::registry::Role;
use crate::session::FlowContext;
use askama::Template;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

struct RoleOption {
    value: &'static str,
    label: &'static str,
}

#[derive(Template)]
#[template(path = "select_role.html")]
struct SelectRoleTemplate {
    client_id: Option<String>,
    scope: Option<String>,
    roles: Vec<RoleOption>,
}

/// Form data for role selection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectRoleForm {
    /// Role to sign in as. Not checked against the known roles.
    pub role: String,
}

/// Creates the role selection router.
pub fn router() -> OpenApiRouter<OAuth2State> {
    OpenApiRouter::new().routes(routes!(select_role_page, select_role))
}

/// Display the role selection page.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/login/oauth2/select-role",
    tag = super::OAUTH2_TAG,
    operation_id = "Role Selection Page",
    summary = "Display the role selection page",
    description = "Renders one button per mock identity. Reached by redirect from `/login/oauth2/auth`.",
    responses(
        (status = 200, description = "Role selection page HTML"),
        (status = 500, description = "Internal server error"),
    )
)]
async fn select_role_page(State(state): State<OAuth2State>, jar: CookieJar) -> Response {
    let context = session_id(&jar)
        .map(|id| FlowContext::load(&state.session(&id)))
        .unwrap_or_default();

    let template = SelectRoleTemplate {
        client_id: context.client_id,
        scope: context.scope,
        roles: Role::ALL
            .iter()
            .map(|role| RoleOption {
                value: role.as_str(),
                label: role.label(),
            })
            .collect(),
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render role selection template: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Handle role selection.
#[tracing::instrument(skip(state, jar, form), fields(role = %form.role))]
#[utoipa::path(
    post,
    path = "/login/oauth2/select-role",
    tag = super::OAUTH2_TAG,
    operation_id = "Role Selection Submit",
    summary = "Sign in as the chosen role",
    description = "Mints an authorization code bound to `role` and redirects to the `redirect_uri` \
                   recorded by the authorize step, with `code` and `state` appended.",
    request_body(
        content = SelectRoleForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Chosen role"
    ),
    responses(
        (status = 302, description = "Redirect to the client with an authorization code"),
        (status = 400, description = "No authorization request in progress for this session", body = ErrorResponse),
    )
)]
async fn select_role(
    State(state): State<OAuth2State>,
    jar: CookieJar,
    Form(form): Form<SelectRoleForm>,
) -> Response {
    let Some(session_id) = session_id(&jar) else {
        tracing::warn!("Role selected without a session");
        return FlowError::MissingFlowContext.into_response();
    };

    match state.flow.select_role(&state.session(&session_id), &form.role) {
        Ok(location) => found(&location),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected role selection");
            e.into_response()
        }
    }
}
