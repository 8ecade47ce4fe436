//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::OAUTH2_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{
        AuthorizationCode, Flow, HttpAuthScheme, HttpBuilder, OAuth2, Scopes, SecurityScheme,
    },
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .description(Some(
                    "A role's static access token, as returned by `/login/oauth2/token`.",
                ))
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

            let oauth2 = OAuth2::new([Flow::AuthorizationCode(AuthorizationCode::new(
                "/login/oauth2/auth",
                "/login/oauth2/token",
                Scopes::new(),
            ))]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Fake Canvas OAuth",
        version = "1.0.0",
        description = "Mock Canvas LMS OAuth2 authorization server for integration development and testing."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 authorization flow and token introspection")
    )
)]
pub struct ApiDoc;
