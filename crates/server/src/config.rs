use crate::registry::Role;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Access token for role `{0}` is required (set {env})", env = .0.access_token_env())]
    MissingAccessToken(Role),
}

/// Per-role identity overrides. Everything except the access token has a
/// role-specific default, see [`Role`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoleConfig {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub instructor: RoleConfig,
    #[serde(default)]
    pub student: RoleConfig,
}

impl OAuthConfig {
    pub fn role(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Instructor => &self.instructor,
            Role::Student => &self.student,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    /// Idle lifetime of a browser session, in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3167".to_string(),
    ]
}

fn default_session_ttl_secs() -> u64 {
    1800
}

/// Flat environment variables understood in addition to `APP__*` overrides,
/// mapped onto their configuration keys.
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("OAUTH_INSTRUCTOR_ACCESS_TOKEN", "oauth.instructor.access_token"),
    ("OAUTH_INSTRUCTOR_REFRESH_TOKEN", "oauth.instructor.refresh_token"),
    ("OAUTH_INSTRUCTOR_ID", "oauth.instructor.id"),
    ("OAUTH_INSTRUCTOR_NAME", "oauth.instructor.name"),
    ("OAUTH_STUDENT_ACCESS_TOKEN", "oauth.student.access_token"),
    ("OAUTH_STUDENT_REFRESH_TOKEN", "oauth.student.refresh_token"),
    ("OAUTH_STUDENT_ID", "oauth.student.id"),
    ("OAUTH_STUDENT_NAME", "oauth.student.name"),
];

/// Load application configuration from an optional `config.yaml` plus
/// environment overrides.
///
/// Precedence, lowest first: the file, `APP__`-prefixed variables using `__` as
/// the key path separator (e.g. `APP__OAUTH__STUDENT__ID`), then the flat
/// variables such as `OAUTH_INSTRUCTOR_ACCESS_TOKEN` and `CORS_ALLOWED_ORIGINS`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(
        config::File::with_name("config").required(false),
        |name| env::var(name).ok(),
    )
}

/// Same as [`load_config`] but with an explicit file source and a lookup
/// function standing in for the flat environment variables.
pub fn load_config_from<S, F>(file: S, lookup: F) -> Result<AppConfig, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    use config::{Config, Environment};

    let mut builder = Config::builder()
        .add_source(file)
        .add_source(Environment::with_prefix("APP").separator("__"));

    for &(var, key) in FLAT_ENV_OVERRIDES {
        builder = builder.set_override_option(key, lookup(var))?;
    }

    if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
        let origins: Vec<String> = origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        builder = builder.set_override("cors.allowed_origins", origins)?;
    }

    let app: AppConfig = builder.build()?.try_deserialize()?;

    if app.listen_addr.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "listen_addr `{}` is not a socket address",
            app.listen_addr
        )));
    }

    Ok(app)
}
