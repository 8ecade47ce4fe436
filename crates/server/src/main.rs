use fake_canvas_oauth::api::start_webserver;
use fake_canvas_oauth::config::load_config;
use fake_canvas_oauth::oauth2::OAuth2State;
use fake_canvas_oauth::registry::{CredentialRegistry, Role};
use fake_canvas_oauth::session::MemorySessionStore;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "fake_canvas_oauth=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let layer = fmt::layer().with_target(true).with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(e.into());
    }

    initialize_tracing();

    let config = load_config()?;

    // Refuses to start without both access tokens.
    let registry = Arc::new(CredentialRegistry::from_config(&config.oauth)?);
    for role in Role::ALL {
        let profile = registry.profile_for(role.as_str());
        tracing::info!(
            role = %role,
            id = ?profile.as_ref().map(|p| p.id),
            name = ?profile.as_ref().map(|p| p.name.as_str()),
            "Configured mock identity"
        );
    }

    let sessions = Arc::new(MemorySessionStore::new(config.session.ttl()));
    let state = OAuth2State::new(registry, sessions);

    start_webserver(state, &config).await
}
