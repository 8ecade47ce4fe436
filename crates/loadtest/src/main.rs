use goose::prelude::*;
use std::env;

fn access_token() -> String {
    env::var("ACCESS_TOKEN").unwrap_or_else(|_| "instructor-access-token".to_string())
}

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/healthz").await?;
    Ok(())
}

async fn get_session_token(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/login/session_token").await?;
    Ok(())
}

async fn post_client_credentials(user: &mut GooseUser) -> TransactionResult {
    let params = [("grant_type", "client_credentials"), ("scope", "read")];
    let _goose_metrics = user.post_form("/login/oauth2/token", &params).await?;
    Ok(())
}

async fn post_refresh_token(user: &mut GooseUser) -> TransactionResult {
    let params = [("grant_type", "refresh_token"), ("refresh_token", "ignored")];
    let _goose_metrics = user.post_form("/login/oauth2/token", &params).await?;
    Ok(())
}

async fn get_users_self(user: &mut GooseUser) -> TransactionResult {
    let path = format!("/api/v1/users/self?access_token={}", access_token());
    let _goose_metrics = user.get(&path).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    if env::var("ACCESS_TOKEN").is_err() {
        println!("No ACCESS_TOKEN environment variable set, defaulting to 'instructor-access-token'");
    }

    GooseAttack::initialize()?
        .register_scenario(
            scenario!("HealthCheck").register_transaction(transaction!(health_check)),
        )
        .register_scenario(
            scenario!("TokenEndpoint")
                .register_transaction(transaction!(post_client_credentials))
                .register_transaction(transaction!(post_refresh_token))
                .register_transaction(transaction!(get_session_token)),
        )
        .register_scenario(
            scenario!("Introspection").register_transaction(transaction!(get_users_self)),
        )
        .execute()
        .await?;

    Ok(())
}
