use lambda_http::{run, service_fn, Error, Request};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use user_shared::AppState;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // CloudWatch stamps every line, so no timestamps here
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    // Initialize config and the DynamoDB client once at startup
    let state = AppState::from_env().await;
    let handler = Arc::new(http_handler::handler(state.config.clone()));

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        let handler = Arc::clone(&handler);
        async move { http_handler::function_handler(event, state, handler).await }
    }))
    .await
}
