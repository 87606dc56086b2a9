pub mod config;
pub mod errors;
pub mod keys;
pub mod permissions;
pub mod pipeline;
pub mod store;
pub mod token_cache;
pub mod types;
pub mod users;
pub mod validation;

use aws_sdk_dynamodb::Client as DynamoClient;
use std::sync::Arc;

use config::Config;
use store::{DynamoDbStore, UserStore};

/// Shared application state, built once per cold start
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<dyn UserStore>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }

    /// Production state: settings from the environment, DynamoDB from the SDK default chain.
    pub async fn from_env() -> Arc<Self> {
        let config = Arc::new(Config::from_env());
        let aws_config = aws_config::load_from_env().await;
        let store = DynamoDbStore::new(DynamoClient::new(&aws_config), config.clone());

        tracing::info!(
            table = %config.table_name,
            stage = %config.stage,
            "Initialized user store"
        );
        Self::new(config, Arc::new(store))
    }
}
