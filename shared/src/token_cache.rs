//! Lazily-filled bearer token for clients calling the user API, e.g. smoke tests
//! run against a deployed stage.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unable to obtain token: {0}")]
pub struct TokenError(pub String);

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<String, TokenError>;
}

/// Reads the token from an environment variable.
pub struct EnvTokenSource {
    variable: String,
}

impl EnvTokenSource {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

#[async_trait]
impl TokenSource for EnvTokenSource {
    async fn fetch(&self) -> Result<String, TokenError> {
        std::env::var(&self.variable)
            .map_err(|e| TokenError(format!("{}: {}", self.variable, e)))
    }
}

/// Holds at most one token; the source is only asked when the cache is empty.
pub struct TokenCache<S> {
    source: S,
    token: Option<String>,
}

impl<S: TokenSource> TokenCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            token: None,
        }
    }

    pub async fn get(&mut self) -> Result<&str, TokenError> {
        let token = match self.token.take() {
            Some(token) => token,
            None => self.source.fetch().await?,
        };
        Ok(self.token.insert(token).as_str())
    }

    /// Drops the cached token and fetches a new one.
    pub async fn refresh(&mut self) -> Result<&str, TokenError> {
        self.invalidate();
        self.get().await
    }

    pub fn invalidate(&mut self) {
        if self.token.take().is_some() {
            tracing::debug!("Token invalidated");
        }
    }

    pub fn is_cached(&self) -> bool {
        self.token.is_some()
    }
}
