use async_trait::async_trait;
use roomlink_core::{Error, Result, RoomConfig, RoomCredentials};
use tracing::{info, warn};

/// Fetches the credentials replayed in `joinRoom`.
#[async_trait]
pub trait Bootstrap: Send + Sync {
    async fn fetch(&self, config: &RoomConfig) -> Result<RoomCredentials>;
}

/// Preset credentials, for deployments without a bootstrap API.
#[derive(Debug, Clone)]
pub struct StaticBootstrap {
    credentials: RoomCredentials,
}

impl StaticBootstrap {
    pub fn new(credentials: RoomCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Bootstrap for StaticBootstrap {
    async fn fetch(&self, _config: &RoomConfig) -> Result<RoomCredentials> {
        Ok(self.credentials.clone())
    }
}

/// `GET {apiServer}/api/{appKey}/{room}` returning `RoomCredentials` as JSON.
#[derive(Debug, Clone, Default)]
pub struct HttpBootstrap {
    client: reqwest::Client,
}

impl HttpBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Bootstrap for HttpBootstrap {
    async fn fetch(&self, config: &RoomConfig) -> Result<RoomCredentials> {
        let Some(api_server) = &config.api_server else {
            return Err(Error::Environment(
                "no apiServer configured for the bootstrap request".to_string(),
            ));
        };
        let url = format!(
            "{}/api/{}/{}",
            api_server.trim_end_matches('/'),
            config.app_key,
            config.room
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("bootstrap request to {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "bootstrap request to {url} returned {}",
                response.status()
            )));
        }
        response
            .json::<RoomCredentials>()
            .await
            .map_err(|e| Error::Transport(format!("invalid bootstrap response: {e}")))
    }
}

/// Retries transport failures immediately, up to `bootstrapAttempts` tries.
pub async fn fetch_with_retry(
    bootstrap: &dyn Bootstrap,
    config: &RoomConfig,
) -> Result<RoomCredentials> {
    let attempts = config.bootstrap_attempts.max(1);
    let mut attempt = 1;
    loop {
        match bootstrap.fetch(config).await {
            Ok(credentials) => {
                info!("Room credentials fetched on attempt {}", attempt);
                return Ok(credentials);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!("Bootstrap attempt {}/{} failed: {}", attempt, attempts, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
