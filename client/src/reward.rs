use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::Deserialize;

/// Source of the winner's reward artifact. Exactly one side (the winner)
/// fetches; the loser only ever receives the resulting URL over the wire.
pub trait RewardSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'static, Result<String>>;
}

#[derive(Deserialize)]
struct RewardArtifact {
    url: String,
}

/// Fetches `{ "url": ... }` from a configurable endpoint.
#[derive(Clone)]
pub struct HttpRewardSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRewardSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl RewardSource for HttpRewardSource {
    fn fetch(&self) -> BoxFuture<'static, Result<String>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        Box::pin(async move {
            let artifact: RewardArtifact = client
                .get(&endpoint)
                .send()
                .await
                .context("request reward artifact")?
                .error_for_status()
                .context("reward endpoint refused")?
                .json()
                .await
                .context("decode reward artifact")?;
            Ok(artifact.url)
        })
    }
}
