use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{http_client, ProofProvider, ProviderError};
use crate::contract::{ProvenTransaction, UnprovenTransaction};

#[derive(Debug, Deserialize)]
struct ProveResponse {
    proof: String,
}

/// Client for a proof server reachable over HTTP.
#[derive(Debug, Clone)]
pub struct ProofServerClient {
    client: reqwest::Client,
    prove_url: Url,
}

impl ProofServerClient {
    pub fn new(prove_url: Url) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            prove_url,
        })
    }
}

#[async_trait]
impl ProofProvider for ProofServerClient {
    async fn prove(&self, tx: UnprovenTransaction) -> Result<ProvenTransaction, ProviderError> {
        let response = self
            .client
            .post(self.prove_url.clone())
            .json(&tx)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let body: ProveResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        if body.proof.is_empty() {
            return Err(ProviderError::Malformed("empty proof".into()));
        }

        Ok(ProvenTransaction {
            transaction: tx,
            proof: body.proof,
        })
    }
}
