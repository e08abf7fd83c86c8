use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{http_client, ProviderError, PublicDataReader};
use crate::contract::ContractAddress;
use crate::logging::LogSink;

const CONTRACT_STATE_QUERY: &str = "query ContractState($address: HexEncoded!) { \
    contractAction(address: $address) { state } }";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractActionData {
    contract_action: Option<ContractAction>,
}

#[derive(Debug, Deserialize)]
struct ContractAction {
    /// Hex-encoded serialized ledger state.
    state: String,
}

/// GraphQL client for the chain indexer: public contract state and wallet
/// sync progress.
#[derive(Clone)]
pub struct IndexerClient {
    client: reqwest::Client,
    url: Url,
    log: Arc<dyn LogSink>,
}

impl IndexerClient {
    pub fn new(url: Url, log: Arc<dyn LogSink>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            url,
            log,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(first) = body.errors.first() {
            return Err(ProviderError::Malformed(format!(
                "indexer returned {} error(s), first: {}",
                body.errors.len(),
                first.message
            )));
        }
        body.data
            .ok_or_else(|| ProviderError::Malformed("response has neither data nor errors".into()))
    }
}

#[async_trait]
impl PublicDataReader for IndexerClient {
    async fn contract_state(
        &self,
        address: &ContractAddress,
    ) -> Result<Option<Value>, ProviderError> {
        let data: ContractActionData = self
            .query(CONTRACT_STATE_QUERY, json!({ "address": address.as_str() }))
            .await?;

        let Some(action) = data.contract_action else {
            self.log
                .debug(&format!("Indexer has no contract at {address}"));
            return Ok(None);
        };

        let bytes = hex::decode(action.state.trim_start_matches("0x"))
            .map_err(|e| ProviderError::Malformed(format!("state is not hex: {e}")))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ProviderError::Malformed(format!("state is not decodable: {e}")))
    }
}
