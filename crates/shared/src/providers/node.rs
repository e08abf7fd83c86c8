use alloy::primitives::keccak256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::{http_client, ProviderError, TransactionSubmitter};
use crate::contract::{ProvenTransaction, TxReceipt};
use crate::logging::LogSink;

pub const ADDRESS_HEADER: &str = "x-address";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Submits proven transactions to a node. Each body is signed by the wallet's
/// key over the keccak digest of the exact bytes sent.
#[derive(Clone)]
pub struct NodeSubmitter {
    client: reqwest::Client,
    submit_url: Url,
    signer: PrivateKeySigner,
    log: Arc<dyn LogSink>,
}

impl NodeSubmitter {
    pub fn new(
        submit_url: Url,
        signer: PrivateKeySigner,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            submit_url,
            signer,
            log,
        })
    }

    async fn sign(&self, body: &[u8]) -> Result<String, ProviderError> {
        let digest = keccak256(body);
        let signature = self
            .signer
            .sign_message(digest.as_slice())
            .await
            .map_err(|e| ProviderError::Rejected(format!("signing failed: {e}")))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

#[async_trait]
impl TransactionSubmitter for NodeSubmitter {
    async fn submit(&self, tx: &ProvenTransaction) -> Result<TxReceipt, ProviderError> {
        let body = serde_json::to_vec(tx).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let signature = self.sign(&body).await?;
        self.log.debug(&format!(
            "Submitting {} ({} bytes) to {}",
            tx.transaction.label(),
            body.len(),
            self.submit_url
        ));

        let response = self
            .client
            .post(self.submit_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(ADDRESS_HEADER, self.signer.address().to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text));
        }

        response
            .json::<TxReceipt>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemorySink};
    use crate::providers::testing::sample_transaction;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn signer() -> PrivateKeySigner {
        "0000000000000000000000000000000000000000000000000000000000000001"
            .parse()
            .unwrap()
    }

    async fn submitter(server: &Server) -> NodeSubmitter {
        submitter_logging_to(server, MemorySink::new()).await
    }

    async fn submitter_logging_to(server: &Server, sink: Arc<MemorySink>) -> NodeSubmitter {
        let url = Url::parse(&format!("{}/transactions", server.url())).unwrap();
        NodeSubmitter::new(url, signer(), sink).unwrap()
    }

    #[tokio::test]
    async fn test_submit_signs_and_returns_receipt() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/transactions")
            .match_header(ADDRESS_HEADER, signer().address().to_string().as_str())
            .match_header(SIGNATURE_HEADER, Matcher::Regex("^0x[0-9a-f]{130}$".into()))
            .match_body(Matcher::PartialJson(json!({ "proof": "00" })))
            .with_status(200)
            .with_body(json!({ "transactionId": "tx-1", "blockHeight": 12 }).to_string())
            .create_async()
            .await;

        let sink = MemorySink::new();
        let receipt = submitter_logging_to(&server, sink.clone())
            .await
            .submit(&sample_transaction())
            .await
            .unwrap();

        mock.assert_async().await;
        let debug = sink.messages_at(LogLevel::Debug);
        assert_eq!(debug.len(), 1);
        assert!(debug[0].contains("/transactions"));
        assert_eq!(
            receipt,
            TxReceipt {
                transaction_id: "tx-1".into(),
                block_height: 12
            }
        );
    }

    #[tokio::test]
    async fn test_unavailable_node_is_transient() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/transactions")
            .with_status(503)
            .create_async()
            .await;

        let err = submitter(&server)
            .await
            .submit(&sample_transaction())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_bad_request_is_rejection() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/transactions")
            .with_status(400)
            .with_body("invalid proof")
            .create_async()
            .await;

        let err = submitter(&server)
            .await
            .submit(&sample_transaction())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Rejected("HTTP 400 Bad Request: invalid proof".into())
        );
    }
}
