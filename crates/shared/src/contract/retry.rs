use std::sync::Arc;

use tokio::time::{sleep, timeout};

use super::{ContractError, ProvenTransaction, TxReceipt};
use crate::config::RetryPolicy;
use crate::logging::LogSink;
use crate::providers::{ProviderError, TransactionSubmitter};

/// Submits `tx` and waits for inclusion, retrying only transient failures.
///
/// The delay doubles after every failed attempt. A rejection from the node
/// ends the loop immediately. So do a malformed reply and an inclusion
/// timeout: the node may already hold the transaction, and resubmitting the
/// same proof could apply it twice.
pub async fn submit_with_retry(
    submitter: &Arc<dyn TransactionSubmitter>,
    tx: &ProvenTransaction,
    policy: &RetryPolicy,
    log: &dyn LogSink,
) -> Result<TxReceipt, ContractError> {
    let max_attempts = policy.max_attempts.max(1);
    let label = tx.transaction.label();
    let mut delay = policy.initial_delay;
    let mut attempts = 0;
    let mut last_error = String::new();

    while attempts < max_attempts {
        if attempts > 0 {
            log.info(&format!(
                "Retrying {label} in {delay:?} (attempt {} of {max_attempts})",
                attempts + 1
            ));
            sleep(delay).await;
            delay = delay.saturating_mul(2);
        }
        attempts += 1;

        match timeout(policy.inclusion_timeout, submitter.submit(tx)).await {
            Ok(Ok(receipt)) => {
                log.debug(&format!(
                    "{label} included in block {} as {}",
                    receipt.block_height, receipt.transaction_id
                ));
                return Ok(receipt);
            }
            Ok(Err(ProviderError::Rejected(reason))) => {
                log.error(&format!("{label} rejected: {reason}"));
                return Err(ContractError::Rejected(reason));
            }
            Ok(Err(err)) if err.is_transient() => {
                log.warn(&format!("Submitting {label} failed: {err}"));
                last_error = err.to_string();
            }
            Ok(Err(err)) => {
                log.error(&format!(
                    "Submitting {label} failed: {err}; it may still be included"
                ));
                return Err(ContractError::SubmissionFailed {
                    attempts,
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                log.error(&format!(
                    "{label} not included within {:?}; it may still be included",
                    policy.inclusion_timeout
                ));
                return Err(ContractError::SubmissionFailed {
                    attempts,
                    reason: format!("inclusion timed out after {:?}", policy.inclusion_timeout),
                });
            }
        }
    }

    Err(ContractError::SubmissionFailed {
        attempts,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemorySink};
    use crate::providers::memory::ScriptedSubmitter;
    use crate::providers::testing::sample_transaction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Accepts the submission but never reports inclusion.
    #[derive(Default)]
    struct StalledSubmitter {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TransactionSubmitter for StalledSubmitter {
        async fn submit(&self, _tx: &ProvenTransaction) -> Result<TxReceipt, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_secs(60)).await;
            Err(ProviderError::Transient("unreachable".into()))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            inclusion_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let scripted = Arc::new(ScriptedSubmitter::new(vec![
            Err(ProviderError::Transient("connection reset".into())),
            Err(ProviderError::Transient("503".into())),
        ]));
        let submitter: Arc<dyn TransactionSubmitter> = scripted.clone();
        let sink = MemorySink::new();

        let receipt = submit_with_retry(&submitter, &sample_transaction(), &fast_policy(3), &*sink)
            .await
            .unwrap();

        assert_eq!(scripted.calls(), 3);
        assert_eq!(receipt.block_height, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_submission_failed() {
        let scripted = Arc::new(ScriptedSubmitter::new(vec![
            Err(ProviderError::Transient("a".into())),
            Err(ProviderError::Transient("b".into())),
            Err(ProviderError::Transient("c".into())),
        ]));
        let submitter: Arc<dyn TransactionSubmitter> = scripted.clone();
        let sink = MemorySink::new();

        let err = submit_with_retry(&submitter, &sample_transaction(), &fast_policy(2), &*sink)
            .await
            .unwrap_err();

        assert_eq!(scripted.calls(), 2);
        assert_eq!(
            err,
            ContractError::SubmissionFailed {
                attempts: 2,
                reason: "transient failure: b".into()
            }
        );
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let scripted = Arc::new(ScriptedSubmitter::new(vec![Err(ProviderError::Rejected(
            "bad proof".into(),
        ))]));
        let submitter: Arc<dyn TransactionSubmitter> = scripted.clone();
        let sink = MemorySink::new();

        let err = submit_with_retry(&submitter, &sample_transaction(), &fast_policy(5), &*sink)
            .await
            .unwrap_err();

        assert_eq!(scripted.calls(), 1);
        assert_eq!(err, ContractError::Rejected("bad proof".into()));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_not_resubmitted() {
        let scripted = Arc::new(ScriptedSubmitter::new(vec![Err(ProviderError::Malformed(
            "missing transactionId".into(),
        ))]));
        let submitter: Arc<dyn TransactionSubmitter> = scripted.clone();
        let sink = MemorySink::new();

        let err = submit_with_retry(&submitter, &sample_transaction(), &fast_policy(3), &*sink)
            .await
            .unwrap_err();

        assert_eq!(scripted.calls(), 1);
        assert_eq!(
            err,
            ContractError::SubmissionFailed {
                attempts: 1,
                reason: "malformed response: missing transactionId".into()
            }
        );
        assert!(sink.messages_at(LogLevel::Error)[0].contains("may still be included"));
    }

    #[tokio::test]
    async fn test_inclusion_timeout_is_not_resubmitted() {
        let stalled = Arc::new(StalledSubmitter::default());
        let submitter: Arc<dyn TransactionSubmitter> = stalled.clone();
        let sink = MemorySink::new();
        let policy = RetryPolicy {
            inclusion_timeout: Duration::from_millis(20),
            ..fast_policy(3)
        };

        let err = submit_with_retry(&submitter, &sample_transaction(), &policy, &*sink)
            .await
            .unwrap_err();

        assert_eq!(stalled.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            ContractError::SubmissionFailed { attempts: 1, ref reason } if reason.contains("timed out")
        ));
    }
}
