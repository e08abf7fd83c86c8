//! Scoped acquisition with guaranteed, reverse-order release.

use std::sync::Arc;

use async_trait::async_trait;

use crate::logging::LogSink;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to release {resource}: {reason}")]
pub struct ReleaseError {
    pub resource: String,
    pub reason: String,
}

impl ReleaseError {
    pub fn new(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }
}

/// A handle that owns something outside the process (a subscription, an open
/// store, a background task) and can give it back.
#[async_trait]
pub trait Releasable: Send + Sync {
    fn resource_name(&self) -> &str;

    /// Resources with nothing to give back keep the default.
    async fn release(&self) -> Result<(), ReleaseError> {
        Ok(())
    }
}

#[async_trait]
impl<T: Releasable + ?Sized> Releasable for Arc<T> {
    fn resource_name(&self) -> &str {
        (**self).resource_name()
    }

    async fn release(&self) -> Result<(), ReleaseError> {
        (**self).release().await
    }
}

/// Records acquisitions in order and releases them last-in, first-out.
pub struct ResourceScope {
    resources: Vec<Box<dyn Releasable>>,
    log: Arc<dyn LogSink>,
}

impl ResourceScope {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            resources: Vec::new(),
            log,
        }
    }

    pub fn acquire(&mut self, resource: impl Releasable + 'static) {
        self.log
            .debug(&format!("acquired {}", resource.resource_name()));
        self.resources.push(Box::new(resource));
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Releases everything acquired so far, newest first.
    ///
    /// A failing release is logged as a warning and does not stop the
    /// remaining releases. Returns how many releases failed.
    pub async fn release_all(&mut self) -> usize {
        let mut failures = 0;
        while let Some(resource) = self.resources.pop() {
            let name = resource.resource_name().to_string();
            match resource.release().await {
                Ok(()) => self.log.debug(&format!("released {name}")),
                Err(e) => {
                    failures += 1;
                    self.log.warn(&format!("cleanup: {e}"));
                }
            }
        }
        failures
    }
}
