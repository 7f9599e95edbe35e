//! Anonymous session acquisition for providers that need a handle before querying

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::provider::traits::Provider;

/// Holds a provider's session handle; set at most once
#[derive(Debug)]
pub struct SessionCell<T> {
    cell: OnceCell<T>,
}

impl<T> SessionCell<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// A cell that starts out holding `handle`, so no fetch ever happens
    pub fn preset(handle: T) -> Self {
        Self {
            cell: OnceCell::new_with(Some(handle)),
        }
    }
}

impl<T> Default for SessionCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability for providers that require a session or conversation handle
#[async_trait]
pub trait SessionLifecycle: Provider {
    type Handle: Clone + Send + Sync;

    fn session(&self) -> &SessionCell<Self::Handle>;

    /// Obtain a fresh handle, remotely or by generating one locally
    async fn fetch_session_id(&self) -> Result<Self::Handle>;

    /// Fetch and store the handle unless one is already held.
    ///
    /// Concurrent first callers share a single in-flight fetch.
    async fn authenticate(&self) -> Result<Self::Handle> {
        let handle = self
            .session()
            .cell
            .get_or_try_init(|| async {
                debug!(provider = %self.name(), "Acquiring session");
                self.fetch_session_id()
                    .await
                    .map_err(|e| AppError::Authentication {
                        provider: self.name().to_string(),
                        reason: e.to_string(),
                    })
            })
            .await?;

        Ok(handle.clone())
    }
}
