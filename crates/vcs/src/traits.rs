use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

/// Where to fetch application code from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSource {
    /// Repository URL
    pub url: String,
    /// Branch or tag to check out; the remote default when unset
    pub reference: Option<String>,
}

impl CodeSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Fetches application code onto the host.
#[async_trait]
pub trait CodeFetcher: Send + Sync {
    /// Install the deploy key needed to read a private repository.
    async fn install_repository_key(&self, key: &str) -> Result<()>;

    /// Check the source out and return the directory holding it.
    async fn fetch(&self, source: &CodeSource) -> Result<PathBuf>;
}
