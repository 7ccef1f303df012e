use anyhow::{Context, Result};

use crate::provider::DescriptionProvider;

/// Defers building the provider until the first cache miss, so fully cached
/// reruns need no credentials.
pub(crate) struct LazyProvider<P, F> {
    factory: Option<F>,
    provider: Option<P>,
}

impl<P, F> LazyProvider<P, F>
where
    P: DescriptionProvider,
    F: FnOnce() -> Result<P>,
{
    pub(crate) fn new(factory: F) -> Self {
        Self {
            factory: Some(factory),
            provider: None,
        }
    }

    pub(crate) fn get(&mut self) -> Result<&P> {
        if self.provider.is_none() {
            let factory = self
                .factory
                .take()
                .context("description provider construction already failed")?;
            self.provider = Some(factory().context("failed to construct description provider")?);
        }

        self.provider
            .as_ref()
            .context("description provider unavailable")
    }

    pub(crate) fn is_constructed(&self) -> bool {
        self.provider.is_some()
    }
}
