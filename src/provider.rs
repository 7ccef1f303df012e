//! The external capability that turns a panel image plus its figure caption
//! into a free-text description.

pub mod openai;

use thiserror::Error;

pub use self::openai::{OpenAiConfig, OpenAiProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to description provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("description provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("description provider returned no choices")]
    EmptyResponse,
    #[error("description provider refused the request: {0}")]
    Refused(String),
}

pub trait DescriptionProvider {
    fn describe(&self, panel_image: &[u8], caption: &str) -> Result<String, ProviderError>;
}

impl<T: DescriptionProvider + ?Sized> DescriptionProvider for &T {
    fn describe(&self, panel_image: &[u8], caption: &str) -> Result<String, ProviderError> {
        (**self).describe(panel_image, caption)
    }
}
