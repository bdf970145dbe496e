use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    /// Translate the text and render it as spoken audio, returning a
    /// reference (path or URI) the static file server can address.
    async fn render(&self, text: &str, filename: &str) -> Result<String>;
}
