use async_trait::async_trait;
use np_core::{Error, Result, SpeechRenderer};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

mod chunk;

pub use chunk::chunk_text;

/// The TTS endpoint rejects long inputs; text is split at word boundaries
/// into chunks of at most this many characters.
const MAX_TTS_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub source_lang: String,
    pub target_lang: String,
    pub static_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "hi".to_string(),
            static_dir: PathBuf::from("static"),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Narrator backed by the unauthenticated Google translate endpoints:
/// translate the text, synthesize each chunk as mp3, concatenate, and write
/// the file under the static directory.
pub struct GoogleSpeech {
    client: Client,
    config: SpeechConfig,
}

impl GoogleSpeech {
    const TRANSLATE_URL: &'static str = "https://translate.googleapis.com/translate_a/single";
    const TTS_URL: &'static str = "https://translate.google.com/translate_tts";

    pub fn new(config: SpeechConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    async fn translate(&self, text: &str) -> Result<String> {
        let url = Url::parse_with_params(
            Self::TRANSLATE_URL,
            &[
                ("client", "gtx"),
                ("dt", "t"),
                ("sl", self.config.source_lang.as_str()),
                ("tl", self.config.target_lang.as_str()),
                ("q", text),
            ],
        )
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Speech(format!(
                "translation failed with status {}",
                response.status()
            )));
        }
        let body = response.text().await?;
        parse_translation(&body)
    }

    async fn synthesize_chunk(&self, text: &str) -> Result<Vec<u8>> {
        let url = Url::parse_with_params(
            Self::TTS_URL,
            &[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.config.target_lang.as_str()),
                ("q", text),
            ],
        )
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Speech(format!(
                "speech synthesis failed with status {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn save_audio(&self, filename: &str, audio: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.config.static_dir).await?;
        let path = self.config.static_dir.join(filename);
        tokio::fs::write(&path, audio).await?;
        Ok(path)
    }
}

/// The translate endpoint answers a nested array; the translated text is
/// the first element of each segment under the first element.
fn parse_translation(body: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Speech(format!("unexpected translation response: {}", e)))?;
    let segments = value
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Speech("unexpected translation response shape".to_string()))?;

    let mut translated = String::new();
    for segment in segments {
        if let Some(piece) = segment.get(0).and_then(|v| v.as_str()) {
            translated.push_str(piece);
        }
    }
    if translated.is_empty() {
        return Err(Error::Speech("translation response had no text".to_string()));
    }
    Ok(translated)
}

#[async_trait]
impl SpeechRenderer for GoogleSpeech {
    async fn render(&self, text: &str, filename: &str) -> Result<String> {
        let translated = self.translate(text).await?;
        debug!(chars = translated.len(), "Translated final analysis");

        // mp3 frames are self-contained; chunk files concatenate cleanly.
        let mut audio = Vec::new();
        for chunk in chunk_text(&translated, MAX_TTS_CHARS) {
            audio.extend(self.synthesize_chunk(&chunk).await?);
        }
        if audio.is_empty() {
            return Err(Error::Speech("speech synthesis produced no audio".to_string()));
        }

        let path = self.save_audio(filename, &audio).await?;
        info!(path = %path.display(), "🔊 Audio written");
        Ok(static_reference(filename))
    }
}

/// Reference addressable through the web layer's `/static` mount.
fn static_reference(filename: &str) -> String {
    format!("/static/{}", filename)
}
