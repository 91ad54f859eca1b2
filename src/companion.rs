//! IoT companion: reads NFC tag payloads and plays back the gateway's
//! audio. The tag hardware and the audio device are external collaborators
//! behind the two traits here; their page-level protocols are out of scope.

use std::time::Duration;

use async_trait::async_trait;

/// NFC reader boundary.
#[async_trait]
pub trait TagReader: Send {
    /// Next tag payload, or None when no tag is present.
    async fn read_payload(&mut self) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Playback boundary. Blocks until playback completes.
#[async_trait]
pub trait AudioSink: Send {
    async fn play(&mut self, audio: &[u8]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Full URL of the gateway's /generate-speech endpoint.
    pub server_url: String,
    pub api_token: String,
    pub poll_interval: Duration,
}

impl CompanionConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: std::env::var("SERVER_NAME")
                .unwrap_or_else(|_| "http://localhost:5000/generate-speech".into()),
            api_token: std::env::var("API_TOKEN").unwrap_or_default(),
            poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct Companion {
    http: reqwest::Client,
    config: CompanionConfig,
}

impl Companion {
    pub fn new(config: CompanionConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Tag payloads are the JSON request bodies the gateway accepts.
    pub fn parse_tag_payload(payload: &[u8]) -> Option<serde_json::Value> {
        match serde_json::from_slice(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Error parsing NFC data: {}", e);
                None
            }
        }
    }

    /// POST the payload to the gateway. Every failure mode is logged and
    /// absorbed so the read loop keeps running.
    pub async fn request_speech(&self, payload: &serde_json::Value) -> Option<Vec<u8>> {
        let result = self
            .http
            .post(&self.config.server_url)
            .header("Authorization", &self.config.api_token)
            .json(payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(e) => {
                    tracing::error!("HTTP request error: {}", e);
                    None
                }
            },
            Ok(resp) => {
                let code = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!("HTTP request failed with code: {}, response: {}", code, body);
                None
            }
            Err(e) => {
                tracing::error!("HTTP request error: {}", e);
                None
            }
        }
    }

    /// Poll for tags forever: read → parse → request → play.
    pub async fn run(
        &self,
        reader: &mut dyn TagReader,
        sink: &mut dyn AudioSink,
    ) -> anyhow::Result<()> {
        loop {
            match reader.read_payload().await {
                Ok(Some(payload)) => {
                    tracing::info!("NFC tag detected");
                    if let Some(request) = Self::parse_tag_payload(&payload) {
                        if let Some(audio) = self.request_speech(&request).await {
                            if let Err(e) = sink.play(&audio).await {
                                tracing::error!("Error playing audio: {}", e);
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Tag read failure: {}", e),
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_json() {
        let payload = r#"{"localization":{"zh-tw":"馬","en":"horse"}}"#.as_bytes();
        let value = Companion::parse_tag_payload(payload).unwrap();
        assert_eq!(value["localization"]["en"], "horse");
    }

    #[test]
    fn malformed_tag_data_is_absorbed() {
        assert!(Companion::parse_tag_payload(b"not json").is_none());
        assert!(Companion::parse_tag_payload(b"").is_none());
    }
}
