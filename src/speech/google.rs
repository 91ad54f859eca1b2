//! Production collaborators speaking the public Google translate and TTS
//! web endpoints over reqwest.

use std::time::Duration;

use async_trait::async_trait;

use super::{Synthesizer, Translator};

const TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com";
const TTS_ENDPOINT: &str = "https://translate.google.com";

// The web endpoints reject library user agents.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Per-request character limit of the TTS endpoint; longer texts are split
/// on word boundaries and the MP3 fragments concatenated.
const MAX_CHUNK_CHARS: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

pub struct GoogleTranslator {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self::with_base_url(TRANSLATE_ENDPOINT)
    }

    /// Point the client at a different host. Tests use this with a local
    /// mock server.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String> {
        let url = format!("{}/translate_a/single", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("dt", "t"),
                ("sl", source),
                ("tl", target),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?;

        // Response shape: [[["translated","source",...],...],...] — the
        // translation is split across segment[0] strings.
        let body: serde_json::Value = response.json().await?;
        let segments = body
            .get(0)
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("unexpected translate response shape"))?;

        let mut translated = String::new();
        for segment in segments {
            if let Some(piece) = segment.get(0).and_then(|p| p.as_str()) {
                translated.push_str(piece);
            }
        }
        if translated.is_empty() {
            anyhow::bail!("empty translation for target '{}'", target);
        }
        Ok(translated)
    }
}

pub struct GoogleSynthesizer {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleSynthesizer {
    pub fn new() -> Self {
        Self::with_base_url(TTS_ENDPOINT)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for GoogleSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for GoogleSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> anyhow::Result<Vec<u8>> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            anyhow::bail!("nothing to synthesize");
        }

        let url = format!("{}/translate_tts", self.base_url);
        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let query = [
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", chunk.as_str()),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ];
            let response = self
                .http
                .get(&url)
                .query(&query)
                .send()
                .await?
                .error_for_status()?;
            // MPEG frames are self-delimiting; fragments concatenate as-is.
            audio.extend_from_slice(&response.bytes().await?);
        }
        Ok(audio)
    }
}

/// Greedy word-boundary split with a hard split for words longer than the
/// limit. Counts characters, not bytes: CJK input is the common case here.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    fn flush(current: &mut String, current_len: &mut usize, chunks: &mut Vec<String>) {
        if !current.is_empty() {
            chunks.push(std::mem::take(current));
            *current_len = 0;
        }
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            flush(&mut current, &mut current_len, &mut chunks);
            let mut piece = String::new();
            let mut piece_len = 0;
            for ch in word.chars() {
                if piece_len == max_chars {
                    chunks.push(std::mem::take(&mut piece));
                    piece_len = 0;
                }
                piece.push(ch);
                piece_len += 1;
            }
            current = piece;
            current_len = piece_len;
            continue;
        }

        let separator = usize::from(!current.is_empty());
        if current_len + separator + word_len > max_chars {
            flush(&mut current, &mut current_len, &mut chunks);
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    flush(&mut current, &mut current_len, &mut chunks);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("horse", 100), vec!["horse"]);
    }

    #[test]
    fn splits_on_word_boundaries() {
        let chunks = split_text("one two three four", 9);
        assert_eq!(chunks, vec!["one two", "three", "four"]);
    }

    #[test]
    fn hard_splits_oversized_words() {
        let chunks = split_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn counts_chars_not_bytes() {
        // four CJK chars fit in a 4-char chunk even at 3 bytes each
        assert_eq!(split_text("馬馬馬馬", 4), vec!["馬馬馬馬"]);
    }

    #[test]
    fn whitespace_only_yields_no_chunks() {
        assert!(split_text("   ", 10).is_empty());
    }
}
