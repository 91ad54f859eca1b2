//! Off-hardware companion runner: tag detection is simulated from stdin
//! and playback is discarded, the way the device script runs without its
//! reader attached.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use speechgate::companion::{AudioSink, Companion, CompanionConfig, TagReader};
use speechgate::config;

const SAMPLE_PAYLOAD: &str = r#"{"localization":{"zh-tw":"馬","en":"horse"}}"#;

struct PromptReader {
    lines: Lines<BufReader<Stdin>>,
    eof: bool,
}

impl PromptReader {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            eof: false,
        }
    }
}

#[async_trait]
impl TagReader for PromptReader {
    async fn read_payload(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        if self.eof {
            return Ok(None);
        }
        println!("Press Enter to simulate NFC tag detection...");
        match self.lines.next_line().await? {
            Some(_) => Ok(Some(SAMPLE_PAYLOAD.as_bytes().to_vec())),
            None => {
                self.eof = true;
                Ok(None)
            }
        }
    }
}

struct DiscardSink;

#[async_trait]
impl AudioSink for DiscardSink {
    async fn play(&mut self, audio: &[u8]) -> anyhow::Result<()> {
        tracing::info!("Simulating audio playback ({} bytes)", audio.len());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config::log_filter()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let companion = Companion::new(CompanionConfig::from_env());
    let mut reader = PromptReader::new();
    let mut sink = DiscardSink;

    tokio::select! {
        result = companion.run(&mut reader, &mut sink) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Gracefully shutting down");
            Ok(())
        }
    }
}
