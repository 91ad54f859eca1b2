use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::errors::AppError;

use super::{canonical_language, SpeechRequest, DEFAULT_LANGUAGE, FILLER_TEXT};

/// Machine-translation collaborator. Blocking network call with its own
/// timeout; the engine imposes no extra deadline.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String>;
}

/// Text-to-speech collaborator. Returns one MP3 fragment per call.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> anyhow::Result<Vec<u8>>;
}

/// One unit of "produce spoken audio for (text, language)". When
/// `translate_from` is set the task translates before synthesizing.
#[derive(Debug, Clone)]
struct Task {
    text: String,
    language: &'static str,
    translate_from: Option<&'static str>,
}

/// Concurrent fan-out over synthesis tasks.
///
/// Tasks run under a bounded worker budget. A failed task is logged and
/// contributes nothing; it never aborts its siblings. Fragments are
/// concatenated in completion order — request order is explicitly not
/// guaranteed.
pub struct SpeechEngine {
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    workers: usize,
}

impl SpeechEngine {
    pub fn new(
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
        workers: usize,
    ) -> Self {
        Self {
            translator,
            synthesizer,
            workers: workers.max(1),
        }
    }

    /// Produce one concatenated MP3 byte stream for the request.
    ///
    /// Zero successful tasks degrade to a spoken filler utterance rather
    /// than an empty or error response; only a filler failure surfaces as
    /// `Synthesis`.
    pub async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, AppError> {
        let tasks = plan(request)?;

        let mut audio = Vec::new();
        let mut fragments = stream::iter(tasks)
            .map(|task| self.run_task(task))
            .buffer_unordered(self.workers);
        while let Some(fragment) = fragments.next().await {
            if let Some(bytes) = fragment {
                audio.extend_from_slice(&bytes);
            }
        }

        if audio.is_empty() {
            tracing::info!("no synthesis task produced audio, falling back to filler utterance");
            return self
                .synthesizer
                .synthesize(FILLER_TEXT, DEFAULT_LANGUAGE)
                .await
                .map_err(|e| AppError::Synthesis(e.to_string()));
        }
        Ok(audio)
    }

    /// Pending → (Translating) → Synthesizing → Succeeded | Failed.
    /// Both failure exits are terminal for the task only.
    async fn run_task(&self, task: Task) -> Option<Vec<u8>> {
        let text = match task.translate_from {
            Some(source) => {
                match self
                    .translator
                    .translate(&task.text, source, task.language)
                    .await
                {
                    Ok(translated) => {
                        tracing::info!("Translation to {}: {}", task.language, translated);
                        translated
                    }
                    Err(e) => {
                        tracing::error!("Failed to translate for {}: {}", task.language, e);
                        return None;
                    }
                }
            }
            None => task.text,
        };

        match self.synthesizer.synthesize(&text, task.language).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("Failed to generate speech for {}: {}", task.language, e);
                None
            }
        }
    }
}

/// Apply the per-shape validation rules and expand the request into tasks.
///
/// Shape (a) silently skips unsupported languages. Shape (b) fails on an
/// unsupported source language, silently skips unsupported targets, and
/// synthesizes the source itself directly from the original text.
fn plan(request: SpeechRequest) -> Result<Vec<Task>, AppError> {
    match request {
        SpeechRequest::Localized(pairs) => Ok(pairs
            .into_iter()
            .filter_map(|(language, text)| match canonical_language(&language) {
                Some(canonical) => Some(Task {
                    text,
                    language: canonical,
                    translate_from: None,
                }),
                None => {
                    tracing::debug!("skipping unsupported language: {}", language);
                    None
                }
            })
            .collect()),

        SpeechRequest::Translated {
            text,
            language,
            targets,
        } => {
            let Some(source) = canonical_language(&language) else {
                tracing::info!("Invalid primary language: {}", language);
                return Err(AppError::InvalidLanguage(language));
            };

            let mut tasks = vec![Task {
                text: text.clone(),
                language: source,
                translate_from: None,
            }];
            for target in targets {
                match canonical_language(&target) {
                    Some(canonical) => tasks.push(Task {
                        text: text.clone(),
                        language: canonical,
                        translate_from: Some(source),
                    }),
                    None => tracing::debug!("skipping unsupported language: {}", target),
                }
            }
            Ok(tasks)
        }
    }
}
