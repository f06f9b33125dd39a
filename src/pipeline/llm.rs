//! Semantic boundary proposal: ask a vision LLM where the sections are.
//!
//! The proposal is untrusted input to the validator, which repairs whatever
//! comes back. This module therefore only has to get *some* list of integers
//! out of the model, and to fail softly: every error becomes a
//! [`StageError`] and the analysis continues with an empty proposal.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 from LLM APIs are transient under concurrent load.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`): with 500 ms base and
//! 3 retries the waits are 500 ms → 1 s → 2 s. Each attempt is bounded by
//! `api_timeout_secs`. A reply that parses but contains no integer list is
//! not retried; the model is deterministic at temperature 0.

use crate::config::SliceConfig;
use crate::error::StageError;
use crate::prompts::{boundary_request, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Input to a [`BoundaryProposer`].
#[derive(Debug, Clone, Copy)]
pub struct ProposalRequest<'a> {
    pub image: &'a ImageData,
    pub image_width: u32,
    pub image_height: u32,
}

/// Raw boundaries as returned by a proposer, plus usage accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Proposal {
    pub boundaries: Vec<i64>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub retries: u8,
}

/// Anything that can propose raw section boundaries for a screenshot.
pub trait BoundaryProposer: Send + Sync {
    fn propose<'a>(&'a self, request: ProposalRequest<'a>) -> BoxFuture<'a, Result<Proposal, StageError>>;
}

/// [`BoundaryProposer`] backed by an `edgequake-llm` vision provider.
pub struct LlmBoundaryProposer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl LlmBoundaryProposer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &SliceConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }

    async fn run(&self, request: ProposalRequest<'_>) -> Result<Proposal, StageError> {
        let start = Instant::now();
        let user_text = boundary_request(request.image_width, request.image_height);
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(user_text.as_str(), vec![request.image.clone()]),
        ];

        let mut last_err: Option<StageError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Boundary proposal: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&self.options));
            match timeout(Duration::from_secs(self.timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Boundary proposal: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return match parse_boundary_reply(&response.content) {
                        Some(boundaries) => Ok(Proposal {
                            boundaries,
                            input_tokens: response.prompt_tokens as u64,
                            output_tokens: response.completion_tokens as u64,
                            retries: attempt as u8,
                        }),
                        None => Err(StageError::ProposalUnparseable {
                            excerpt: response.content.chars().take(120).collect(),
                        }),
                    };
                }
                Ok(Err(e)) => {
                    warn!("Boundary proposal: attempt {} failed — {}", attempt + 1, e);
                    last_err = Some(StageError::ProposalFailed {
                        retries: self.max_retries as u8,
                        detail: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "Boundary proposal: attempt {} timed out after {}s",
                        attempt + 1,
                        self.timeout_secs
                    );
                    last_err = Some(StageError::ProposalTimeout {
                        secs: self.timeout_secs,
                    });
                }
            }
        }

        Err(last_err.unwrap_or(StageError::ProposalFailed {
            retries: self.max_retries as u8,
            detail: "Unknown error".into(),
        }))
    }
}

impl BoundaryProposer for LlmBoundaryProposer {
    fn propose<'a>(&'a self, request: ProposalRequest<'a>) -> BoxFuture<'a, Result<Proposal, StageError>> {
        Box::pin(self.run(request))
    }
}

static ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\[\]]*)\]").unwrap());

/// Extract the first bracketed list of numbers from a model reply.
///
/// Fractional values are rounded; elements that are not numbers make the
/// whole list invalid and the search moves on to the next bracket pair.
/// `[]` is a valid (empty) proposal.
pub fn parse_boundary_reply(text: &str) -> Option<Vec<i64>> {
    ARRAY_RE.captures_iter(text).find_map(|caps| {
        let inner = caps[1].trim();
        if inner.is_empty() {
            return Some(Vec::new());
        }
        inner
            .split(',')
            .map(|item| item.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
            .map(|v| v.map(|v| v.round() as i64))
            .collect()
    })
}

/// Build `CompletionOptions` from the slice config.
fn build_options(config: &SliceConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = SliceConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn parses_plain_array() {
        assert_eq!(parse_boundary_reply("[0, 412, 980]"), Some(vec![0, 412, 980]));
    }

    #[test]
    fn parses_array_inside_prose_and_fences() {
        let reply = "Sure! Here are the cuts:\n```json\n[120, 340.6, -5]\n```";
        assert_eq!(parse_boundary_reply(reply), Some(vec![120, 341, -5]));
    }

    #[test]
    fn skips_non_numeric_brackets() {
        let reply = "[header] then [hero] at [0, 300]";
        assert_eq!(parse_boundary_reply(reply), Some(vec![0, 300]));
    }

    #[test]
    fn empty_array_is_valid() {
        assert_eq!(parse_boundary_reply("[]"), Some(vec![]));
    }

    #[test]
    fn no_array_is_none() {
        assert_eq!(parse_boundary_reply("I cannot see the image."), None);
    }
}
