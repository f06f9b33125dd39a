//! Streaming batch analysis: emit results as screenshots complete.
//!
//! A campaign export is often dozens of screenshots. Unlike the eager
//! [`crate::analyze::analyze`], [`analyze_stream`] runs up to
//! `config.concurrency` analyses at once and yields each result as soon as it
//! is ready, so callers can write slices to disk or update a UI
//! incrementally. Results arrive in completion order; each carries its input
//! string.

use crate::analyze::analyze;
use crate::config::SliceConfig;
use crate::error::SlicerError;
use crate::output::SliceAnalysis;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// One finished screenshot: the input as given and its outcome.
#[derive(Debug)]
pub struct StreamItem {
    pub input: String,
    pub result: Result<SliceAnalysis, SlicerError>,
}

/// A boxed stream of per-screenshot results.
pub type AnalysisStream = Pin<Box<dyn Stream<Item = StreamItem> + Send>>;

/// Analyse many screenshots with bounded concurrency.
///
/// A failure on one input is reported in its [`StreamItem`] and does not
/// stop the others.
///
/// # Errors
/// Returns `Err` only when the configuration is invalid.
///
/// # Example
/// ```rust,no_run
/// use email_slicer::{analyze_stream, SliceConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inputs = vec!["welcome.png".to_string(), "promo.png".to_string()];
/// let mut stream = analyze_stream(inputs, &SliceConfig::default())?;
/// while let Some(item) = stream.next().await {
///     match item.result {
///         Ok(a) => println!("{}: {} slices", item.input, a.slices().len()),
///         Err(e) => eprintln!("{}: {e}", item.input),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn analyze_stream(inputs: Vec<String>, config: &SliceConfig) -> Result<AnalysisStream, SlicerError> {
    config.validate()?;
    info!(
        "Starting batch analysis: {} screenshots, concurrency {}",
        inputs.len(),
        config.concurrency
    );

    let concurrency = config.concurrency;
    let config_clone = config.clone();

    let s = stream::iter(inputs.into_iter().map(move |input| {
        let cfg = config_clone.clone();
        async move {
            let result = analyze(&input, &cfg).await;
            StreamItem { input, result }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_are_reported_per_input() {
        let inputs = vec!["/missing/a.png".to_string(), "/missing/b.png".to_string()];
        let items: Vec<StreamItem> = analyze_stream(inputs, &SliceConfig::default())
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|i| matches!(i.result, Err(SlicerError::FileNotFound { .. }))));
        let mut names: Vec<&str> = items.iter().map(|i| i.input.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["/missing/a.png", "/missing/b.png"]);
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = SliceConfig {
            concurrency: 0,
            ..SliceConfig::default()
        };
        assert!(analyze_stream(vec![], &config).is_err());
    }
}
