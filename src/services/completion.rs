//! Completion requests.
//!
//! Builds the prompt for an instruction and a chunk of selected text, and fans
//! a list of chunks out to the provider concurrently.
//!
//! # Prompt Format
//!
//! | Chunk | Prompt |
//! |-------|--------|
//! | empty | `{instruction}` |
//! | non-empty | `{instruction}\n\n###\n\n{chunk}` |

use crate::config::LlmConfig;
use crate::llm::LlmProvider;
use crate::{Error, Result};
use std::time::Instant;

/// Separator placed between the instruction and the chunk.
pub const PROMPT_DELIMITER: &str = "\n\n###\n\n";

/// Outcome of one completion slot: text, no choice returned, or failure.
pub type CompletionOutcome = Result<Option<String>>;

/// Builds the prompt sent for one chunk.
#[must_use]
pub fn build_prompt(instruction: &str, chunk: &str) -> String {
    if chunk.is_empty() {
        instruction.to_string()
    } else {
        format!("{instruction}{PROMPT_DELIMITER}{chunk}")
    }
}

/// Splits a selection into line chunks.
///
/// A trailing newline yields a final empty chunk: `"a\nb\n"` becomes
/// `["a", "b", ""]`. One trailing `'\r'` is dropped from each chunk.
#[must_use]
pub fn split_chunks(selection: &str) -> Vec<&str> {
    selection
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Issues completion requests through an [`LlmProvider`].
pub struct CompletionRequester<P: LlmProvider> {
    provider: P,
    max_concurrency: usize,
}

impl<P: LlmProvider> CompletionRequester<P> {
    /// Creates a requester with the default fan-out cap.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            max_concurrency: LlmConfig::DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Caps the number of requests in flight at once (minimum 1).
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Returns the underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Requests one completion for `instruction` applied to `chunk`.
    pub fn complete(&self, instruction: &str, chunk: &str) -> CompletionOutcome {
        let prompt = build_prompt(instruction, chunk);
        let start = Instant::now();
        metrics::counter!("completion_requests_total", "provider" => self.provider.name())
            .increment(1);

        let outcome = self.provider.complete(&prompt);

        match &outcome {
            Ok(Some(text)) => tracing::debug!(
                provider = self.provider.name(),
                elapsed_ms = start.elapsed().as_millis(),
                completion_len = text.len(),
                "Completion received"
            ),
            Ok(None) => tracing::warn!(
                provider = self.provider.name(),
                "Completion API returned no choices"
            ),
            Err(e) => {
                metrics::counter!("completion_failures_total", "provider" => self.provider.name())
                    .increment(1);
                tracing::warn!(provider = self.provider.name(), error = %e, "Completion failed");
            },
        }
        outcome
    }

    /// Requests one completion per chunk, concurrently.
    ///
    /// Returns one outcome per chunk in input order once every request has
    /// settled. A failed slot does not affect the others, and a request
    /// thread that cannot be spawned fails only its own slot.
    pub fn complete_batch(&self, instruction: &str, chunks: &[&str]) -> Vec<CompletionOutcome> {
        if chunks.is_empty() {
            return Vec::new();
        }
        let window = self.max_concurrency.min(chunks.len());
        tracing::info!(
            chunks = chunks.len(),
            max_in_flight = window,
            "Fanning out completion requests"
        );

        let mut outcomes = Vec::with_capacity(chunks.len());
        for group in chunks.chunks(window) {
            std::thread::scope(|s| {
                let handles: Vec<_> = group
                    .iter()
                    .map(|chunk| {
                        std::thread::Builder::new()
                            .name("instruct-completion".to_string())
                            .spawn_scoped(s, move || self.complete(instruction, chunk))
                    })
                    .collect();
                outcomes.extend(handles.into_iter().map(|spawned| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        Err(Error::operation(
                            "completion_request",
                            "request thread panicked",
                        ))
                    }),
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not spawn completion thread");
                        Err(Error::operation("spawn_completion_thread", e))
                    },
                }));
            });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records prompts; fails on prompts containing "boom".
    struct Recording {
        prompts: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl LlmProvider for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn complete(&self, prompt: &str) -> Result<Option<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.contains("boom") {
                return Err(Error::operation("recording", "boom"));
            }
            Ok(Some(format!("<{}>", prompt.len())))
        }
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt("Summarize", ""), "Summarize");
        assert_eq!(
            build_prompt("Summarize", "text"),
            "Summarize\n\n###\n\ntext"
        );
    }

    #[test]
    fn test_split_chunks_keeps_trailing_empty() {
        assert_eq!(split_chunks("a\nb\n"), vec!["a", "b", ""]);
        assert_eq!(split_chunks("single"), vec!["single"]);
        assert_eq!(split_chunks(""), vec![""]);
    }

    #[test]
    fn test_split_chunks_drops_carriage_returns() {
        assert_eq!(split_chunks("a\r\nb\r\n"), vec!["a", "b", ""]);
        assert_eq!(split_chunks("a\r\r\nb"), vec!["a\r", "b"]);
    }

    #[test]
    fn test_complete_sends_built_prompt() {
        let requester = CompletionRequester::new(Recording::new());
        let outcome = requester.complete("Fix", "teh cat").unwrap();
        assert!(outcome.is_some());
        assert_eq!(
            requester.provider().prompts.lock().unwrap().as_slice(),
            ["Fix\n\n###\n\nteh cat".to_string()]
        );
    }

    #[test]
    fn test_batch_isolates_failures_and_keeps_order() {
        let requester = CompletionRequester::new(Recording::new());
        let outcomes = requester.complete_batch("I", &["one", "boom", "three"]);

        assert_eq!(outcomes.len(), 3);
        let expected = format!("<{}>", build_prompt("I", "one").len());
        assert_eq!(
            outcomes[0].as_ref().unwrap().as_deref(),
            Some(expected.as_str())
        );
        assert!(outcomes[1].is_err());
        assert!(outcomes[2].as_ref().unwrap().is_some());
        assert_eq!(requester.provider().prompts.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_batch_runs_concurrently() {
        let requester = CompletionRequester::new(Recording::new());
        requester.complete_batch("I", &["a", "b", "c", "d"]);
        assert!(requester.provider().peak.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_batch_respects_concurrency_cap() {
        let requester = CompletionRequester::new(Recording::new()).with_max_concurrency(2);
        let outcomes = requester.complete_batch("I", &["a", "b", "c", "d", "e"]);
        assert_eq!(outcomes.len(), 5);
        assert!(requester.provider().peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_batch_is_bounded_by_default() {
        let chunks: Vec<String> = (0..40).map(|n| n.to_string()).collect();
        let chunks: Vec<&str> = chunks.iter().map(String::as_str).collect();

        let requester = CompletionRequester::new(Recording::new());
        let outcomes = requester.complete_batch("I", &chunks);

        assert_eq!(outcomes.len(), 40);
        assert!(outcomes.iter().all(Result::is_ok));
        let peak = requester.provider().peak.load(Ordering::SeqCst);
        assert!(peak <= LlmConfig::DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn test_empty_batch() {
        let requester = CompletionRequester::new(Recording::new());
        assert!(requester.complete_batch("I", &[]).is_empty());
    }
}
