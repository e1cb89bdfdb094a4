//! Chunked, concurrency-bounded translation of a page's text fragments.
//!
//! One [`Dispatcher::translate_page`] call is one invocation: fragments are
//! segmented into chunks, at most `concurrency` chunk requests are in flight at
//! a time, and every settled chunk is reported to a [`ProgressSink`] as soon as
//! it arrives. Failed chunks are retried under the [`RetryPolicy`] and then
//! fall back to their original text, so an invocation always completes.

use futures_util::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::TranslateError;
use crate::languages;
use crate::providers::Provider;
use crate::providers::retry::RetryPolicy;
use crate::segmenter::{self, Chunk};
use crate::translations::{self, PromptRequest};

mod events;

pub use events::{
    ChunkRetry, ChunkTranslated, DispatchEvent, InvocationSummary, OrderedTranslations,
    ProgressSink,
};

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub max_chunk_size: usize,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub selection_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: segmenter::DEFAULT_MAX_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            selection_timeout: DEFAULT_SELECTION_TIMEOUT,
        }
    }
}

/// Counters of one invocation. Only the loop that drains chunk results
/// touches them.
#[derive(Debug)]
pub struct Invocation {
    total_chunks: usize,
    total_fragments: usize,
    completed_chunks: usize,
    failed_chunks: usize,
    started: Instant,
}

impl Invocation {
    pub fn new(total_chunks: usize, total_fragments: usize) -> Self {
        Self {
            total_chunks,
            total_fragments,
            completed_chunks: 0,
            failed_chunks: 0,
            started: Instant::now(),
        }
    }

    /// `round(100 * completed / total)`; an empty invocation is complete.
    pub fn progress(&self) -> u8 {
        if self.total_chunks == 0 {
            return 100;
        }
        let percent = (self.completed_chunks * 200 + self.total_chunks) / (self.total_chunks * 2);
        percent.min(100) as u8
    }

    pub fn is_finished(&self) -> bool {
        self.completed_chunks >= self.total_chunks
    }

    fn settle(&mut self, failed: bool) -> (u8, bool) {
        self.completed_chunks += 1;
        if failed {
            self.failed_chunks += 1;
        }
        (self.progress(), self.is_finished())
    }

    fn summary(&self) -> InvocationSummary {
        InvocationSummary {
            total_chunks: self.total_chunks,
            total_fragments: self.total_fragments,
            failed_chunks: self.failed_chunks,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[derive(Debug)]
struct ChunkOutcome {
    chunk: Chunk,
    translations: Vec<String>,
    failed: bool,
}

#[derive(Debug, Clone)]
pub struct Dispatcher<P: Provider> {
    provider: P,
    options: DispatchOptions,
}

impl<P: Provider> Dispatcher<P> {
    pub fn new(provider: P, options: DispatchOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn has_credential(&self) -> bool {
        self.provider.has_credential()
    }

    /// Translates every fragment, reporting chunk results to `sink` as they
    /// settle. Fails only on setup errors, before any request is sent.
    pub async fn translate_page<S: ProgressSink>(
        &self,
        fragments: Vec<String>,
        target_lang: &str,
        sink: &mut S,
    ) -> Result<InvocationSummary, TranslateError> {
        if !self.provider.has_credential() {
            return Err(TranslateError::MissingCredential);
        }
        if fragments.is_empty() {
            let summary = Invocation::new(0, 0).summary();
            sink.apply_completion(summary.clone());
            return Ok(summary);
        }

        let target_name = languages::prompt_language(target_lang);
        let chunks = segmenter::chunk_fragments(&fragments, self.options.max_chunk_size);
        let mut invocation = Invocation::new(chunks.len(), fragments.len());
        info!(
            "translating {} fragments in {} chunks to {}",
            fragments.len(),
            chunks.len(),
            target_name
        );
        sink.apply_started(chunks.len(), fragments.len());

        let (retry_tx, mut retry_rx) = mpsc::unbounded_channel();
        let target_name = target_name.as_str();
        let mut pending = stream::iter(chunks)
            .map(move |chunk| self.translate_chunk(chunk, target_name, retry_tx.clone()))
            .buffer_unordered(self.options.concurrency.max(1));

        loop {
            tokio::select! {
                biased;
                Some(retry) = retry_rx.recv() => sink.apply_retry(retry),
                outcome = pending.next() => {
                    let Some(outcome) = outcome else {
                        break;
                    };
                    let (progress, is_final) = invocation.settle(outcome.failed);
                    debug!(
                        "chunk {} settled ({}%, failed: {})",
                        outcome.chunk.index, progress, outcome.failed
                    );
                    sink.apply_result(ChunkTranslated {
                        chunk_index: outcome.chunk.index,
                        start_offset: outcome.chunk.start_offset,
                        translations: outcome.translations,
                        progress,
                        is_final,
                        fallback: outcome.failed,
                    });
                }
            }
        }
        while let Ok(retry) = retry_rx.try_recv() {
            sink.apply_retry(retry);
        }

        let summary = invocation.summary();
        info!(
            "translation finished: {} chunks, {} fell back to original text, {}ms",
            summary.total_chunks, summary.failed_chunks, summary.elapsed_ms
        );
        sink.apply_completion(summary.clone());
        Ok(summary)
    }

    /// Translates one piece of text in a single bounded request.
    pub async fn translate_selection(
        &self,
        text: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError> {
        if !self.provider.has_credential() {
            return Err(TranslateError::MissingCredential);
        }
        if text.trim().is_empty() {
            return Err(TranslateError::EmptyInput);
        }
        let target_name = languages::prompt_language(target_lang);
        let request = translations::render_selection_prompt(text, &target_name)?;
        self.request_single(request).await
    }

    /// Answers a question about a selected piece of text.
    pub async fn ask_question(
        &self,
        selected_text: &str,
        question: &str,
        response_lang: &str,
    ) -> Result<String, TranslateError> {
        if !self.provider.has_credential() {
            return Err(TranslateError::MissingCredential);
        }
        if selected_text.trim().is_empty() || question.trim().is_empty() {
            return Err(TranslateError::EmptyInput);
        }
        let response_name = languages::prompt_language(response_lang);
        let request =
            translations::render_question_prompt(selected_text, question.trim(), &response_name)?;
        self.request_single(request).await
    }

    async fn request_single(&self, request: PromptRequest) -> Result<String, TranslateError> {
        let limit = self.options.selection_timeout;
        let response = timeout(
            limit,
            self.provider.generate(request.prompt, request.generation),
        )
        .await
        .map_err(|_| TranslateError::Timeout(limit))??;
        debug!("single request answered ({})", response.usage_line());
        let text = response.text.unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(TranslateError::EmptyTranslation);
        }
        Ok(text.to_string())
    }

    async fn translate_chunk(
        &self,
        chunk: Chunk,
        target_name: &str,
        retries: UnboundedSender<ChunkRetry>,
    ) -> ChunkOutcome {
        let request = match translations::render_batch_prompt(&chunk.fragments, target_name) {
            Ok(request) => request,
            Err(err) => {
                warn!("chunk {}: {}; keeping original text", chunk.index, err);
                return fallback(chunk);
            }
        };

        let policy = self.options.retry;
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let result = self
                .provider
                .generate(request.prompt.clone(), request.generation)
                .await;
            match result {
                Ok(response) => {
                    debug!("chunk {} answered ({})", chunk.index, response.usage_line());
                    let parsed = translations::parse_translations(&response);
                    if parsed.len() != chunk.len() {
                        warn!(
                            "chunk {} translation count mismatch (expected {}, got {})",
                            chunk.index,
                            chunk.len(),
                            parsed.len()
                        );
                    }
                    let translations = translations::reconcile(&chunk.fragments, parsed);
                    return ChunkOutcome {
                        chunk,
                        translations,
                        failed: false,
                    };
                }
                Err(err) if err.is_retryable() && policy.allows_retry_after(attempt) => {
                    let delay = policy.delay_for(attempt, err.retry_after());
                    warn!(
                        "chunk {} failed (attempt {}/{}): {}; retrying in {:.1}s",
                        chunk.index,
                        attempt,
                        policy.max_attempts,
                        err,
                        delay.as_secs_f32()
                    );
                    let _ = retries.send(ChunkRetry {
                        chunk_index: chunk.index,
                        attempt,
                        max_attempts: policy.max_attempts,
                        delay_ms: delay.as_millis() as u64,
                        error: err.to_string(),
                    });
                    sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        "chunk {} failed after {} attempt(s): {}; keeping original text",
                        chunk.index, attempt, err
                    );
                    return fallback(chunk);
                }
            }
        }
    }
}

fn fallback(chunk: Chunk) -> ChunkOutcome {
    ChunkOutcome {
        translations: chunk.fragments.clone(),
        chunk,
        failed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{GenerationConfig, ProviderFuture, ProviderResponse};
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Behavior = dyn Fn(&[String], usize) -> Result<ProviderResponse, TranslateError> + Send + Sync;
    type Latency = dyn Fn(&[String]) -> Duration + Send + Sync;

    #[derive(Clone)]
    struct ScriptedProvider {
        credential: bool,
        latency: Arc<Latency>,
        calls: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        behavior: Arc<Behavior>,
    }

    impl ScriptedProvider {
        fn new(
            behavior: impl Fn(&[String], usize) -> Result<ProviderResponse, TranslateError>
            + Send
            + Sync
            + 'static,
        ) -> Self {
            Self {
                credential: true,
                latency: Arc::new(|_| Duration::ZERO),
                calls: Arc::new(AtomicUsize::new(0)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
                behavior: Arc::new(behavior),
            }
        }

        fn uppercase() -> Self {
            Self::new(|fragments, _| {
                let upper = fragments
                    .iter()
                    .map(|fragment| fragment.to_uppercase())
                    .collect::<Vec<_>>();
                Ok(ProviderResponse::from_text(
                    serde_json::to_string(&upper).unwrap(),
                ))
            })
        }

        fn without_credential(mut self) -> Self {
            self.credential = false;
            self
        }

        fn with_delay(self, delay: Duration) -> Self {
            self.with_latency(move |_| delay)
        }

        fn with_latency(
            mut self,
            latency: impl Fn(&[String]) -> Duration + Send + Sync + 'static,
        ) -> Self {
            self.latency = Arc::new(latency);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Provider for ScriptedProvider {
        fn has_credential(&self) -> bool {
            self.credential
        }

        fn generate(&self, prompt: String, _config: GenerationConfig) -> ProviderFuture {
            let this = self.clone();
            Box::pin(async move {
                let call = this.calls.fetch_add(1, Ordering::SeqCst) + 1;
                let now = this.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                this.max_in_flight.fetch_max(now, Ordering::SeqCst);
                let fragments = fragments_in_prompt(&prompt);
                let delay = (this.latency)(&fragments);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                this.in_flight.fetch_sub(1, Ordering::SeqCst);
                (this.behavior)(&fragments, call)
            })
        }
    }

    fn fragments_in_prompt(prompt: &str) -> Vec<String> {
        let Some((_, segments)) = prompt.split_once("Input segments:\n") else {
            return vec![prompt.to_string()];
        };
        segments
            .split("\n\n")
            .map(|segment| {
                segment
                    .split_once("] ")
                    .map(|(_, text)| text.to_string())
                    .unwrap_or_default()
            })
            .collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        started: Option<(usize, usize)>,
        results: Vec<ChunkTranslated>,
        retries: Vec<ChunkRetry>,
        completions: Vec<InvocationSummary>,
    }

    impl ProgressSink for RecordingSink {
        fn apply_started(&mut self, total_chunks: usize, total_fragments: usize) {
            self.started = Some((total_chunks, total_fragments));
        }

        fn apply_result(&mut self, result: ChunkTranslated) {
            self.results.push(result);
        }

        fn apply_retry(&mut self, retry: ChunkRetry) {
            self.retries.push(retry);
        }

        fn apply_completion(&mut self, summary: InvocationSummary) {
            self.completions.push(summary);
        }
    }

    fn options(max_chunk_size: usize) -> DispatchOptions {
        DispatchOptions {
            max_chunk_size,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
            },
            ..DispatchOptions::default()
        }
    }

    fn words(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("word{i}")).collect()
    }

    fn status(code: u16) -> TranslateError {
        TranslateError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            message: "failure".to_string(),
            retry_after: None,
        }
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_request() {
        let provider = ScriptedProvider::uppercase().without_credential();
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let mut sink = RecordingSink::default();
        let err = dispatcher
            .translate_page(words(5), "ko", &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::MissingCredential));
        assert!(err.is_configuration());
        assert_eq!(provider.calls(), 0);
        assert!(sink.started.is_none());
        assert!(sink.results.is_empty());
        assert!(sink.completions.is_empty());

        let err = dispatcher
            .translate_page(Vec::new(), "ko", &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::MissingCredential));
    }

    #[tokio::test]
    async fn empty_input_completes_immediately() {
        let provider = ScriptedProvider::uppercase();
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let mut sink = RecordingSink::default();
        let summary = dispatcher
            .translate_page(Vec::new(), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(summary.total_chunks, 0);
        assert_eq!(sink.completions.len(), 1);
        assert!(sink.results.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn results_are_streamed_per_chunk_and_complete_once() {
        let provider = ScriptedProvider::uppercase().with_delay(Duration::from_millis(5));
        let dispatcher = Dispatcher::new(provider.clone(), options(12));
        let fragments = words(9);
        let mut sink = RecordingSink::default();
        let summary = dispatcher
            .translate_page(fragments.clone(), "ko", &mut sink)
            .await
            .unwrap();

        let chunks = segmenter::chunk_fragments(&fragments, 12);
        assert_eq!(sink.started, Some((chunks.len(), fragments.len())));
        assert_eq!(sink.results.len(), chunks.len());
        assert_eq!(provider.calls(), chunks.len());
        assert_eq!(summary.total_chunks, chunks.len());
        assert_eq!(summary.failed_chunks, 0);
        assert_eq!(sink.completions, vec![summary]);

        let progress = sink.results.iter().map(|r| r.progress).collect::<Vec<_>>();
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(progress.last(), Some(&100));
        let finals = sink.results.iter().filter(|r| r.is_final).count();
        assert_eq!(finals, 1);
        assert!(sink.results.last().unwrap().is_final);

        let mut ordered = OrderedTranslations::new(&fragments);
        for result in sink.results.clone() {
            ordered.apply_result(result);
        }
        let expected = fragments
            .iter()
            .map(|fragment| fragment.to_uppercase())
            .collect::<Vec<_>>();
        assert_eq!(ordered.translations(), expected.as_slice());
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_ceiling() {
        let provider = ScriptedProvider::uppercase().with_delay(Duration::from_millis(20));
        let dispatcher = Dispatcher::new(provider.clone(), options(1));
        let mut sink = RecordingSink::default();
        dispatcher
            .translate_page(words(12), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 12);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(sink.results.len(), 12);
    }

    #[tokio::test]
    async fn single_slot_runs_chunks_one_at_a_time() {
        let provider = ScriptedProvider::uppercase().with_delay(Duration::from_millis(2));
        let mut dispatch_options = options(1);
        dispatch_options.concurrency = 1;
        let dispatcher = Dispatcher::new(provider.clone(), dispatch_options);
        let mut sink = RecordingSink::default();
        dispatcher
            .translate_page(words(4), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
        let offsets = sink
            .results
            .iter()
            .map(|r| r.start_offset)
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn slow_first_chunk_settles_last_and_closes_the_invocation() {
        let provider = ScriptedProvider::uppercase().with_latency(|fragments| {
            if fragments.iter().any(|fragment| fragment == "word0") {
                Duration::from_millis(80)
            } else {
                Duration::from_millis(5)
            }
        });
        let dispatcher = Dispatcher::new(provider, options(1));
        let fragments = words(4);
        let mut sink = RecordingSink::default();
        dispatcher
            .translate_page(fragments.clone(), "ko", &mut sink)
            .await
            .unwrap();

        let indices = sink
            .results
            .iter()
            .map(|result| result.chunk_index)
            .collect::<Vec<_>>();
        assert_eq!(indices.len(), 4);
        assert_eq!(indices.last(), Some(&0));
        let last = sink.results.last().unwrap();
        assert!(last.is_final);
        assert_eq!(last.progress, 100);
        assert_eq!(sink.results.iter().filter(|r| r.is_final).count(), 1);
        let progress = sink.results.iter().map(|r| r.progress).collect::<Vec<_>>();
        assert_eq!(progress, vec![25, 50, 75, 100]);

        let mut ordered = OrderedTranslations::new(&fragments);
        for result in sink.results.clone() {
            ordered.apply_result(result);
        }
        assert_eq!(ordered.translations(), ["WORD0", "WORD1", "WORD2", "WORD3"]);
    }

    #[tokio::test]
    async fn failed_chunk_falls_back_without_affecting_others() {
        let provider = ScriptedProvider::new(|fragments, _| {
            if fragments.iter().any(|fragment| fragment == "broken") {
                return Err(status(400));
            }
            Ok(ProviderResponse::from_text(
                serde_json::to_string(&vec!["ok"; fragments.len()]).unwrap(),
            ))
        });
        let dispatcher = Dispatcher::new(provider.clone(), options(1));
        let fragments = vec!["one".to_string(), "broken".to_string(), "three".to_string()];
        let mut ordered = OrderedTranslations::new(&fragments);
        let summary = dispatcher
            .translate_page(fragments, "ko", &mut ordered)
            .await
            .unwrap();
        assert_eq!(summary.failed_chunks, 1);
        assert_eq!(provider.calls(), 3);
        assert_eq!(ordered.translations(), ["ok", "broken", "ok"]);
        assert_eq!(ordered.progress(), 100);
        assert!(ordered.is_complete());
    }

    #[tokio::test]
    async fn retryable_failures_are_retried_then_succeed() {
        let provider = ScriptedProvider::new(|fragments, call| {
            if call < 3 {
                return Err(status(503));
            }
            Ok(ProviderResponse::from_text(
                serde_json::to_string(&vec!["done"; fragments.len()]).unwrap(),
            ))
        });
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let mut sink = RecordingSink::default();
        dispatcher
            .translate_page(words(2), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 3);
        assert_eq!(sink.retries.len(), 2);
        assert_eq!(sink.retries[0].attempt, 1);
        assert_eq!(sink.retries[1].attempt, 2);
        assert_eq!(sink.retries[1].max_attempts, 3);
        assert_eq!(sink.results.len(), 1);
        assert!(!sink.results[0].fallback);
        assert_eq!(sink.results[0].translations, vec!["done", "done"]);
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_to_original() {
        let provider = ScriptedProvider::new(|_, _| Err(status(429)));
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let fragments = words(3);
        let mut sink = RecordingSink::default();
        let summary = dispatcher
            .translate_page(fragments.clone(), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 3);
        assert_eq!(sink.retries.len(), 2);
        assert_eq!(summary.failed_chunks, 1);
        assert!(sink.results[0].fallback);
        assert!(sink.results[0].is_final);
        assert_eq!(sink.results[0].translations, fragments);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let provider = ScriptedProvider::new(|_, _| Err(status(403)));
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let mut sink = RecordingSink::default();
        dispatcher
            .translate_page(words(2), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
        assert!(sink.retries.is_empty());
        assert!(sink.results[0].fallback);
    }

    #[tokio::test]
    async fn short_answer_is_reconciled_with_originals() {
        let provider = ScriptedProvider::new(|_, _| {
            Ok(ProviderResponse::from_text("[\"t0\", \"t1\", \"t2\"]"))
        });
        let dispatcher = Dispatcher::new(provider, options(1000));
        let fragments = words(5);
        let mut sink = RecordingSink::default();
        dispatcher
            .translate_page(fragments.clone(), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.results.len(), 1);
        assert!(!sink.results[0].fallback);
        assert_eq!(
            sink.results[0].translations,
            vec!["t0", "t1", "t2", "word3", "word4"]
        );
    }

    #[tokio::test]
    async fn response_without_content_keeps_originals() {
        let provider = ScriptedProvider::new(|_, _| Ok(ProviderResponse::default()));
        let dispatcher = Dispatcher::new(provider, options(1000));
        let fragments = words(4);
        let mut sink = RecordingSink::default();
        dispatcher
            .translate_page(fragments.clone(), "ko", &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.results[0].translations, fragments);
        assert_eq!(sink.results[0].progress, 100);
    }

    #[test]
    fn progress_is_rounded_percentage() {
        let mut invocation = Invocation::new(3, 10);
        assert_eq!(invocation.progress(), 0);
        assert_eq!(invocation.settle(false), (33, false));
        assert_eq!(invocation.settle(true), (67, false));
        assert_eq!(invocation.settle(false), (100, true));
        assert_eq!(invocation.summary().failed_chunks, 1);

        let mut halves = Invocation::new(8, 8);
        let progress = (0..8).map(|_| halves.settle(false).0).collect::<Vec<_>>();
        assert_eq!(progress, vec![13, 25, 38, 50, 63, 75, 88, 100]);
    }

    #[tokio::test]
    async fn selection_returns_trimmed_translation() {
        let provider = ScriptedProvider::new(|_, _| Ok(ProviderResponse::from_text("  안녕하세요 \n")));
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let translation = dispatcher.translate_selection("Hello", "ko").await.unwrap();
        assert_eq!(translation, "안녕하세요");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn selection_validates_before_requesting() {
        let provider = ScriptedProvider::uppercase();
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let err = dispatcher.translate_selection("   ", "ko").await.unwrap_err();
        assert!(matches!(err, TranslateError::EmptyInput));

        let dispatcher = Dispatcher::new(provider.clone().without_credential(), options(100));
        let err = dispatcher.translate_selection("Hello", "ko").await.unwrap_err();
        assert!(matches!(err, TranslateError::MissingCredential));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn selection_reports_empty_answer_and_transport_errors() {
        let dispatcher = Dispatcher::new(
            ScriptedProvider::new(|_, _| Ok(ProviderResponse::default())),
            options(100),
        );
        let err = dispatcher.translate_selection("Hello", "ko").await.unwrap_err();
        assert!(matches!(err, TranslateError::EmptyTranslation));

        let provider = ScriptedProvider::new(|_, _| Err(status(503)));
        let dispatcher = Dispatcher::new(provider.clone(), options(100));
        let err = dispatcher.translate_selection("Hello", "ko").await.unwrap_err();
        assert!(matches!(err, TranslateError::Status { .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn selection_times_out() {
        let provider = ScriptedProvider::uppercase().with_delay(Duration::from_millis(500));
        let mut dispatch_options = options(100);
        dispatch_options.selection_timeout = Duration::from_millis(20);
        let dispatcher = Dispatcher::new(provider, dispatch_options);
        let err = dispatcher.translate_selection("Hello", "ko").await.unwrap_err();
        assert!(matches!(err, TranslateError::Timeout(limit) if limit == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn question_is_answered_in_requested_language() {
        let provider = ScriptedProvider::new(|prompt, _| {
            let prompt = prompt.join("");
            assert!(prompt.contains("Write the whole answer in Korean."));
            assert!(prompt.contains("Question: What is this?"));
            Ok(ProviderResponse::from_text("설명입니다."))
        });
        let dispatcher = Dispatcher::new(provider, options(100));
        let answer = dispatcher
            .ask_question("borrow checker", " What is this? ", "ko")
            .await
            .unwrap();
        assert_eq!(answer, "설명입니다.");

        let err = dispatcher
            .ask_question("borrow checker", "  ", "ko")
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::EmptyInput));
    }
}
