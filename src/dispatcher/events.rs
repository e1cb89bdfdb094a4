use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Result of one settled chunk. Consumers must place `translations` by
/// `start_offset`; chunks settle in whatever order the network answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkTranslated {
    pub chunk_index: usize,
    pub start_offset: usize,
    pub translations: Vec<String>,
    pub progress: u8,
    pub is_final: bool,
    /// The request failed and `translations` holds the original text.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRetry {
    pub chunk_index: usize,
    pub attempt: usize,
    pub max_attempts: usize,
    pub delay_ms: u64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationSummary {
    pub total_chunks: usize,
    pub total_fragments: usize,
    pub failed_chunks: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DispatchEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        total_chunks: usize,
        total_fragments: usize,
    },
    ChunkTranslated(ChunkTranslated),
    ChunkRetry(ChunkRetry),
    Complete(InvocationSummary),
    Error { error: String },
}

/// Receives the incremental output of a page translation.
pub trait ProgressSink {
    fn apply_started(&mut self, _total_chunks: usize, _total_fragments: usize) {}

    fn apply_result(&mut self, result: ChunkTranslated);

    fn apply_retry(&mut self, _retry: ChunkRetry) {}

    fn apply_completion(&mut self, summary: InvocationSummary);
}

// A closed receiver means the consumer went away; the invocation still runs
// to completion.
impl ProgressSink for UnboundedSender<DispatchEvent> {
    fn apply_started(&mut self, total_chunks: usize, total_fragments: usize) {
        let _ = self.send(DispatchEvent::Started {
            total_chunks,
            total_fragments,
        });
    }

    fn apply_result(&mut self, result: ChunkTranslated) {
        let _ = self.send(DispatchEvent::ChunkTranslated(result));
    }

    fn apply_retry(&mut self, retry: ChunkRetry) {
        let _ = self.send(DispatchEvent::ChunkRetry(retry));
    }

    fn apply_completion(&mut self, summary: InvocationSummary) {
        let _ = self.send(DispatchEvent::Complete(summary));
    }
}

/// Collects chunk results into a fragment-ordered list, pre-filled with the
/// original text so that unanswered positions are never empty.
#[derive(Debug, Clone)]
pub struct OrderedTranslations {
    slots: Vec<String>,
    progress: u8,
    summary: Option<InvocationSummary>,
}

impl OrderedTranslations {
    pub fn new(fragments: &[String]) -> Self {
        Self {
            slots: fragments.to_vec(),
            progress: 0,
            summary: None,
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn summary(&self) -> Option<&InvocationSummary> {
        self.summary.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.summary.is_some()
    }

    pub fn translations(&self) -> &[String] {
        &self.slots
    }

    pub fn into_translations(self) -> Vec<String> {
        self.slots
    }
}

impl ProgressSink for OrderedTranslations {
    fn apply_result(&mut self, result: ChunkTranslated) {
        for (offset, translation) in result.translations.into_iter().enumerate() {
            if let Some(slot) = self.slots.get_mut(result.start_offset + offset) {
                *slot = translation;
            }
        }
        self.progress = self.progress.max(result.progress);
    }

    fn apply_completion(&mut self, summary: InvocationSummary) {
        if summary.total_chunks == 0 {
            self.progress = 100;
        }
        self.summary = Some(summary);
    }
}
