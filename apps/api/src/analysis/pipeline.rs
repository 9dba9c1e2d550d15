//! Pieces shared by both analysis orchestrators: the run's stage machine,
//! the per-run streaming session, and final-payload resolution.

use std::fmt;
use std::marker::PhantomData;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::error::AnalysisError;
use crate::analysis::extractor::{extract, narrative_text};
use crate::analysis::normalizer::{normalize, CanonicalRecord, RawPayload};
use crate::live::{EntityKind, LivePublisher, LiveUpdate};

// ────────────────────────────────────────────────────────────────────────────
// Stage machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Idle,
    Streaming,
    Finalizing,
    Persisted,
    Failed,
}

impl AnalysisStage {
    pub fn can_advance_to(self, next: AnalysisStage) -> bool {
        use AnalysisStage::*;
        matches!(
            (self, next),
            (Idle, Streaming)
                | (Streaming, Finalizing)
                | (Finalizing, Persisted)
                | (Idle | Streaming | Finalizing, Failed)
        )
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisStage::Idle => "idle",
            AnalysisStage::Streaming => "streaming",
            AnalysisStage::Finalizing => "finalizing",
            AnalysisStage::Persisted => "persisted",
            AnalysisStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one run's stage and logs every transition.
#[derive(Debug)]
pub struct StageTracker {
    kind: EntityKind,
    id: Uuid,
    stage: AnalysisStage,
}

impl StageTracker {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self {
            kind,
            id,
            stage: AnalysisStage::Idle,
        }
    }

    pub fn stage(&self) -> AnalysisStage {
        self.stage
    }

    pub fn advance(&mut self, next: AnalysisStage) {
        if !self.stage.can_advance_to(next) {
            warn!(
                entity = %self.kind,
                id = %self.id,
                from = %self.stage,
                to = %next,
                "Unexpected analysis stage transition"
            );
        }
        debug!(entity = %self.kind, id = %self.id, from = %self.stage, to = %next, "Analysis stage");
        self.stage = next;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Streaming session
// ────────────────────────────────────────────────────────────────────────────

/// Task-scoped stream state: owns the growing buffer and pushes a partial
/// update every time the whole buffer normalizes into a record.
pub struct StreamSession<'a, R> {
    channel: &'a str,
    publisher: &'a dyn LivePublisher,
    buffer: String,
    pushes: usize,
    _record: PhantomData<fn() -> R>,
}

impl<'a, R: CanonicalRecord> StreamSession<'a, R> {
    pub fn new(channel: &'a str, publisher: &'a dyn LivePublisher) -> Self {
        Self {
            channel,
            publisher,
            buffer: String::new(),
            pushes: 0,
            _record: PhantomData,
        }
    }

    pub fn on_chunk(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.push_str(chunk);

        let Some(fragment) = extract(&self.buffer) else {
            return;
        };
        let Some(record) = normalize::<R>(RawPayload::Mapping(fragment.parsed)) else {
            return;
        };
        let analysis = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Could not serialize partial analysis");
                return;
            }
        };

        let raw_content = narrative_text(&self.buffer, Some(&fragment.raw));
        self.publisher
            .publish(LiveUpdate::stream(self.channel, raw_content, analysis));
        self.pushes += 1;
    }

    /// Stream updates published so far.
    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn into_buffer(self) -> String {
        self.buffer
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Finalization
// ────────────────────────────────────────────────────────────────────────────

/// Normalizes the final message content, falling back to the accumulated
/// buffer. Neither yielding a record is an empty response.
pub fn finalize<R: CanonicalRecord>(content: RawPayload, buffer: &str) -> Result<R, AnalysisError> {
    normalize::<R>(content)
        .or_else(|| normalize::<R>(RawPayload::Text(buffer.to_string())))
        .ok_or(AnalysisError::EmptyResponse)
}

/// How a run ended, as seen by the task runner.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome<R> {
    Persisted(R),
    /// The error was broadcast on the live channel; nothing was saved.
    Failed { message: String },
}
