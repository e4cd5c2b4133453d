use tracing::{debug, info, warn};

use crate::error::ExtractError;

use super::lines::LineKind;

/// Why the finalizer dropped a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    PureNoise,
    Reply,
}

/// Coarser strategy entered when the structured pass yields nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    SentenceChunks,
    Emergency,
}

/// Diagnostic event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    AuthorDetected { handle: String },
    Classified { line: usize, kind: LineKind },
    ExclusionSkipped { from: usize, to: usize },
    PostAccepted { index: usize },
    PostRejected { index: usize, reason: Rejection },
    PostSplit { label: String, parts: usize },
    PostsMerged { label: String },
    FallbackEntered(FallbackTier),
    Recovered(ExtractError),
}

/// Receives engine diagnostics. The engine never logs on its own.
pub trait Observer {
    fn on_event(&mut self, event: Event);
}

/// Discards every event.
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&mut self, _event: Event) {}
}

/// Forwards events to `tracing`.
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&mut self, event: Event) {
        match event {
            Event::Classified { .. } | Event::PostAccepted { .. } => {}
            Event::PostRejected { index, reason } => debug!("Dropped candidate post {}: {:?}", index, reason),
            Event::ExclusionSkipped { from, to } => debug!("Skipped reply block at lines {}..{}", from, to),
            Event::AuthorDetected { handle } => info!("Detected thread author: {}", handle),
            Event::PostSplit { label, parts } => debug!("Split oversized post '{}' into {} parts", label, parts),
            Event::PostsMerged { label } => debug!("Merged short post '{}' into its successor", label),
            Event::FallbackEntered(tier) => warn!("Structured parsing yielded nothing, using {:?} fallback", tier),
            Event::Recovered(e) => warn!("{}", e),
        }
    }
}

impl Observer for Vec<Event> {
    fn on_event(&mut self, event: Event) {
        self.push(event);
    }
}
