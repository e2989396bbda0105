//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to be told
//! when each pipeline stage starts and finishes. The CLI uses it to drive a
//! spinner; a server could forward events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use flashgen::{GenerationProgressCallback, GeneratorConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     finished: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} took {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(StageCounter { finished: AtomicUsize::new(0) });
//!
//! let config = GeneratorConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// One step of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// PDF parsing or OCR of the uploaded file.
    Extract,
    /// Combining and truncating the text.
    Normalize,
    /// Waiting on the completion API.
    Generate,
    /// Parsing the model's answer into cards.
    Coerce,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Generate => "generate",
            Stage::Coerce => "coerce",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` because one
/// generator may serve several requests at once.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails; no further stage runs afterwards.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after the batch has been built.
    fn on_generation_complete(&self, card_count: usize) {
        let _ = card_count;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl GenerationProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }

        fn on_stage_error(&self, stage: Stage, error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error:{stage}:{error}"));
        }
    }

    #[test]
    fn noop_callback_accepts_every_event() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Extract);
        cb.on_stage_complete(Stage::Extract, 12);
        cb.on_stage_error(Stage::Generate, "boom");
        cb.on_generation_complete(3);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_stage_start(Stage::Normalize);
        rec.on_stage_complete(Stage::Normalize, 1);
        rec.on_stage_error(Stage::Coerce, "not json");
        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["start:normalize".to_string(), "error:coerce:not json".to_string()]
        );
    }

    #[test]
    fn callback_is_object_safe() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_generation_complete(0);
    }
}
