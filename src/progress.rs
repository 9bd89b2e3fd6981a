//! Progress-callback trait for per-field generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to observe a
//! generation pass as it works through the field mapping. The CLI uses it to
//! drive a progress bar; the server leaves it unset.
//!
//! # Example
//!
//! ```rust
//! use research_deck::{FieldOutcome, GenerationConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct MissCounter(AtomicUsize);
//!
//! impl GenerationProgressCallback for MissCounter {
//!     fn on_field_complete(&self, field: &str, outcome: &FieldOutcome) {
//!         if !outcome.is_applied() {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!             eprintln!("{field}: {outcome}");
//!         }
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(MissCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::FieldOutcome;
use std::sync::Arc;

/// Called by the orchestrator as it processes each field.
///
/// Every method has a no-op default so implementations override only what
/// they need. A pass runs sequentially, but the same callback may be shared
/// by concurrent passes in the server, hence `Send + Sync`.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once after the template is opened.
    ///
    /// # Arguments
    /// * `total_fields` — number of fields the pass will attempt
    /// * `slide_count`  — slides in the opened template
    fn on_generation_start(&self, total_fields: usize, slide_count: usize) {
        let _ = (total_fields, slide_count);
    }

    /// Called before a field is substituted or an image is fetched.
    fn on_field_start(&self, field: &str) {
        let _ = field;
    }

    /// Called with the outcome recorded for a field.
    fn on_field_complete(&self, field: &str, outcome: &FieldOutcome) {
        let _ = (field, outcome);
    }

    /// Called once after the deck has been serialised.
    ///
    /// # Arguments
    /// * `applied` — fields with at least one changed location
    /// * `total`   — fields recorded in the result map
    fn on_generation_complete(&self, applied: usize, total: usize) {
        let _ = (applied, total);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
