//! Prepaint Snapshot Cache
//!
//! An "instant paint" mechanism for document-rendering hosts: capture the
//! fully rendered page as markup, persist it locally with an expiry, and on
//! the next launch replay the stored capture as an overlay while the real
//! content is still initializing.
//!
//! # Features
//!
//! - **Snapshot Lifecycle**: capture → sanitize → inline images → persist →
//!   restore, with an explicit overlay state machine
//! - **Modular Design**: adapter traits for the storage backend and the
//!   document/overlay surface, so any host shell can plug in
//! - **Self-Contained Replays**: optional image inlining turns every image
//!   into an embedded data URI before persistence
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use prepaint::{MemoryDocument, MemoryStore, SnapshotManager, SnapshotOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> prepaint::Result<()> {
//! let document = MemoryDocument::new("<html><body><h1>Ready</h1></body></html>");
//! let store = Arc::new(MemoryStore::new());
//!
//! let options = SnapshotOptions {
//!     strip_tags: true,
//!     ..SnapshotOptions::new("landing")
//! };
//! // Construction attempts a restore: with a valid stored snapshot the
//! // overlay is already visible when this returns.
//! let mut manager = SnapshotManager::new(Box::new(document), store, options);
//!
//! // Once the host considers the render good to cache:
//! manager.update().await?;
//!
//! // Once live content is ready underneath:
//! manager.hidden();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

// Storage seam and the persisted record
pub mod store;
pub use store::{MemoryStore, SnapshotRecord, SnapshotStore};

// Document, overlay, and image collaborator traits
pub mod dom;
pub use dom::{
    DocumentHost, ImageElement, MemoryDocument, OverlaySurface, RasterImage, RecordingOverlay,
    SharedImage, OVERLAY_TAG,
};

// Pre-persistence transforms
pub mod inline;
pub mod sanitize;
pub use inline::inline_images;
pub use sanitize::strip_excluded_tags;

// The manager itself
pub mod manager;
pub use manager::{storage_key, OverlayState, SnapshotManager, STORAGE_NAMESPACE};

/// Default snapshot time-to-live: one day, in milliseconds.
pub const DEFAULT_EXPIRY_MS: u64 = 86_400_000;

/// Caller-supplied snapshot configuration.
///
/// `id` is the only required field; it keys the stored record. The remaining
/// fields default to the most conservative behavior: a one-day expiry and no
/// markup transforms.
///
/// # Examples
///
/// ```
/// let options = prepaint::SnapshotOptions::new("landing");
/// assert_eq!(options.expired_ms, prepaint::DEFAULT_EXPIRY_MS);
/// assert!(!options.strip_tags);
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Application-supplied snapshot identifier. Empty means unconfigured:
    /// initialization fails with a logged error and the manager stays inert.
    pub id: String,
    /// Snapshot time-to-live in milliseconds; `0` falls back to the default.
    pub expired_ms: u64,
    /// Strip script blocks, the debug-console widget, and overlay markup
    /// before persistence.
    pub strip_tags: bool,
    /// Convert every image into an embedded data URI before persistence.
    pub inline_images: bool,
}

impl SnapshotOptions {
    /// Options for `id` with all defaults.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            expired_ms: DEFAULT_EXPIRY_MS,
            strip_tags: false,
            inline_images: false,
        }
    }
}
