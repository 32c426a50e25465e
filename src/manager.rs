//! The snapshot manager: capture, sanitize, inline, persist, restore.
//!
//! One manager instance owns one overlay surface and one storage key. The
//! overlay walks a three-state machine (Unmounted, Visible, Hidden) and is
//! never destroyed once mounted, only hidden.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error, warn};

use crate::dom::{DocumentHost, OverlaySurface};
use crate::store::{SnapshotRecord, SnapshotStore};
use crate::{inline, sanitize, Error, Result, SnapshotOptions, DEFAULT_EXPIRY_MS};

/// Fixed prefix under which every snapshot record is stored.
pub const STORAGE_NAMESPACE: &str = "__PREPAINT_SNAPSHOT";

/// Storage key for a snapshot id: `"<namespace>_<id>"`.
pub fn storage_key(id: &str) -> String {
    format!("{STORAGE_NAMESPACE}_{id}")
}

/// Overlay lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// No stored snapshot was shown; the surface is detached.
    Unmounted,
    /// A stored snapshot is mounted and shown above the live content.
    Visible,
    /// The host revealed the live content; the surface stays mounted.
    Hidden,
}

/// Options resolved by a successful `init`.
#[derive(Debug, Clone)]
struct ActiveConfig {
    key: String,
    expired_ms: u64,
    strip_tags: bool,
    inline_images: bool,
}

/// Captures the rendered document into durable storage and replays the last
/// stored capture as an overlay on the next launch.
///
/// Construction never fails: invalid options leave the manager unconfigured,
/// and every subsequent operation becomes a logged no-op. The only error a
/// host sees is an image-inlining failure out of [`update`](Self::update).
pub struct SnapshotManager {
    host: Box<dyn DocumentHost>,
    store: Arc<dyn SnapshotStore>,
    overlay: Box<dyn OverlaySurface>,
    config: Option<ActiveConfig>,
    state: OverlayState,
}

impl SnapshotManager {
    /// Build a manager and immediately attempt a restore: when the store
    /// holds a record under the configured key, the overlay is mounted and
    /// shown before this returns.
    pub fn new(
        host: Box<dyn DocumentHost>,
        store: Arc<dyn SnapshotStore>,
        options: SnapshotOptions,
    ) -> Self {
        let overlay = host.create_overlay();
        let mut manager = Self {
            host,
            store,
            overlay,
            config: None,
            state: OverlayState::Unmounted,
        };
        manager.init(options);
        manager
    }

    fn init(&mut self, options: SnapshotOptions) {
        if options.id.is_empty() {
            error!("{}", Error::Config("snapshot id is required".into()));
            return;
        }

        // A zero TTL means "unset", not "expire immediately".
        let expired_ms = if options.expired_ms == 0 {
            DEFAULT_EXPIRY_MS
        } else {
            options.expired_ms
        };

        let key = storage_key(&options.id);
        let has_record = self.store.get(&key).is_some();
        self.config = Some(ActiveConfig {
            key,
            expired_ms,
            strip_tags: options.strip_tags,
            inline_images: options.inline_images,
        });

        if has_record {
            self.show();
        }
    }

    /// Whether init accepted the options.
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Current overlay state.
    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// Capture the current render and persist it, overwriting any prior
    /// record for this id.
    ///
    /// With `inline_images` enabled this suspends until every image in the
    /// document has converted; a single conversion failure aborts the call
    /// and nothing is persisted that cycle.
    pub async fn update(&mut self) -> Result<()> {
        let Some(config) = self.config.clone() else {
            error!("update() called before snapshot options were initialized");
            return Ok(());
        };

        let mut markup = self.host.serialize_markup();
        if config.strip_tags {
            markup = sanitize::strip_excluded_tags(&markup);
        }
        if config.inline_images {
            markup = inline::inline_images(self.host.as_ref(), markup).await?;
        }

        self.save_snapshot(&config, markup);
        Ok(())
    }

    /// Hide the overlay and reveal the live content underneath. The surface
    /// stays mounted.
    pub fn hidden(&mut self) {
        if self.config.is_none() {
            error!("hidden() called before snapshot options were initialized");
            return;
        }
        self.overlay.set_visible(false);
        if self.state == OverlayState::Visible {
            self.state = OverlayState::Hidden;
        }
    }

    // Restore step: mount and show the stored snapshot. Invoked from init;
    // a second invocation against a mounted overlay is a no-op.
    fn show(&mut self) {
        let Some(config) = self.config.clone() else {
            error!("show() called before snapshot options were initialized");
            return;
        };
        if self.state != OverlayState::Unmounted {
            debug!("overlay already mounted; ignoring restore");
            return;
        }

        let Some(raw) = self.store.get(&config.key) else {
            return;
        };
        let record = match SnapshotRecord::decode(&raw) {
            Ok(record) => record,
            Err(err) => {
                // The undecodable record is deliberately left in place; the
                // next successful update overwrites it.
                error!("{}", err);
                return;
            }
        };
        if record.is_expired(epoch_ms()) {
            self.store.remove(&config.key);
            warn!("stored snapshot expired; record discarded");
            return;
        }

        self.overlay.inject(&record.html_snapshot);
        self.overlay.attach();
        self.overlay.set_visible(true);
        self.state = OverlayState::Visible;
    }

    fn save_snapshot(&self, config: &ActiveConfig, markup: String) {
        let record = SnapshotRecord::new(markup, epoch_ms(), config.expired_ms);
        match record.encode() {
            Ok(raw) => {
                if let Err(err) = self.store.set(&config.key, &raw) {
                    error!("failed to persist snapshot: {}", err);
                }
            }
            Err(err) => error!("failed to encode snapshot record: {}", err),
        }
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
