//! Document surface: the traits a rendering host implements so the manager
//! can capture markup, enumerate images, and control the snapshot overlay.
//!
//! The manager never touches a concrete widget tree. It sees the document
//! through `DocumentHost`, the overlay container through `OverlaySurface`,
//! and each image through `ImageElement`. Reference implementations backed by
//! plain memory are provided for tests and for embedding into host shells.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::Notify;

use crate::{Error, Result};

/// Element name under which the overlay surface is mounted in the document.
///
/// Markup with this tag is one of the categories stripped before persistence
/// so a snapshot never captures a previously-mounted overlay.
pub const OVERLAY_TAG: &str = "paint-overlay";

/// The rendered document as seen by the snapshot manager.
pub trait DocumentHost: Send + Sync {
    /// Serialize the root element and all descendants to markup.
    fn serialize_markup(&self) -> String;

    /// Every image element currently in the document.
    fn images(&self) -> Vec<Arc<dyn ImageElement>>;

    /// Create the detached overlay container. Called exactly once, at manager
    /// construction; the manager owns the returned surface for its lifetime.
    fn create_overlay(&self) -> Box<dyn OverlaySurface>;
}

/// An isolated rendering container shown above the live page content.
///
/// Implementations should present the surface full-viewport above the live
/// content with an opaque background, start hidden, and keep injected markup
/// isolated from the live page's scripts and styles.
pub trait OverlaySurface: Send + Sync {
    /// Replace the surface's content with `markup`.
    fn inject(&mut self, markup: &str);

    /// Attach the surface to the document. Attaching an already-attached
    /// surface is a no-op.
    fn attach(&mut self);

    /// Toggle visibility without attaching or detaching.
    fn set_visible(&mut self, visible: bool);

    fn is_attached(&self) -> bool;

    fn is_visible(&self) -> bool;
}

/// An image element in the document.
pub trait ImageElement: Send + Sync {
    /// The image's source URL, if it has one.
    fn source(&self) -> Option<String>;

    /// Whether the element carries the marker attribute opting it out of
    /// inlining.
    fn inline_opt_out(&self) -> bool {
        false
    }

    /// Whether the image has already finished loading.
    fn is_complete(&self) -> bool;

    /// Suspend until the image's load completes. Resolves immediately for a
    /// complete image; errors when the load itself failed.
    fn wait_loaded(&self) -> BoxFuture<'_, Result<()>>;

    /// Draw the image onto an off-screen raster surface at its natural
    /// dimensions and hand back the pixels.
    fn rasterize(&self) -> Result<RasterImage>;

    /// Ask the host to fetch/decode the image anonymously so the raster
    /// surface is not tainted by cross-origin data. Optional.
    fn request_anonymous_decode(&self) {}
}

/// Off-screen raster output: tightly packed RGBA8 rows.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// A solid-color raster, handy for tests and demos.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }
}

// --- Reference implementations -------------------------------------------

/// Overlay surface that records what the manager did to it.
///
/// Clones share state, so a host (or test) can keep a handle while the
/// manager owns the boxed surface.
#[derive(Clone, Default)]
pub struct RecordingOverlay {
    inner: Arc<Mutex<SurfaceState>>,
}

#[derive(Default)]
struct SurfaceState {
    markup: Option<String>,
    attached: bool,
    visible: bool,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markup last injected into the surface, if any.
    pub fn markup(&self) -> Option<String> {
        self.inner.lock().unwrap().markup.clone()
    }
}

impl OverlaySurface for RecordingOverlay {
    fn inject(&mut self, markup: &str) {
        self.inner.lock().unwrap().markup = Some(markup.to_string());
    }

    fn attach(&mut self) {
        self.inner.lock().unwrap().attached = true;
    }

    fn set_visible(&mut self, visible: bool) {
        self.inner.lock().unwrap().visible = visible;
    }

    fn is_attached(&self) -> bool {
        self.inner.lock().unwrap().attached
    }

    fn is_visible(&self) -> bool {
        self.inner.lock().unwrap().visible
    }
}

/// In-memory document host: a markup string plus an explicit image list.
///
/// The markup cell is shared, so a host shell can keep re-rendering into it
/// after the manager has taken ownership of the boxed host.
pub struct MemoryDocument {
    markup: Arc<Mutex<String>>,
    images: Vec<Arc<dyn ImageElement>>,
    overlay: RecordingOverlay,
}

impl MemoryDocument {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: Arc::new(Mutex::new(markup.into())),
            images: Vec::new(),
            overlay: RecordingOverlay::new(),
        }
    }

    pub fn push_image(&mut self, image: Arc<dyn ImageElement>) {
        self.images.push(image);
    }

    /// Shared handle to the markup cell; writes are seen by the next capture.
    pub fn markup_cell(&self) -> Arc<Mutex<String>> {
        self.markup.clone()
    }

    /// Shared handle to the overlay this document hands the manager.
    pub fn overlay(&self) -> RecordingOverlay {
        self.overlay.clone()
    }
}

impl DocumentHost for MemoryDocument {
    fn serialize_markup(&self) -> String {
        self.markup.lock().unwrap().clone()
    }

    fn images(&self) -> Vec<Arc<dyn ImageElement>> {
        self.images.clone()
    }

    fn create_overlay(&self) -> Box<dyn OverlaySurface> {
        Box::new(self.overlay.clone())
    }
}

enum LoadState {
    Pending,
    Loaded,
    Failed(String),
}

/// Image element whose load completion is driven externally.
///
/// `loaded` images convert synchronously; `pending` ones suspend the inliner
/// until `finish_load` or `fail_load` is called from the host side.
pub struct SharedImage {
    source: String,
    opt_out: bool,
    raster: RasterImage,
    state: Mutex<LoadState>,
    load_signal: Notify,
}

impl SharedImage {
    fn build(source: &str, raster: RasterImage, opt_out: bool, state: LoadState) -> Arc<Self> {
        Arc::new(Self {
            source: source.to_string(),
            opt_out,
            raster,
            state: Mutex::new(state),
            load_signal: Notify::new(),
        })
    }

    /// An image that has already finished loading.
    pub fn loaded(source: &str, raster: RasterImage) -> Arc<Self> {
        Self::build(source, raster, false, LoadState::Loaded)
    }

    /// An image still waiting on its load event.
    pub fn pending(source: &str, raster: RasterImage) -> Arc<Self> {
        Self::build(source, raster, false, LoadState::Pending)
    }

    /// A loaded image carrying the inlining opt-out marker.
    pub fn opted_out(source: &str, raster: RasterImage) -> Arc<Self> {
        Self::build(source, raster, true, LoadState::Loaded)
    }

    /// Signal that the image finished loading.
    pub fn finish_load(&self) {
        *self.state.lock().unwrap() = LoadState::Loaded;
        self.load_signal.notify_waiters();
    }

    /// Signal that the load failed.
    pub fn fail_load(&self, reason: &str) {
        *self.state.lock().unwrap() = LoadState::Failed(reason.to_string());
        self.load_signal.notify_waiters();
    }
}

impl ImageElement for SharedImage {
    fn source(&self) -> Option<String> {
        if self.source.is_empty() {
            None
        } else {
            Some(self.source.clone())
        }
    }

    fn inline_opt_out(&self) -> bool {
        self.opt_out
    }

    fn is_complete(&self) -> bool {
        matches!(*self.state.lock().unwrap(), LoadState::Loaded)
    }

    fn wait_loaded(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            loop {
                // Register for the signal before inspecting state so a
                // notification between the check and the await is not lost.
                let notified = self.load_signal.notified();
                match &*self.state.lock().unwrap() {
                    LoadState::Loaded => return Ok(()),
                    LoadState::Failed(reason) => {
                        return Err(Error::ImageLoad(format!(
                            "{}: {}",
                            self.source, reason
                        )))
                    }
                    LoadState::Pending => {}
                }
                notified.await;
            }
        })
    }

    fn rasterize(&self) -> Result<RasterImage> {
        Ok(self.raster.clone())
    }
}
