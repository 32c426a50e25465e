//! Markup sanitization ahead of persistence.
//!
//! Three categories of subtrees never belong in a snapshot: script blocks
//! (the snapshot must replay inert), the debug-console widget, and any
//! previously-mounted overlay surface (a snapshot of a snapshot). The markup
//! is parsed into a tree, matching elements are detached, and the tree is
//! re-serialized, so nested and malformed input degrades the way the HTML
//! parser degrades rather than the way a regex would. Not a security
//! boundary.

use scraper::{Html, Selector};

use crate::dom::OVERLAY_TAG;

/// Element name of the on-page debug console widget.
pub const CONSOLE_WIDGET_TAG: &str = "vconsole-wrapper";

/// Remove script blocks, the debug-console widget, and overlay-surface
/// markup from `markup`, returning the serialized remainder.
pub fn strip_excluded_tags(markup: &str) -> String {
    let mut document = Html::parse_document(markup);

    let mut doomed = Vec::new();
    for tag in ["script", CONSOLE_WIDGET_TAG, OVERLAY_TAG] {
        let selector = Selector::parse(tag).expect("tag name is a valid selector");
        for element in document.select(&selector) {
            doomed.push(element.id());
        }
    }

    // Detaching a node whose ancestor was already detached is a no-op, so
    // nested occurrences need no ordering.
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document.root_element().html()
}
