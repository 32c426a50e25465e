//! Instant paint demo - capture a render, then replay it on the next launch

use std::sync::Arc;

use prepaint::{
    MemoryDocument, MemoryStore, OverlayState, RasterImage, SharedImage, SnapshotManager,
    SnapshotOptions,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    println!("Prepaint Snapshot Cache - Instant Paint Demo\n");

    // The store stands in for the host's durable key-value storage and
    // survives across both "launches" below.
    let store = Arc::new(MemoryStore::new());

    // --- First launch: nothing cached yet --------------------------------
    let markup = concat!(
        "<html><head><title>Shop</title></head><body>",
        "<h1>Today's deals</h1>",
        "<img src=\"https://cdn.example/hero.png\">",
        "<script>hydrate();</script>",
        "</body></html>"
    );
    let mut document = MemoryDocument::new(markup);
    document.push_image(SharedImage::loaded(
        "https://cdn.example/hero.png",
        RasterImage::solid(4, 4, [200, 60, 60, 255]),
    ));

    let options = SnapshotOptions {
        strip_tags: true,
        inline_images: true,
        ..SnapshotOptions::new("shop-home")
    };
    let mut manager = SnapshotManager::new(Box::new(document), store.clone(), options.clone());
    println!("First launch, overlay state: {:?}", manager.state());

    // The host decides when the render is good to cache.
    manager.update().await?;
    println!("Snapshot captured and persisted.\n");

    // --- Second launch: the stored snapshot paints immediately -----------
    let booting = MemoryDocument::new("<html><body>booting…</body></html>");
    let overlay = booting.overlay();
    let mut manager = SnapshotManager::new(Box::new(booting), store, options);

    println!("Second launch, overlay state: {:?}", manager.state());
    assert_eq!(manager.state(), OverlayState::Visible);
    let replay = overlay.markup().unwrap_or_default();
    println!("Replaying {} bytes of self-contained markup", replay.len());
    println!("Starts with: {}…\n", &replay[..replay.len().min(60)]);

    // Live content is ready; reveal it.
    manager.hidden();
    println!("Live content revealed, overlay state: {:?}", manager.state());

    Ok(())
}
