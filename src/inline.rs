//! Image inlining: converts every image in the document into a data URI and
//! substitutes it into the captured markup so the snapshot replays with no
//! external fetches.
//!
//! Conversions for not-yet-loaded images are concurrently pending futures
//! joined through a fail-fast barrier; persistence only ever sees a fully
//! converted document or nothing.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::try_join_all;
use image::{DynamicImage, ImageFormat, RgbaImage};
use url::Url;

use crate::dom::{DocumentHost, RasterImage};
use crate::{Error, Result};

/// Inline every eligible image into `markup`.
///
/// Eligible means: has a source and does not carry the opt-out marker.
/// Already-complete images convert synchronously; the rest suspend until
/// their load signal fires. Any single failure aborts the whole transform.
pub async fn inline_images(host: &dyn DocumentHost, markup: String) -> Result<String> {
    let mut conversions = Vec::new();
    for image in host.images() {
        if image.inline_opt_out() {
            continue;
        }
        let Some(source) = image.source() else {
            continue;
        };
        image.request_anonymous_decode();
        conversions.push(async move {
            if !image.is_complete() {
                image.wait_loaded().await?;
            }
            let raster = image.rasterize()?;
            let data = encode_data_uri(&raster, &source)?;
            Ok::<(String, String), Error>((source, data))
        });
    }

    let inlined = try_join_all(conversions).await?;

    let mut out = markup;
    for (source, data) in inlined {
        out = out.replace(&source, &data);
        // Protocol-relative references to the same image, emitted elsewhere
        // in the markup, point at the same bytes.
        if let Some(relative) = scheme_relative(&source) {
            out = out.replace(&relative, &data);
        }
    }
    Ok(out)
}

/// Encode a raster as a data URI, choosing the codec from the source's file
/// extension.
pub fn encode_data_uri(raster: &RasterImage, source: &str) -> Result<String> {
    let (format, mime) = codec_for_source(source);

    let rgba = RgbaImage::from_raw(raster.width, raster.height, raster.pixels.clone())
        .ok_or_else(|| {
            Error::ImageEncode(format!(
                "raster buffer does not match {}x{} RGBA8",
                raster.width, raster.height
            ))
        })?;

    // JPEG carries no alpha channel.
    let dynamic = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8()),
        _ => DynamicImage::ImageRgba8(rgba),
    };

    let mut encoded = Cursor::new(Vec::new());
    dynamic.write_to(&mut encoded, format)?;

    Ok(format!(
        "data:{};base64,{}",
        mime,
        STANDARD.encode(encoded.get_ref())
    ))
}

/// The codec and MIME type a source's file extension implies. Unknown or
/// missing extensions fall back to PNG, the same fallback a raster surface
/// applies to unrecognized encodings.
fn codec_for_source(source: &str) -> (ImageFormat, &'static str) {
    match source_extension(source).as_deref() {
        Some("jpg") | Some("jpeg") => (ImageFormat::Jpeg, "image/jpeg"),
        Some("gif") => (ImageFormat::Gif, "image/gif"),
        Some("webp") => (ImageFormat::WebP, "image/webp"),
        Some("bmp") => (ImageFormat::Bmp, "image/bmp"),
        _ => (ImageFormat::Png, "image/png"),
    }
}

fn source_extension(source: &str) -> Option<String> {
    // Prefer the URL path so query strings and fragments don't leak into the
    // extension; relative sources are trimmed by hand.
    let path = match Url::parse(source) {
        Ok(url) => url.path().to_string(),
        Err(_) => source
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

fn scheme_relative(source: &str) -> Option<String> {
    source
        .strip_prefix("https:")
        .or_else(|| source.strip_prefix("http:"))
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, SharedImage};

    fn red_pixel() -> RasterImage {
        RasterImage::solid(1, 1, [255, 0, 0, 255])
    }

    #[test]
    fn codec_follows_source_extension() {
        assert_eq!(codec_for_source("https://a.example/x.png").1, "image/png");
        assert_eq!(codec_for_source("https://a.example/x.JPG").1, "image/jpeg");
        assert_eq!(codec_for_source("https://a.example/x.jpeg?v=2").1, "image/jpeg");
        assert_eq!(codec_for_source("assets/anim.gif#frame").1, "image/gif");
        assert_eq!(codec_for_source("https://a.example/x.webp").1, "image/webp");
        // No usable extension: PNG fallback
        assert_eq!(codec_for_source("https://a.example/avatar").1, "image/png");
        assert_eq!(codec_for_source("https://a.example/.hidden").1, "image/png");
    }

    #[test]
    fn encode_produces_decodable_png() {
        let uri = encode_data_uri(&red_pixel(), "https://a.example/dot.png").unwrap();
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1, 1));
    }

    #[test]
    fn encode_flattens_alpha_for_jpeg() {
        let uri = encode_data_uri(&RasterImage::solid(2, 2, [0, 128, 255, 64]), "photo.jpg")
            .unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn encode_rejects_mismatched_buffers() {
        let bad = RasterImage {
            width: 2,
            height: 2,
            pixels: vec![0; 3],
        };
        assert!(matches!(
            encode_data_uri(&bad, "x.png"),
            Err(Error::ImageEncode(_))
        ));
    }

    #[test]
    fn scheme_relative_variants() {
        assert_eq!(
            scheme_relative("https://a.example/x.png").as_deref(),
            Some("//a.example/x.png")
        );
        assert_eq!(
            scheme_relative("http://a.example/x.png").as_deref(),
            Some("//a.example/x.png")
        );
        assert_eq!(scheme_relative("/local/x.png"), None);
        assert_eq!(scheme_relative("data:image/png;base64,AA"), None);
    }

    #[tokio::test]
    async fn replaces_absolute_and_protocol_relative_occurrences() {
        let src = "https://cdn.example/hero.png";
        let markup = format!(
            "<html><body><img src=\"{src}\"><div style=\"background:url({rel})\"></div></body></html>",
            rel = "//cdn.example/hero.png"
        );
        let mut doc = MemoryDocument::new(markup);
        doc.push_image(SharedImage::loaded(src, red_pixel()));

        let out = inline_images(&doc, doc.serialize_markup()).await.unwrap();
        assert!(!out.contains(src));
        assert!(!out.contains("//cdn.example/hero.png"));
        assert_eq!(out.matches("data:image/png;base64,").count(), 2);
    }

    #[tokio::test]
    async fn opted_out_images_keep_their_source() {
        let src = "https://cdn.example/keep.png";
        let mut doc = MemoryDocument::new(format!("<img src=\"{src}\">"));
        doc.push_image(SharedImage::opted_out(src, red_pixel()));

        let out = inline_images(&doc, doc.serialize_markup()).await.unwrap();
        assert!(out.contains(src));
        assert!(!out.contains("data:"));
    }

    #[tokio::test]
    async fn waits_for_pending_images_before_returning() {
        let ready = "https://cdn.example/ready.png";
        let slow = "https://cdn.example/slow.png";
        let markup = format!("<img src=\"{ready}\"><img src=\"{slow}\">");
        let mut doc = MemoryDocument::new(markup);
        doc.push_image(SharedImage::loaded(ready, red_pixel()));
        let pending = SharedImage::pending(slow, red_pixel());
        doc.push_image(pending.clone());

        let signaller = pending.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            signaller.finish_load();
        });

        let out = inline_images(&doc, doc.serialize_markup()).await.unwrap();
        assert!(!out.contains(ready));
        assert!(!out.contains(slow));
    }

    #[tokio::test]
    async fn one_failed_load_aborts_the_transform() {
        let good = "https://cdn.example/good.png";
        let bad = "https://cdn.example/bad.png";
        let mut doc = MemoryDocument::new(format!("<img src=\"{good}\"><img src=\"{bad}\">"));
        doc.push_image(SharedImage::loaded(good, red_pixel()));
        let failing = SharedImage::pending(bad, red_pixel());
        doc.push_image(failing.clone());
        failing.fail_load("connection reset");

        let err = inline_images(&doc, doc.serialize_markup()).await.unwrap_err();
        assert!(matches!(err, Error::ImageLoad(_)));
    }

    #[tokio::test]
    async fn sourceless_images_are_skipped() {
        let mut doc = MemoryDocument::new("<img>");
        doc.push_image(SharedImage::loaded("", red_pixel()));
        let out = inline_images(&doc, doc.serialize_markup()).await.unwrap();
        assert_eq!(out, "<img>");
    }
}
