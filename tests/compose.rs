//! Compositor scenarios and background replacement error mapping

use async_trait::async_trait;
use bgswap::backends::test_utils::MockBackendFactory;
use bgswap::{
    replace_background, BackgroundFetcher, BackgroundGenerator, BgSwapError, Compositor,
    MattingEngine, RemovalConfig, Result,
};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba, RgbaImage};
use std::time::Duration;

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .expect("png encode");
    buffer
}

#[test]
fn opaque_subject_over_mismatched_background_equals_subject() -> Result<()> {
    // Scenario: 100x100 opaque RGBA subject, 50x50 solid red background
    let subject = DynamicImage::ImageRgba8(RgbaImage::from_fn(100, 100, |x, y| {
        Rgba([(x % 200) as u8, (y % 200) as u8, 123, 255])
    }));
    let background = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(50, 50, Rgb([255, 0, 0])));

    let out = Compositor::compose(&png_bytes(&subject), &png_bytes(&background))?;
    let decoded = image::load_from_memory(&out)
        .map_err(|e| BgSwapError::decode(e.to_string()))?
        .to_rgb8();

    assert_eq!(decoded.dimensions(), (100, 100));
    let subject_rgb = subject.to_rgb8();
    assert_eq!(decoded.as_raw(), subject_rgb.as_raw());
    Ok(())
}

#[test]
fn transparent_subject_equals_background() -> Result<()> {
    let subject =
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 40, Rgba([200, 200, 200, 0])));
    let background = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(40, 40, Rgb([12, 34, 56])));

    let out = Compositor::compose(&png_bytes(&subject), &png_bytes(&background))?;
    let decoded = image::load_from_memory(&out)
        .map_err(|e| BgSwapError::decode(e.to_string()))?
        .to_rgb8();

    assert!(decoded.pixels().all(|p| *p == Rgb([12, 34, 56])));
    Ok(())
}

#[test]
fn subject_without_alpha_composites_fully_opaque() -> Result<()> {
    // Documented policy for the no-alpha edge case
    let subject = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([70, 80, 90])));
    let background = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([0, 0, 0])));

    let out = Compositor::compose(&png_bytes(&subject), &png_bytes(&background))?;
    let decoded = image::load_from_memory(&out)
        .map_err(|e| BgSwapError::decode(e.to_string()))?
        .to_rgb8();

    assert!(decoded.pixels().all(|p| *p == Rgb([70, 80, 90])));
    Ok(())
}

#[test]
fn matting_output_feeds_directly_into_compositor() -> Result<()> {
    // Chain the two components the way the service does: remove the
    // background, then composite the RGBA subject over a new background
    let engine = MattingEngine::with_factory(
        RemovalConfig::default(),
        Box::new(MockBackendFactory::new()),
    )?;

    let photo = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(60, 60, Rgb([50, 150, 250])));
    let subject_png = engine.remove_background(&png_bytes(&photo))?;

    let background = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(30, 20, Rgb([255, 255, 0])));
    let out = Compositor::compose(&subject_png, &png_bytes(&background))?;
    let decoded = image::load_from_memory(&out)
        .map_err(|e| BgSwapError::decode(e.to_string()))?
        .to_rgb8();

    assert_eq!(decoded.dimensions(), (60, 60));
    // Corners are background (matte is transparent there), center is subject
    assert_eq!(*decoded.get_pixel(0, 0), Rgb([255, 255, 0]));
    assert_eq!(*decoded.get_pixel(30, 30), Rgb([50, 150, 250]));
    Ok(())
}

struct LocalUrlGenerator(String);

#[async_trait]
impl BackgroundGenerator for LocalUrlGenerator {
    async fn generate_background(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn fetch_failure_is_network_error_not_decode() {
    // A known-closed local port: bind, read the port, drop the listener
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let subject = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
    let generator = LocalUrlGenerator(format!("http://127.0.0.1:{port}/bg.png"));
    let fetcher = BackgroundFetcher::with_timeout(Duration::from_secs(2)).expect("fetcher");

    let err = replace_background(&png_bytes(&subject), "any prompt", &generator, &fetcher)
        .await
        .unwrap_err();

    assert!(matches!(err, BgSwapError::Network(_)));
}
