//! End-to-end matting pipeline tests against the mock inference backend
//!
//! These exercise the full decode, preprocess, infer, postprocess, apply,
//! and encode path without requiring model weights on disk.

use bgswap::backends::test_utils::MockBackendFactory;
use bgswap::{
    remove_background_from_reader, BgSwapError, MattingEngine, RemovalConfig, Result,
};
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
use std::sync::Arc;

fn mock_engine() -> Arc<MattingEngine> {
    Arc::new(
        MattingEngine::with_factory(
            RemovalConfig::default(),
            Box::new(MockBackendFactory::new()),
        )
        .expect("engine construction"),
    )
}

fn synthetic_png(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .expect("png encode");
    buffer
}

#[test]
fn remove_background_produces_rgba_png_at_input_dimensions() -> Result<()> {
    let engine = mock_engine();
    let input = synthetic_png(64, 48);

    let output = engine.remove_background(&input)?;
    let decoded = image::load_from_memory(&output)
        .map_err(|e| BgSwapError::decode(e.to_string()))?;

    assert_eq!(decoded.dimensions(), (64, 48));
    assert!(decoded.color().has_alpha());

    // The mock's circular matte leaves corners transparent and the center
    // opaque after min-max normalization
    let rgba = decoded.to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0)[3], 0);
    assert_eq!(rgba.get_pixel(32, 24)[3], 255);
    Ok(())
}

#[test]
fn remove_background_is_idempotent_for_identical_input() -> Result<()> {
    let engine = mock_engine();
    let input = synthetic_png(32, 32);

    let first = engine.remove_background(&input)?;
    let second = engine.remove_background(&input)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn matte_matches_original_dimensions_for_any_input_shape() -> Result<()> {
    let engine = mock_engine();

    for (width, height) in [(1, 1), (7, 3), (100, 100), (33, 257)] {
        let result = engine.process_bytes(&synthetic_png(width, height))?;
        assert_eq!(result.original_dimensions, (width, height));
        assert_eq!(result.matte.dimensions, (width, height));
        assert_eq!(
            result.matte.data.len(),
            width as usize * height as usize
        );
        assert_eq!(result.dimensions(), (width, height));
    }
    Ok(())
}

#[test]
fn corrupt_bytes_fail_with_decode_error_and_leave_no_artifacts() {
    let engine = mock_engine();

    let err = engine.remove_background(b"\x00\x01garbage bytes").unwrap_err();
    assert!(matches!(err, BgSwapError::Decode(_)));

    // The pipeline is fully in-memory; nothing of ours lands in the temp dir
    let leftovers: Vec<_> = std::fs::read_dir(std::env::temp_dir())
        .map(|d| {
            d.filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().contains("bgswap"))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "unexpected temp artifacts: {leftovers:?}");
}

#[test]
fn model_loads_once_across_concurrent_requests() {
    let engine = mock_engine();
    let input = synthetic_png(20, 20);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let input = input.clone();
            std::thread::spawn(move || engine.process_bytes(&input))
        })
        .collect();

    let mut load_times = Vec::new();
    for handle in handles {
        let result = handle.join().expect("thread").expect("pipeline");
        load_times.push(result.metadata.timings.model_load_ms);
    }

    // At most one request paid the model-load cost; the rest reused the
    // already-initialized backend
    assert!(load_times.iter().filter(|&&t| t > 0).count() <= 1);
    assert!(engine.is_initialized());
}

#[tokio::test]
async fn reader_api_matches_bytes_api() -> Result<()> {
    let engine = mock_engine();
    let input = synthetic_png(24, 24);

    let from_reader =
        remove_background_from_reader(std::io::Cursor::new(input.clone()), &engine).await?;
    let from_bytes = engine.process_bytes(&input)?;

    assert_eq!(from_reader.matte, from_bytes.matte);
    assert_eq!(
        from_reader.image.to_rgba8().as_raw(),
        from_bytes.image.to_rgba8().as_raw()
    );
    Ok(())
}

#[test]
fn failing_inference_surfaces_typed_error() {
    let engine = MattingEngine::with_factory(
        RemovalConfig::default(),
        Box::new(MockBackendFactory::failing_inference()),
    )
    .expect("engine construction");

    let err = engine.remove_background(&synthetic_png(16, 16)).unwrap_err();
    assert!(matches!(err, BgSwapError::Inference(_)));
}
