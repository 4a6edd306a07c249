//! Zoomify-route integration tests: tile blending, ImageProperties.xml,
//! blend specification rejections and tile index arithmetic.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::{
    build_gray_jpeg_tiff, build_gray_tiff, build_router, encode_path, is_valid_jpeg,
    MemoryChannelSource, TestLevel, TEST_TIMESTAMP,
};

/// Drive a GET against a fresh router.
async fn get(
    source: MemoryChannelSource,
    path: &str,
) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let router = build_router(source);
    let request = Request::builder()
        .uri(encode_path(path))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

// =============================================================================
// Tile blending
// =============================================================================

#[tokio::test]
async fn test_two_channel_blend_single_tile() {
    // Channel 0 holds 200 (tinted red), channel 1 holds 100 (tinted green)
    let source = MemoryChannelSource::new()
        .with_image(
            "/data/img_0.tif",
            build_gray_tiff(&[TestLevel::filled(16, 16, 16, 200)], 8),
        )
        .with_image(
            "/data/img_1.tif",
            build_gray_tiff(&[TestLevel::filled(16, 16, 16, 100)], 8),
        );

    let json = r#"{"0":{"lut":"FF0000","min":0,"max":255},"1":{"lut":"00FF00","min":0,"max":255}}"#;
    let (status, headers, body) = get(
        source,
        &format!("/zoomify/data/img.tif/TileGroup0/0-0-0.jpg&{json}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/jpeg");
    assert_eq!(headers.get("last-modified").unwrap(), TEST_TIMESTAMP);
    assert_eq!(headers.get("x-powered-by").unwrap(), "IIPImage");
    assert!(headers
        .get("server")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("blend-streamer/"));
    assert!(is_valid_jpeg(&body));

    // Decode and verify the accumulated colour
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (16, 16));
    let px = decoded.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 200).abs() <= 3, "red was {}", px[0]);
    assert!((i16::from(px[1]) - 100).abs() <= 3, "green was {}", px[1]);
    assert!(i16::from(px[2]) <= 3, "blue was {}", px[2]);
}

#[tokio::test]
async fn test_saturation_clips_after_each_add() {
    // Three white-tinted channels at 200 each: clipped to 255, not wrapped
    let tiff = build_gray_tiff(&[TestLevel::filled(16, 16, 16, 200)], 8);
    let source = MemoryChannelSource::new()
        .with_image("/img_0.tif", tiff.clone())
        .with_image("/img_1.tif", tiff.clone())
        .with_image("/img_2.tif", tiff);

    let json = r#"{"0":{"lut":"FFFFFF","min":0,"max":255},"1":{"lut":"FFFFFF","min":0,"max":255},"2":{"lut":"FFFFFF","min":0,"max":255}}"#;
    let (status, _, body) = get(source, &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json}")).await;

    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    let px = decoded.get_pixel(8, 8);
    assert_eq!((px[0], px[1], px[2]), (255, 255, 255));
}

#[tokio::test]
async fn test_single_channel_white_identity() {
    // One channel, white tint, full range: output gray equals input gray
    let source = MemoryChannelSource::new().with_image(
        "/img_0.tif",
        build_gray_tiff(&[TestLevel::filled(16, 16, 16, 120)], 8),
    );

    let json = r#"{"0":{"lut":"FFFFFF","min":0,"max":255}}"#;
    let (status, _, body) = get(source, &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json}")).await;

    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    let px = decoded.get_pixel(4, 4);
    assert!((i16::from(px[0]) - 120).abs() <= 3);
    assert_eq!(px[0], px[1]);
    assert_eq!(px[1], px[2]);
}

#[tokio::test]
async fn test_jpeg_stored_channels_blend() {
    // Channel pyramids whose tiles are stored as JPEG streams are decoded
    // on fetch and blend like raw ones
    let source = MemoryChannelSource::new()
        .with_image(
            "/data/img_0.tif",
            build_gray_jpeg_tiff(&[TestLevel::filled(16, 16, 16, 200)]),
        )
        .with_image(
            "/data/img_1.tif",
            build_gray_jpeg_tiff(&[TestLevel::filled(16, 16, 16, 100)]),
        );

    let json = r#"{"0":{"lut":"FF0000","min":0,"max":255},"1":{"lut":"00FF00","min":0,"max":255}}"#;
    let (status, headers, body) = get(
        source,
        &format!("/zoomify/data/img.tif/TileGroup0/0-0-0.jpg&{json}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/jpeg");
    assert!(is_valid_jpeg(&body));

    // The double JPEG round trip widens the tolerance slightly
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    let px = decoded.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 200).abs() <= 5, "red was {}", px[0]);
    assert!((i16::from(px[1]) - 100).abs() <= 5, "green was {}", px[1]);
    assert!(i16::from(px[2]) <= 5, "blue was {}", px[2]);
}

#[tokio::test]
async fn test_sixteen_bit_normalization_window() {
    // 12-bit data at 2048 with min=0, max=4095 lands mid-gray
    let source = MemoryChannelSource::new().with_image(
        "/img_0.tif",
        build_gray_tiff(&[TestLevel::filled(16, 16, 16, 2048)], 16),
    );

    let json = r#"{"0":{"lut":"FFFFFF","min":0,"max":4095}}"#;
    let (status, _, body) = get(source, &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json}")).await;

    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    let px = decoded.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 128).abs() <= 3, "got {}", px[0]);
}

#[tokio::test]
async fn test_tile_index_formula() {
    // 80x48 with 16px tiles is 5 tiles wide; (x=3, y=2) selects index 13
    let source = MemoryChannelSource::new().with_image(
        "/img_0.tif",
        build_gray_tiff(&[TestLevel::tile_indexed(80, 48, 16, 0, 10)], 8),
    );

    let json = r#"{"0":{"lut":"FFFFFF","min":0,"max":255}}"#;
    let (status, _, body) = get(source, &format!("/zoomify/img.tif/TileGroup0/0-3-2.jpg&{json}")).await;

    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    // Tile 13 carries value 130
    let px = decoded.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 130).abs() <= 3, "got {}", px[0]);
}

#[tokio::test]
async fn test_channel_order_under_saturation() {
    // With saturating accumulation the document order is what counts:
    // red-then-blue and blue-then-red agree below saturation
    let bright = build_gray_tiff(&[TestLevel::filled(16, 16, 16, 100)], 8);
    let dim = build_gray_tiff(&[TestLevel::filled(16, 16, 16, 50)], 8);

    let source_a = MemoryChannelSource::new()
        .with_image("/img_0.tif", bright.clone())
        .with_image("/img_1.tif", dim.clone());
    let json_a = r#"{"0":{"lut":"FF0000","min":0,"max":255},"1":{"lut":"0000FF","min":0,"max":255}}"#;
    let (_, _, body_a) = get(source_a, &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json_a}")).await;

    let source_b = MemoryChannelSource::new()
        .with_image("/img_0.tif", bright)
        .with_image("/img_1.tif", dim);
    let json_b = r#"{"1":{"lut":"0000FF","min":0,"max":255},"0":{"lut":"FF0000","min":0,"max":255}}"#;
    let (_, _, body_b) = get(source_b, &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json_b}")).await;

    let px_a = *image::load_from_memory(&body_a).unwrap().to_rgb8().get_pixel(8, 8);
    let px_b = *image::load_from_memory(&body_b).unwrap().to_rgb8().get_pixel(8, 8);
    assert_eq!(px_a, px_b);
}

// =============================================================================
// ImageProperties.xml
// =============================================================================

#[tokio::test]
async fn test_image_properties_document() {
    let source = MemoryChannelSource::new().with_image(
        "/data/img_0.tif",
        build_gray_tiff(
            &[
                TestLevel::filled(64, 48, 16, 0),
                TestLevel::filled(32, 24, 16, 0),
            ],
            8,
        ),
    );

    let json = r#"{"0":{"lut":"FFFFFF","min":0,"max":255}}"#;
    let (status, headers, body) = get(
        source,
        &format!("/zoomify/data/img.tif/ImageProperties.xml&{json}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "application/xml");

    let xml = String::from_utf8(body.to_vec()).unwrap();
    // 64x48 at 16px tiles: 4 * 3 = 12 tiles at full resolution
    assert_eq!(
        xml,
        "<IMAGE_PROPERTIES WIDTH=\"64\" HEIGHT=\"48\" NUMTILES=\"12\" NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"16\" />"
    );
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_missing_blend_spec() {
    let source = MemoryChannelSource::new();
    let (status, _, body) = get(source, "/zoomify/img.tif/TileGroup0/0-0-0.jpg").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["code"], "2 0");
}

#[tokio::test]
async fn test_empty_blend_spec() {
    let source = MemoryChannelSource::new();
    let (status, _, body) = get(source, "/zoomify/img.tif/TileGroup0/0-0-0.jpg&{}").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["code"], "2 3");
}

#[tokio::test]
async fn test_bad_tint_rejected() {
    let source = MemoryChannelSource::new();
    let json = r#"{"0":{"lut":"XYZ","min":0,"max":10}}"#;
    let (status, _, body) = get(
        source,
        &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["code"], "2 1");
}

#[tokio::test]
async fn test_bad_json_rejected() {
    let source = MemoryChannelSource::new();
    let (status, _, body) = get(source, "/zoomify/img.tif/TileGroup0/0-0-0.jpg&{oops").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["code"], "2 1");
}

#[tokio::test]
async fn test_max_not_above_min_rejected() {
    let source = MemoryChannelSource::new();
    let json = r#"{"0":{"lut":"FFFFFF","min":100,"max":100}}"#;
    let (status, _, body) = get(
        source,
        &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["code"], "2 1");
}

#[tokio::test]
async fn test_missing_channel_file() {
    let source = MemoryChannelSource::new().with_image(
        "/img_0.tif",
        build_gray_tiff(&[TestLevel::filled(16, 16, 16, 0)], 8),
    );

    // Channel 7 names /img_7.tif, which does not exist
    let json = r#"{"7":{"lut":"FFFFFF","min":0,"max":255}}"#;
    let (status, _, _) = get(source, &format!("/zoomify/img.tif/TileGroup0/0-0-0.jpg&{json}")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tile_out_of_range() {
    let source = MemoryChannelSource::new().with_image(
        "/img_0.tif",
        build_gray_tiff(&[TestLevel::filled(16, 16, 16, 0)], 8),
    );

    let json = r#"{"0":{"lut":"FFFFFF","min":0,"max":255}}"#;
    let (status, _, _) = get(source, &format!("/zoomify/img.tif/TileGroup0/0-5-5.jpg&{json}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
