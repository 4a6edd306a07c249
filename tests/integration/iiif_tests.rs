//! IIIF-route integration tests: info.json emission, tile-aligned image
//! requests, redirects, rotation remapping and the region-path rejection.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use blend_streamer::RouterConfig;

use super::test_utils::{
    build_gray_tiff, build_router, build_router_with_config, encode_path, is_valid_jpeg,
    MemoryChannelSource, TestLevel,
};

/// Drive a GET with a Host header against a fresh router.
async fn get(
    source: MemoryChannelSource,
    path: &str,
) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    get_with_config(source, path, RouterConfig::new().with_tracing(false)).await
}

async fn get_with_config(
    source: MemoryChannelSource,
    path: &str,
    config: RouterConfig,
) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let router = build_router_with_config(source, config);
    let request = Request::builder()
        .uri(encode_path(path))
        .header(header::HOST, "tiles.example.org")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

/// Two-level pyramid: 32x32 full resolution over a 16x16 thumbnail,
/// 16px tiles, tiles of the full level numbered 0,10,20,30.
fn two_level_source() -> MemoryChannelSource {
    MemoryChannelSource::new().with_image(
        "/data/img_0.tif",
        build_gray_tiff(
            &[
                TestLevel::tile_indexed(32, 32, 16, 0, 10),
                TestLevel::filled(16, 16, 16, 5),
            ],
            8,
        ),
    )
}

const ONE_CHANNEL: &str = r#"{"0":{"lut":"FFFFFF","min":0,"max":255}}"#;

// =============================================================================
// info.json
// =============================================================================

#[tokio::test]
async fn test_info_json_document() {
    let (status, headers, body) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/info.json&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("content-type").unwrap(),
        "application/ld+json"
    );

    let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["width"], 32);
    assert_eq!(info["height"], 32);
    assert_eq!(info["protocol"], "http://iiif.io/api/image");
    assert_eq!(info["@id"], "http://tiles.example.org/iiif/data/img.tif");

    let tiles = &info["tiles"][0];
    assert_eq!(tiles["width"], 16);
    assert_eq!(tiles["scaleFactors"], serde_json::json!([1, 2]));

    let supports = info["profile"][1]["supports"].as_array().unwrap();
    assert!(supports.iter().any(|s| s == "rotationBy90s"));
    assert!(supports.iter().any(|s| s == "regionByPct"));
}

#[tokio::test]
async fn test_info_json_advertises_max_size() {
    let (_, _, body) = get_with_config(
        two_level_source(),
        &format!("/iiif/data/img.tif/info.json&{ONE_CHANNEL}"),
        RouterConfig::new().with_tracing(false).with_max_size(1000),
    )
    .await;

    let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["profile"][1]["maxWidth"], 1000);
    assert_eq!(info["profile"][1]["maxHeight"], 1000);
}

// =============================================================================
// Redirect
// =============================================================================

#[tokio::test]
async fn test_parameterless_request_redirects_to_info() {
    let (status, headers, _) = get(
        MemoryChannelSource::new(),
        &format!("/iiif/img.tif&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get("location").unwrap(),
        "http://tiles.example.org/iiif/img.tif/info.json"
    );
}

// =============================================================================
// Tile-aligned image requests
// =============================================================================

#[tokio::test]
async fn test_tile_aligned_request_serves_tile() {
    // Tile (1, 0) of the full-resolution level carries value 10
    let (status, headers, body) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/16,0,16,16/16,/0/native.jpg&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/jpeg");
    assert!(is_valid_jpeg(&body));

    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (16, 16));
    let px = decoded.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 10).abs() <= 3, "got {}", px[0]);
}

#[tokio::test]
async fn test_rotation_half_remaps_tile_index() {
    // Four tiles total; requesting tile (1, 0) under a 180-degree rotation
    // serves underlying tile 4 - 1 - 1 = 2, which carries value 20
    let (status, _, body) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/16,0,16,16/16,/180/native.jpg&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    let px = decoded.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 20).abs() <= 3, "got {}", px[0]);
}

#[tokio::test]
async fn test_full_image_at_smallest_resolution() {
    // The whole image at the thumbnail size takes the fast path too
    let (status, _, body) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/full/16,/0/native.jpg&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (16, 16));
    let px = decoded.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 5).abs() <= 3, "got {}", px[0]);
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_region_request_not_supported() {
    // Not tile-aligned: origin is off-grid
    let (status, _, body) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/3,3,16,16/16,/0/native.jpg&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "unsupported_region");
}

#[tokio::test]
async fn test_too_few_parameters() {
    let (status, _, _) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/full/max/0&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_rotation() {
    let (status, _, _) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/full/max/45/native.jpg&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_jpeg_format_rejected() {
    let (status, _, _) = get(
        two_level_source(),
        &format!("/iiif/data/img.tif/full/max/0/native.png&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_blend_spec_code() {
    let (status, _, body) = get(two_level_source(), "/iiif/data/img.tif/info.json&{}").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["code"], "2 3");
}

#[tokio::test]
async fn test_info_for_missing_channels() {
    let (status, _, _) = get(
        MemoryChannelSource::new(),
        &format!("/iiif/data/img.tif/info.json&{ONE_CHANNEL}"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Multi-channel tint accumulation through the IIIF route
// =============================================================================

#[tokio::test]
async fn test_two_channel_blend() {
    let source = MemoryChannelSource::new()
        .with_image(
            "/data/img_0.tif",
            build_gray_tiff(&[TestLevel::filled(16, 16, 16, 255)], 8),
        )
        .with_image(
            "/data/img_1.tif",
            build_gray_tiff(&[TestLevel::filled(16, 16, 16, 128)], 8),
        );

    let json =
        r#"{"0":{"lut":"FF0000","min":0,"max":255},"1":{"lut":"0000FF","min":0,"max":255}}"#;
    let (status, _, body) = get(
        source,
        &format!("/iiif/data/img.tif/full/16,/0/native.jpg&{json}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    let px = decoded.get_pixel(8, 8);
    assert!(i16::from(px[0]) >= 250, "red was {}", px[0]);
    assert!((i16::from(px[2]) - 128).abs() <= 4, "blue was {}", px[2]);
}

/// A build_router user so the default-policy helper stays exercised.
#[tokio::test]
async fn test_health_endpoint() {
    let router = build_router(MemoryChannelSource::new());
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}
