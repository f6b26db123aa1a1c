//! End-to-end pipeline tests against synthesized symbol images.

use framescan::{
    BarcodeFormat, DecodeEngine, DecodeOutcome, DecodeRequest, Decoder, EventFilter,
    EventReceiver, LuminanceSource, OverlayShape, Point, Rect, ScanConfig, ScanEvent, ScanSession,
    SyntheticFrameSource,
};
use rxing::{BarcodeFormat as RxFormat, MultiFormatWriter, Writer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Render a symbol into an 8-bit luminance plane: dark modules on white.
fn symbol_plane(contents: &str, format: RxFormat, width: i32, height: i32) -> (Vec<u8>, u32, u32) {
    let matrix = MultiFormatWriter
        .encode(contents, &format, width, height)
        .expect("encode symbol");
    let (w, h) = (matrix.getWidth(), matrix.getHeight());
    let mut plane = vec![255u8; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            if matrix.get(x, y) {
                plane[(y * w + x) as usize] = 0;
            }
        }
    }
    (plane, w, h)
}

/// Paste a plane into a larger white canvas at the given offset.
fn paste(
    canvas_w: u32,
    canvas_h: u32,
    plane: &[u8],
    plane_w: u32,
    plane_h: u32,
    left: u32,
    top: u32,
) -> Vec<u8> {
    let mut canvas = vec![255u8; (canvas_w * canvas_h) as usize];
    for y in 0..plane_h {
        let src = (y * plane_w) as usize;
        let dst = ((top + y) * canvas_w + left) as usize;
        canvas[dst..dst + plane_w as usize]
            .copy_from_slice(&plane[src..src + plane_w as usize]);
    }
    canvas
}

fn full_frame_request(plane: Vec<u8>, width: u32, height: u32) -> DecodeRequest {
    DecodeRequest {
        luminance: LuminanceSource {
            plane: Arc::new(plane),
            width,
            height,
            crop: Rect::new(0, 0, width, height),
        },
        formats: HashSet::new(),
        try_harder: false,
        also_inverted: false,
        character_set: None,
        max_extra_attempts: 2,
    }
}

fn expect_found(outcome: DecodeOutcome) -> framescan::Decoded {
    match outcome {
        DecodeOutcome::Found(decoded) => decoded,
        DecodeOutcome::NotFound => panic!("expected a decode result"),
    }
}

#[test]
fn qr_code_decodes_through_engine() {
    let (plane, w, h) = symbol_plane("HELLO", RxFormat::QR_CODE, 200, 200);
    let mut engine = DecodeEngine::new();
    let decoded = expect_found(engine.decode(&full_frame_request(plane, w, h)).unwrap());
    assert_eq!(decoded.text, "HELLO");
    assert_eq!(decoded.format, BarcodeFormat::QrCode);
    assert!(!decoded.points.is_empty());
}

#[test]
fn upc_a_decodes_through_engine() {
    let (plane, w, h) = symbol_plane("012345678905", RxFormat::UPC_A, 380, 120);
    let mut engine = DecodeEngine::new();
    let decoded = expect_found(engine.decode(&full_frame_request(plane, w, h)).unwrap());
    assert_eq!(decoded.text, "012345678905");
    assert_eq!(decoded.format, BarcodeFormat::UpcA);
}

#[test]
fn decode_is_deterministic() {
    let (plane, w, h) = symbol_plane("determinism", RxFormat::QR_CODE, 200, 200);
    let mut engine = DecodeEngine::new();
    let first = expect_found(
        engine
            .decode(&full_frame_request(plane.clone(), w, h))
            .unwrap(),
    );
    let second = expect_found(engine.decode(&full_frame_request(plane, w, h)).unwrap());
    assert_eq!(first.text, second.text);
    assert_eq!(first.format, second.format);
    assert_eq!(first.points, second.points);
}

#[test]
fn format_restriction_suppresses_other_symbologies() {
    let (plane, w, h) = symbol_plane("012345678905", RxFormat::UPC_A, 380, 120);
    let mut engine = DecodeEngine::new();
    let mut request = full_frame_request(plane, w, h);
    request.formats.insert(BarcodeFormat::QrCode);
    assert_eq!(engine.decode(&request).unwrap(), DecodeOutcome::NotFound);
}

#[test]
fn inverted_symbol_needs_inverted_retry_and_budget() {
    let (plane, w, h) = symbol_plane("INVERTED", RxFormat::QR_CODE, 200, 200);
    let inverted: Vec<u8> = plane.iter().map(|b| 255 - b).collect();
    let mut engine = DecodeEngine::new();

    // Plain attempt does not see a light-on-dark symbol.
    let request = full_frame_request(inverted.clone(), w, h);
    assert_eq!(engine.decode(&request).unwrap(), DecodeOutcome::NotFound);

    // The inverted retry finds it.
    let mut request = full_frame_request(inverted.clone(), w, h);
    request.also_inverted = true;
    let decoded = expect_found(engine.decode(&request).unwrap());
    assert_eq!(decoded.text, "INVERTED");

    // But not with an exhausted retry budget.
    let mut request = full_frame_request(inverted, w, h);
    request.also_inverted = true;
    request.max_extra_attempts = 0;
    assert_eq!(engine.decode(&request).unwrap(), DecodeOutcome::NotFound);
}

#[test]
fn crop_offsets_map_points_to_frame_coordinates() {
    let (symbol, sw, sh) = symbol_plane("OFFSET", RxFormat::QR_CODE, 150, 150);
    let (canvas_w, canvas_h) = (400u32, 300u32);
    let (left, top) = (220u32, 130u32);
    let canvas = paste(canvas_w, canvas_h, &symbol, sw, sh, left, top);

    let mut request = full_frame_request(canvas, canvas_w, canvas_h);
    request.luminance.crop = Rect::new(left, top, sw, sh);

    let mut engine = DecodeEngine::new();
    let decoded = expect_found(engine.decode(&request).unwrap());
    assert_eq!(decoded.text, "OFFSET");
    // Points are reported in full-frame coordinates, inside the crop window.
    for Point { x, y } in &decoded.points {
        assert!(*x >= left as f32 && *x <= (left + sw) as f32);
        assert!(*y >= top as f32 && *y <= (top + sh) as f32);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_scans_qr_end_to_end() {
    let (symbol, sw, sh) = symbol_plane("https://example.com", RxFormat::QR_CODE, 180, 180);
    let (canvas_w, canvas_h) = (400u32, 400u32);
    let canvas = paste(
        canvas_w,
        canvas_h,
        &symbol,
        sw,
        sh,
        (canvas_w - sw) / 2,
        (canvas_h - sh) / 2,
    );

    let mut config = ScanConfig::default();
    config.viewfinder.screen_width = canvas_w;
    config.viewfinder.screen_height = canvas_h;

    let source = Box::new(SyntheticFrameSource::from_plane(
        canvas, canvas_w, canvas_h, 30,
    ));
    let mut session = ScanSession::new(config, source);
    let mut events = EventReceiver::new(
        session.event_bus().subscribe(),
        EventFilter::EventTypes(vec!["decode_succeeded"]),
        "test".to_string(),
    );

    session.start().await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("session should decode the symbol")
        .unwrap();

    let model = match event {
        ScanEvent::DecodeSucceeded { model, .. } => model,
        other => panic!("unexpected event: {:?}", other),
    };
    assert_eq!(model.content, "https://example.com");
    assert_eq!(model.format, BarcodeFormat::QrCode);
    assert_eq!(model.kind, framescan::ContentKind::Uri);
    assert!(model.from_live_scan);
    // QR feature points render as markers, not scan lines.
    assert!(model
        .overlay
        .iter()
        .all(|shape| matches!(shape, OverlayShape::Marker { .. })));

    assert!(session.last_result().is_some());
    session.restart_scanning(Some(Duration::from_millis(1)));
    assert!(session.last_result().is_none());

    session.teardown().await;
}
