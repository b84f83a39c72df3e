//! Integration tests for canvas2d-bridge.

use canvas2d_bridge::{
    Canvas2dContext, Canvas2dError, ColorF32, EngineCall, EngineConfig, EngineHandle, FontConfig,
    ImageData, Path, PathOp, RectParams,
};

fn context(width: u32, height: u32) -> Canvas2dContext {
    let _ = env_logger::builder().is_test(true).try_init();
    Canvas2dContext::with_config(width, height, FontConfig::empty()).unwrap()
}

fn rect(x: f32, y: f32, width: f32, height: f32) -> RectParams {
    RectParams {
        x,
        y,
        width,
        height,
    }
}

fn pixel(image: &ImageData, x: usize, y: usize) -> [u8; 4] {
    let idx = (y * image.width() as usize + x) * 4;
    let data = image.data();
    [data[idx], data[idx + 1], data[idx + 2], data[idx + 3]]
}

/// Fill a right triangle. The pixel straddling the hypotenuse gets partial
/// coverage; color channels read back unpremultiplied.
#[test]
fn test_fill_right_triangle() {
    let mut ctx = context(20, 20);
    ctx.set_fill_style("#f00");
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(10.0, 0.0);
    ctx.line_to(10.0, 10.0);
    ctx.close_path();
    ctx.fill().unwrap();

    let image = ctx.snapshot().unwrap();
    assert_eq!(pixel(&image, 9, 9), [255, 0, 0, 96]);
    assert_eq!(pixel(&image, 1, 9), [0, 0, 0, 0]);
    assert_eq!(pixel(&image, 8, 2), [255, 0, 0, 255]);
    assert_eq!(pixel(&image, 12, 5), [0, 0, 0, 0]);
}

#[test]
fn test_fill_isosceles_triangle() {
    let mut ctx = context(20, 20);
    ctx.set_fill_style("#f00");
    ctx.begin_path();
    ctx.move_to(2.0, 2.0);
    ctx.line_to(18.0, 2.0);
    ctx.line_to(10.0, 18.0);
    ctx.close_path();
    ctx.fill().unwrap();

    let image = ctx.snapshot().unwrap();
    assert_eq!(pixel(&image, 9, 9), [255, 0, 0, 255]);
    assert_eq!(pixel(&image, 1, 9), [0, 0, 0, 0]);
}

#[test]
fn test_clear_rect_punches_hole() {
    let mut ctx = context(10, 10);
    ctx.set_fill_style("rgb(0, 0, 255)");
    ctx.fill_rect(&rect(0.0, 0.0, 10.0, 10.0)).unwrap();
    ctx.clear_rect(&rect(2.0, 2.0, 4.0, 4.0)).unwrap();

    let image = ctx.snapshot().unwrap();
    assert_eq!(pixel(&image, 3, 3), [0, 0, 0, 0]);
    assert_eq!(pixel(&image, 1, 1), [0, 0, 255, 255]);
    assert_eq!(pixel(&image, 7, 7), [0, 0, 255, 255]);
}

/// The shadow pass is drawn first under its own save/restore pair.
#[test]
fn test_shadow_call_order() {
    let (engine, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
    let mut ctx = Canvas2dContext::builder(20, 20)
        .font_config(FontConfig::empty())
        .engine(engine)
        .build()
        .unwrap();
    log.clear();

    ctx.set_shadow_color("black");
    ctx.set_shadow_offset_x(3.0);
    ctx.fill_rect(&rect(1.0, 1.0, 5.0, 5.0)).unwrap();

    let calls = log.take();
    let shape: Vec<&'static str> = calls
        .iter()
        .map(|call| match call {
            EngineCall::Save => "save",
            EngineCall::Restore => "restore",
            EngineCall::Concat(_) => "concat",
            EngineCall::DrawRect { .. } => "draw",
            _ => "other",
        })
        .collect();
    assert_eq!(
        shape,
        vec!["save", "concat", "concat", "concat", "draw", "restore", "draw"]
    );
}

#[test]
fn test_shadow_lands_at_device_offset() {
    let mut ctx = context(20, 20);
    ctx.scale(2.0, 2.0).unwrap();
    ctx.set_fill_style("#fff");
    ctx.set_shadow_color("#00f");
    ctx.set_shadow_offset_x(6.0);
    ctx.fill_rect(&rect(0.0, 0.0, 2.0, 2.0)).unwrap();

    let image = ctx.snapshot().unwrap();
    // Rect covers device 0..4, shadow is offset by 6 device pixels, not 12
    assert_eq!(pixel(&image, 1, 1), [255, 255, 255, 255]);
    assert_eq!(pixel(&image, 7, 1), [0, 0, 255, 255]);
    assert_eq!(pixel(&image, 13, 1), [0, 0, 0, 0]);
}

/// A gradient is rebuilt for each transform, releasing its previous shader.
#[test]
fn test_gradient_shader_follows_transform() {
    let (engine, log) = EngineHandle::recording(EngineConfig::default()).unwrap();
    let mut ctx = Canvas2dContext::builder(20, 20)
        .font_config(FontConfig::empty())
        .engine(engine)
        .build()
        .unwrap();
    log.clear();

    let gradient = ctx.create_linear_gradient(0.0, 0.0, 10.0, 0.0);
    gradient.add_color_stop(0.0, ColorF32::BLACK).unwrap();
    gradient.add_color_stop(1.0, ColorF32::WHITE).unwrap();
    ctx.set_fill_style_gradient(gradient);

    ctx.fill_rect(&rect(0.0, 0.0, 10.0, 10.0)).unwrap();
    ctx.translate(5.0, 5.0).unwrap();
    ctx.fill_rect(&rect(0.0, 0.0, 10.0, 10.0)).unwrap();

    let calls = log.take();
    let made: Vec<_> = calls
        .iter()
        .filter_map(|call| match call {
            EngineCall::MakeShader { id, .. } => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(made.len(), 2);
    assert_ne!(made[0], made[1]);
    assert!(calls
        .iter()
        .any(|call| matches!(call, EngineCall::DeleteShader(id) if *id == made[0])));
}

#[test]
fn test_non_finite_line_to_is_noop() {
    let mut ctx = context(10, 10);
    ctx.move_to(1.0, 1.0);
    ctx.line_to(5.0, 5.0);
    let before = ctx.current_path().clone();
    ctx.line_to(f32::NAN, 3.0);
    assert_eq!(ctx.current_path(), &before);
}

#[test]
fn test_odd_dash_list_is_doubled() {
    let mut ctx = context(10, 10);
    ctx.set_line_dash(vec![5.0]);
    assert_eq!(ctx.get_line_dash(), &[5.0, 5.0]);
    ctx.set_line_dash(vec![1.0, -2.0]);
    assert_eq!(ctx.get_line_dash(), &[5.0, 5.0]);
}

/// State changes bracketed by save/restore leave no trace in later drawing.
#[test]
fn test_save_restore_is_transparent() {
    let draw = |ctx: &mut Canvas2dContext| {
        ctx.set_fill_style("#0a0");
        ctx.fill_rect(&rect(2.0, 2.0, 8.0, 8.0)).unwrap();
    };

    let mut plain = context(16, 16);
    draw(&mut plain);

    let mut bracketed = context(16, 16);
    bracketed.save().unwrap();
    bracketed.translate(4.0, 4.0).unwrap();
    bracketed.rotate(0.5).unwrap();
    bracketed.set_global_alpha(0.25);
    bracketed.set_shadow_color("red");
    bracketed.set_shadow_blur(3.0);
    bracketed.rect(&rect(0.0, 0.0, 4.0, 4.0));
    bracketed.clip().unwrap();
    bracketed.restore().unwrap();
    bracketed.begin_path();
    draw(&mut bracketed);

    assert_eq!(
        plain.snapshot().unwrap().data(),
        bracketed.snapshot().unwrap().data()
    );
}

#[test]
fn test_disposed_context_reports_error() {
    let mut ctx = context(10, 10);
    ctx.dispose().unwrap();
    assert!(matches!(
        ctx.fill_rect(&rect(0.0, 0.0, 1.0, 1.0)),
        Err(Canvas2dError::SurfaceDisposed)
    ));
    assert!(matches!(
        ctx.get_image_data(0, 0, 1, 1),
        Err(Canvas2dError::SurfaceDisposed)
    ));
}

/// A path built across transform changes keeps its device-space position.
#[test]
fn test_path_survives_transform_round_trip() {
    let mut ctx = context(10, 10);
    ctx.move_to(1.0, 2.0);
    ctx.line_to(6.0, 3.0);
    ctx.rotate(0.7).unwrap();
    ctx.scale(3.0, 0.5).unwrap();
    ctx.reset_transform().unwrap();

    let points: Vec<(f32, f32)> = ctx
        .current_path()
        .points()
        .iter()
        .map(|p| (p.x, p.y))
        .collect();
    let expected = [(1.0, 2.0), (6.0, 3.0)];
    assert_eq!(points.len(), expected.len());
    for ((x, y), (ex, ey)) in points.iter().zip(expected) {
        assert!((x - ex).abs() < 1e-3 && (y - ey).abs() < 1e-3);
    }
}

#[test]
fn test_path_union_covers_both_operands() {
    let mut a = Path::new();
    a.rect(&rect(0.0, 0.0, 10.0, 10.0));
    let mut b = Path::new();
    b.rect(&rect(5.0, 5.0, 10.0, 10.0));

    let union = a.op(&b, PathOp::Union).unwrap();
    let bounds = union.bounds().unwrap();
    assert_eq!(
        (bounds.left, bounds.top, bounds.right, bounds.bottom),
        (0.0, 0.0, 15.0, 15.0)
    );
    let rule = canvas2d_bridge::CanvasFillRule::NonZero;
    assert!(union.contains(2.0, 2.0, rule));
    assert!(union.contains(12.0, 12.0, rule));
    assert!(union.contains(7.0, 7.0, rule));
    assert!(!union.contains(12.0, 2.0, rule));

    let mut ctx = context(20, 20);
    ctx.set_fill_style("#000");
    ctx.fill_path2d(&union).unwrap();
    let image = ctx.snapshot().unwrap();
    assert_eq!(pixel(&image, 7, 7)[3], 255);
    assert_eq!(pixel(&image, 12, 2)[3], 0);
}

#[test]
fn test_png_round_trip_dimensions() {
    let mut ctx = context(32, 16);
    ctx.set_fill_style("#123456");
    ctx.fill_rect(&rect(0.0, 0.0, 32.0, 16.0)).unwrap();
    let png = ctx.to_png(None).unwrap();

    let decoder = png::Decoder::new(std::io::Cursor::new(png));
    let reader = decoder.read_info().unwrap();
    let info = reader.info();
    assert_eq!((info.width, info.height), (32, 16));
}
