use cosmic_text::FontSystem;
use quip_core::{Bitmap, LayerStore, TextLayer};
use quip_render::Compositor;

const SIZE: u32 = 500;
const TEST_FONT: &[u8] = include_bytes!("fonts/NotoSans-Regular.ttf");

/// A compositor whose only face is the bundled Noto Sans, so output does not
/// depend on the fonts installed on the machine.
fn compositor() -> Compositor {
    let mut compositor = Compositor::with_font_system(FontSystem::new_with_locale_and_db(
        "en-US".into(),
        cosmic_text::fontdb::Database::new(),
    ));
    assert!(compositor.load_font_data("NotoSans-Regular.ttf", TEST_FONT.to_vec()));
    compositor
}

fn background() -> Bitmap {
    Bitmap::filled(64, 64, [30, 60, 200, 255]).unwrap()
}

fn changed_pixels(data: &[u8], background: &[u8]) -> Vec<(u32, u32)> {
    data.chunks(4)
        .zip(background.chunks(4))
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| ((i as u32) % SIZE, (i as u32) / SIZE))
        .collect()
}

#[test]
fn default_captions_render_identically_twice() {
    let store = LayerStore::new();
    let layers = store.snapshot();
    assert_eq!(layers[0].content, "TOP TEXT");
    assert_eq!(layers[1].content, "BOTTOM TEXT");

    let mut compositor = compositor();
    let plain = compositor.render_png(&background(), &[], SIZE, SIZE).unwrap();
    let first = compositor.render_png(&background(), &layers, SIZE, SIZE).unwrap();
    let second = compositor.render_png(&background(), &layers, SIZE, SIZE).unwrap();
    assert_eq!(first, second);
    assert_ne!(first, plain, "captions were not drawn");

    let mut fresh = crate::compositor();
    let third = fresh.render_png(&background(), &layers, SIZE, SIZE).unwrap();
    assert_eq!(first, third);
}

#[test]
fn bottom_caption_sits_on_its_baseline() {
    let mut compositor = compositor();

    let plain = compositor.composite(&background(), &[], SIZE, SIZE).unwrap();
    let layer = TextLayer::new_default("text-2", "BOTTOM TEXT", 90.0);
    let drawn = compositor.composite(&background(), &[layer], SIZE, SIZE).unwrap();

    let changed = changed_pixels(drawn.data(), plain.data());
    assert!(!changed.is_empty());

    let min_y = changed.iter().map(|p| p.1).min().unwrap();
    let max_y = changed.iter().map(|p| p.1).max().unwrap();
    assert!(min_y >= 400, "text starts at {min_y}");
    assert!(max_y <= 456, "text ends at {max_y}");

    let min_x = changed.iter().map(|p| p.0).min().unwrap() as i64;
    let max_x = changed.iter().map(|p| p.0).max().unwrap() as i64;
    assert!((min_x + max_x - SIZE as i64).abs() <= 6, "not centered: {min_x}..{max_x}");
}

#[test]
fn fill_is_painted_over_the_outline() {
    let mut compositor = compositor();

    let mut layer = TextLayer::new_default("text-1", "HI", 50.0);
    layer.style.font_size = 100.0;
    layer.style.stroke_width = 6.0;
    layer.style.color = "#00ff00".into();
    layer.style.stroke_color = "#ff0000".into();

    let pixmap = compositor.composite(&background(), &[layer], SIZE, SIZE).unwrap();
    let green = pixmap
        .data()
        .chunks(4)
        .filter(|p| *p == [0u8, 255, 0, 255])
        .count();
    let red = pixmap
        .data()
        .chunks(4)
        .filter(|p| *p == [255u8, 0, 0, 255])
        .count();
    assert!(green > 0, "fill hidden under the outline");
    assert!(red > 0, "outline missing");
}
