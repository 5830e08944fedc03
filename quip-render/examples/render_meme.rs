use std::fs::File;
use std::io::Write;

use image::{Rgba, RgbaImage};
use quip_core::coords::fit_within;
use quip_core::{config, Bitmap, LayerStore, Position};
use quip_render::Compositor;

fn main() {
    env_logger::init();

    let settings = config::load().unwrap_or_default();

    println!("Generating checkerboard template...");
    let mut template = RgbaImage::new(800, 600);
    for (x, y, pixel) in template.enumerate_pixels_mut() {
        *pixel = if (x / 50 + y / 50) % 2 == 0 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        };
    }
    let (width, height) = template.dimensions();
    let bitmap = Bitmap::new(width, height, template.into_raw()).unwrap();

    let (canvas_w, canvas_h) = fit_within(
        bitmap.width(),
        bitmap.height(),
        settings.max_canvas_width,
        settings.max_canvas_height,
    );
    println!("Canvas: {}x{}", canvas_w, canvas_h);

    let mut store = LayerStore::new();
    let index = store.add_layer("MIDDLE TEXT", 50.0);
    store.move_layer(index, Position { x: 30.0, y: 55.0 });

    let mut compositor = Compositor::new();
    let added = compositor.load_font_dirs(&settings.font_dirs);
    println!("Extra font faces: {}", added);

    let png = compositor
        .render_png(&bitmap, store.layers(), canvas_w, canvas_h)
        .unwrap();

    let mut file = File::create("meme.png").unwrap();
    file.write_all(&png).unwrap();
    println!("Saved to meme.png ({} bytes)", png.len());
}
