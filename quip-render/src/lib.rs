/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use cosmic_text::{Attrs, Buffer, Command, Family, FontSystem, Metrics, Shaping, SwashCache};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use log::{debug, info, warn};
use quip_core::coords::{place_layer, LayerPlacement};
use quip_core::{parse_hex_rgb, Bitmap, MemeError, TextLayer};
use thiserror::Error;
use tiny_skia::*;

pub mod clipboard;
pub mod export;
pub mod persist;
pub mod resolve;
pub mod worker;

pub use clipboard::{ClipboardSink, SystemClipboard};
pub use export::{ExportAction, ExportOutcome, Exporter, Notice};
pub use persist::{PersistenceClient, SaveRequest, SavedMeme};
pub use resolve::{ImageResolver, Purpose};
pub use worker::RenderWorker;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create pixmap: {0}")]
    PixmapCreationError(String),

    #[error("Invalid color format: {0}")]
    InvalidColorFormat(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Image decoding error: {0}")]
    ImageError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<RenderError> for MemeError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidColorFormat(color) => {
                MemeError::validation(format!("Invalid color: {}", color))
            }
            RenderError::ImageError(reason) => MemeError::image_load("background image", reason),
            other => MemeError::Encode(other.to_string()),
        }
    }
}

/// Draws an image plus its text layers onto an off-screen raster.
///
/// Text is converted to glyph outlines and painted like a canvas
/// `strokeText` followed by `fillText`, so the outline sits under the fill.
pub struct Compositor {
    font_system: FontSystem,
    swash_cache: SwashCache,
    loaded_fonts: HashSet<String>,
    family_cache: HashMap<String, Option<String>>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    /// Uses the system font database.
    pub fn new() -> Self {
        Self::with_font_system(FontSystem::new())
    }

    pub fn with_font_system(font_system: FontSystem) -> Self {
        Self {
            font_system,
            swash_cache: SwashCache::new(),
            loaded_fonts: HashSet::new(),
            family_cache: HashMap::new(),
        }
    }

    /// Registers a `.ttf`/`.otf` file by name. Returns whether it was new.
    pub fn load_font_data(&mut self, name: &str, data: Vec<u8>) -> bool {
        let is_font = name.ends_with(".ttf") || name.ends_with(".otf");
        if !is_font || self.loaded_fonts.contains(name) {
            return false;
        }

        self.font_system.db_mut().load_font_data(data);
        self.loaded_fonts.insert(name.to_string());
        self.fonts_changed();
        true
    }

    /// Loads every font file found under `dirs`. Returns the number of faces added.
    pub fn load_font_dirs(&mut self, dirs: &[PathBuf]) -> usize {
        let before = self.font_system.db().len();
        for dir in dirs {
            if dir.is_dir() {
                self.font_system.db_mut().load_fonts_dir(dir);
            } else {
                warn!("Font directory {} does not exist", dir.display());
            }
        }

        let added = self.font_system.db().len().saturating_sub(before);
        if added > 0 {
            info!("Loaded {} font faces", added);
            self.fonts_changed();
        }
        added
    }

    pub fn has_fonts(&self) -> bool {
        !self.font_system.db().is_empty()
    }

    fn fonts_changed(&mut self) {
        self.family_cache.clear();

        // Point the generic families at a face that exists so a database
        // holding only custom fonts still renders.
        let db = self.font_system.db();
        let sans = db.family_name(&cosmic_text::fontdb::Family::SansSerif).to_string();
        let has_sans = db
            .faces()
            .any(|face| face.families.iter().any(|(name, _)| *name == sans));
        if has_sans {
            return;
        }

        let first_family = db
            .faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()));
        if let Some(family) = first_family {
            debug!("Using {} as the generic font family", family);
            let db = self.font_system.db_mut();
            db.set_sans_serif_family(family.clone());
            db.set_serif_family(family.clone());
            db.set_monospace_family(family.clone());
            db.set_cursive_family(family.clone());
            db.set_fantasy_family(family);
        }
    }

    /// Maps a CSS-style family list to an installed family name, `None`
    /// meaning the sans-serif fallback.
    fn resolve_family(&mut self, requested: &str) -> Option<String> {
        if let Some(cached) = self.family_cache.get(requested) {
            return cached.clone();
        }

        let mut resolved = None;
        for candidate in requested.split(',').map(|s| s.trim().trim_matches('"')) {
            let lower = candidate.to_lowercase();
            if matches!(lower.as_str(), "sans-serif" | "sans serif" | "system-ui") {
                break;
            }

            let normalized_query = lower.replace(' ', "");
            resolved = self.font_system.db().faces().find_map(|face| {
                face.families
                    .iter()
                    .find(|(name, _)| name.to_lowercase().replace(' ', "") == normalized_query)
                    .map(|(name, _)| name.clone())
            });
            if resolved.is_some() {
                break;
            }
        }

        match &resolved {
            Some(name) => debug!("Matched font '{}' -> '{}'", requested, name),
            None => warn!("Font '{}' not available, using sans-serif fallback", requested),
        }
        self.family_cache.insert(requested.to_string(), resolved.clone());
        resolved
    }

    /// Composites `image` and `layers` onto a `width` x `height` raster.
    pub fn composite(
        &mut self,
        image: &Bitmap,
        layers: &[TextLayer],
        width: u32,
        height: u32,
    ) -> Result<Pixmap, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions(format!(
                "{}x{} raster",
                width, height
            )));
        }

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| RenderError::PixmapCreationError("Invalid canvas dimensions".into()))?;

        pixmap.fill(Color::WHITE);

        let background = scaled_background(image, width, height)?;
        pixmap.draw_pixmap(
            0,
            0,
            background.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );

        for layer in layers {
            self.draw_layer(&mut pixmap, layer)?;
        }

        Ok(pixmap)
    }

    /// [`Compositor::composite`] encoded as PNG.
    pub fn render_png(
        &mut self,
        image: &Bitmap,
        layers: &[TextLayer],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RenderError> {
        self.composite(image, layers, width, height)?
            .encode_png()
            .map_err(|e| RenderError::EncodingError(e.to_string()))
    }

    fn draw_layer(&mut self, pixmap: &mut Pixmap, layer: &TextLayer) -> Result<(), RenderError> {
        let fill_color = parse_color(&layer.style.color)
            .ok_or_else(|| RenderError::InvalidColorFormat(layer.style.color.clone()))?;
        let stroke_color = parse_color(&layer.style.stroke_color)
            .ok_or_else(|| RenderError::InvalidColorFormat(layer.style.stroke_color.clone()))?;

        let placement = place_layer(layer, pixmap.width() as f32, pixmap.height() as f32);
        let Some(path) = self.text_path(layer, &placement) else {
            return Ok(());
        };

        if placement.line_width > 0.0 {
            let mut paint = Paint::default();
            paint.set_color(stroke_color);
            paint.anti_alias = true;

            let stroke = Stroke {
                width: placement.line_width,
                miter_limit: 10.0,
                line_cap: LineCap::Butt,
                line_join: LineJoin::Miter,
                dash: None,
            };
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }

        let mut paint = Paint::default();
        paint.set_color(fill_color);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

        Ok(())
    }

    /// Outline of a layer's text in raster coordinates. `None` when nothing is drawn.
    fn text_path(&mut self, layer: &TextLayer, placement: &LayerPlacement) -> Option<Path> {
        let content = layer.content.replace('\n', " ");
        if content.trim().is_empty() || placement.font_size <= 0.0 {
            return None;
        }
        if !self.has_fonts() {
            warn!("No fonts loaded, skipping text layer {}", layer.id);
            return None;
        }

        let family_name = self.resolve_family(&layer.style.font_family);
        let family = match &family_name {
            Some(name) => Family::Name(name),
            None => Family::SansSerif,
        };
        let attrs = Attrs::new().family(family);

        let metrics = Metrics::new(placement.font_size, placement.font_size * 1.2);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_text(&mut self.font_system, &content, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let mut pb = PathBuilder::new();
        for run in buffer.layout_runs() {
            let line_start = placement.line_start(run.line_w);

            for glyph in run.glyphs {
                let physical_glyph = glyph.physical((0., 0.), 1.0);
                let Some(commands) = self
                    .swash_cache
                    .get_outline_commands_uncached(&mut self.font_system, physical_glyph.cache_key)
                else {
                    continue;
                };

                // Outlines are y-up around the glyph origin.
                let gx = line_start + glyph.x + glyph.font_size * glyph.x_offset;
                let gy = placement.baseline_y + glyph.y - glyph.font_size * glyph.y_offset;

                for command in commands.iter() {
                    match *command {
                        Command::MoveTo(p) => pb.move_to(gx + p.x, gy - p.y),
                        Command::LineTo(p) => pb.line_to(gx + p.x, gy - p.y),
                        Command::QuadTo(c, p) => pb.quad_to(gx + c.x, gy - c.y, gx + p.x, gy - p.y),
                        Command::CurveTo(c1, c2, p) => pb.cubic_to(
                            gx + c1.x,
                            gy - c1.y,
                            gx + c2.x,
                            gy - c2.y,
                            gx + p.x,
                            gy - p.y,
                        ),
                        Command::Close => pb.close(),
                    }
                }
            }
        }

        pb.finish()
    }
}

/// The bitmap stretched to exactly `width` x `height`, premultiplied.
fn scaled_background(image: &Bitmap, width: u32, height: u32) -> Result<Pixmap, RenderError> {
    let rgba = RgbaImage::from_raw(image.width(), image.height(), image.pixels().to_vec())
        .ok_or_else(|| RenderError::ImageError("bitmap buffer does not match its size".into()))?;

    let rgba = if rgba.width() == width && rgba.height() == height {
        rgba
    } else {
        DynamicImage::ImageRgba8(rgba)
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgba8()
    };

    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for pixel in rgba.pixels() {
        let r = pixel[0];
        let g = pixel[1];
        let b = pixel[2];
        let a = pixel[3];

        let a_f = a as f32 / 255.0;
        pixels.push((r as f32 * a_f) as u8);
        pixels.push((g as f32 * a_f) as u8);
        pixels.push((b as f32 * a_f) as u8);
        pixels.push(a);
    }

    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| RenderError::InvalidDimensions(format!("{}x{}", width, height)))?;
    Pixmap::from_vec(pixels, size)
        .ok_or_else(|| RenderError::PixmapCreationError("background buffer size mismatch".into()))
}

pub fn parse_color(hex: &str) -> Option<Color> {
    let (r, g, b) = parse_hex_rgb(hex.trim())?;
    Some(Color::from_rgba8(r, g, b, 255))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_compositor() -> Compositor {
        Compositor::with_font_system(FontSystem::new_with_locale_and_db(
            "en-US".into(),
            cosmic_text::fontdb::Database::new(),
        ))
    }

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let p = pixmap.pixel(x, y).unwrap();
        [p.red(), p.green(), p.blue(), p.alpha()]
    }

    #[test]
    fn transparent_image_sits_on_white() {
        let image = Bitmap::filled(4, 4, [255, 0, 0, 0]).unwrap();
        let pixmap = empty_compositor().composite(&image, &[], 4, 4).unwrap();
        assert_eq!(pixel(&pixmap, 2, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn image_is_stretched_to_raster() {
        let image = Bitmap::filled(2, 1, [0, 0, 255, 255]).unwrap();
        let pixmap = empty_compositor().composite(&image, &[], 10, 30).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (10, 30));
        let [r, g, b, a] = pixel(&pixmap, 9, 29);
        assert!(r < 3 && g < 3 && b > 252 && a == 255, "got {:?}", [r, g, b, a]);
    }

    #[test]
    fn zero_sized_raster_is_rejected() {
        let image = Bitmap::filled(1, 1, [0, 0, 0, 255]).unwrap();
        let err = empty_compositor().composite(&image, &[], 0, 10).unwrap_err();
        assert!(matches!(err, RenderError::InvalidDimensions(_)));
        assert!(matches!(MemeError::from(err), MemeError::Encode(_)));
    }

    #[test]
    fn invalid_layer_color_is_reported() {
        let image = Bitmap::filled(1, 1, [0, 0, 0, 255]).unwrap();
        let mut layer = TextLayer::new_default("text-1", "HI", 50.0);
        layer.style.color = "white".into();
        let err = empty_compositor().composite(&image, &[layer], 8, 8).unwrap_err();
        assert!(matches!(err, RenderError::InvalidColorFormat(c) if c == "white"));
    }

    #[test]
    fn text_without_fonts_is_skipped() {
        let image = Bitmap::filled(1, 1, [0, 0, 0, 255]).unwrap();
        let layers = vec![TextLayer::new_default("text-1", "TOP TEXT", 10.0)];
        let png = empty_compositor().render_png(&image, &layers, 50, 50).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(parse_color("#fff"), Some(Color::WHITE));
        assert_eq!(parse_color("#000000"), Some(Color::BLACK));
        assert_eq!(parse_color("black"), None);
    }

    #[test]
    fn non_font_resources_are_ignored() {
        let mut compositor = empty_compositor();
        assert!(!compositor.load_font_data("notes.txt", vec![1, 2, 3]));
        assert_eq!(compositor.load_font_dirs(&[PathBuf::from("/definitely/missing")]), 0);
    }
}
