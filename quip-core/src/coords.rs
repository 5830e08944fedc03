/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Mapping between layer space (percentages of the container) and pixels.
//!
//! Both the live preview and the raster compositor place text through
//! [`place_layer`], so the two renderers cannot drift apart.

use crate::{Align, Position, TextLayer};

/// Pixel offset of `percent` along a dimension.
pub fn to_pixel(percent: f32, dimension: f32) -> f32 {
    percent * dimension / 100.0
}

/// Percentage for a pixel offset, or `None` when the dimension is degenerate.
pub fn to_percent(pixel: f32, dimension: f32) -> Option<f32> {
    if dimension > 0.0 && dimension.is_finite() && pixel.is_finite() {
        Some(pixel * 100.0 / dimension)
    } else {
        None
    }
}

/// Pointer location in client (viewport) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPoint {
    pub x: f32,
    pub y: f32,
}

/// Bounding box of the editor container in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// Pointer position in layer space. `None` while the container has no area.
    pub fn pointer_percent(&self, pointer: PointerPoint) -> Option<Position> {
        Some(Position {
            x: to_percent(pointer.x - self.left, self.width)?,
            y: to_percent(pointer.y - self.top, self.height)?,
        })
    }
}

/// Scales an image to fit inside `max_width` x `max_height`, keeping its
/// aspect ratio. Small images are scaled up.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_width, max_height);
    }

    let scale = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
    let fitted_w = (width as f32 * scale).round().max(1.0) as u32;
    let fitted_h = (height as f32 * scale).round().max(1.0) as u32;
    (fitted_w.min(max_width), fitted_h.min(max_height))
}

/// Where and how one text layer lands on a surface of a given size.
///
/// `anchor_x` is the alignment point and `baseline_y` the alphabetic baseline,
/// matching canvas `fillText(text, x, y)` semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlacement {
    pub anchor_x: f32,
    pub baseline_y: f32,
    pub align: Align,
    pub font_size: f32,
    /// Outline width: twice the style's stroke width, centered on the glyph edge.
    pub line_width: f32,
}

impl LayerPlacement {
    /// Left edge of a line `line_width` pixels wide.
    pub fn line_start(&self, line_width: f32) -> f32 {
        self.anchor_x - line_width * self.align.anchor_fraction()
    }
}

pub fn place_layer(layer: &TextLayer, width: f32, height: f32) -> LayerPlacement {
    LayerPlacement {
        anchor_x: to_pixel(layer.position.x, width),
        baseline_y: to_pixel(layer.position.y, height),
        align: layer.style.align,
        font_size: layer.style.font_size,
        line_width: layer.style.stroke_width * 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_pixel_round_trip() {
        for dimension in [1.0f32, 37.0, 333.0, 500.0, 1920.0] {
            for step in 0..=200 {
                let percent = step as f32 * 0.5;
                let back = to_percent(to_pixel(percent, dimension), dimension).unwrap();
                assert!((back - percent).abs() < 1e-3, "{percent} -> {back} at {dimension}");
            }
        }
    }

    #[test]
    fn zero_dimension_does_not_divide() {
        assert_eq!(to_pixel(50.0, 0.0), 0.0);
        assert_eq!(to_percent(10.0, 0.0), None);
        assert_eq!(to_percent(10.0, f32::NAN), None);
    }

    #[test]
    fn pointer_percent_is_relative_to_container() {
        let rect = ContainerRect::new(10.0, 20.0, 500.0, 400.0);
        let pos = rect.pointer_percent(PointerPoint { x: 160.0, y: 220.0 }).unwrap();
        assert_eq!(pos, Position { x: 30.0, y: 50.0 });

        let collapsed = ContainerRect::new(0.0, 0.0, 0.0, 400.0);
        assert_eq!(collapsed.pointer_percent(PointerPoint { x: 1.0, y: 1.0 }), None);
    }

    #[test]
    fn fit_within_keeps_aspect_ratio() {
        assert_eq!(fit_within(1000, 500, 500, 500), (500, 250));
        assert_eq!(fit_within(300, 600, 500, 500), (250, 500));
        assert_eq!(fit_within(100, 100, 500, 500), (500, 500));
        assert_eq!(fit_within(0, 100, 500, 500), (500, 500));
    }

    #[test]
    fn placement_follows_alignment() {
        let mut layer = TextLayer::new_default("a", "HI", 90.0);
        layer.position.x = 20.0;
        layer.style.align = Align::Right;

        let placement = place_layer(&layer, 500.0, 400.0);
        assert_eq!(placement.anchor_x, 100.0);
        assert_eq!(placement.baseline_y, 360.0);
        assert_eq!(placement.line_width, 4.0);
        assert_eq!(placement.line_start(80.0), 20.0);

        layer.style.align = Align::Center;
        assert_eq!(place_layer(&layer, 500.0, 400.0).line_start(80.0), 60.0);
    }
}
