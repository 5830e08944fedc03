/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use serde::{Deserialize, Serialize};

pub mod config;
pub mod coords;
pub mod drag;
pub mod error;
pub mod object_url;
pub mod preview;
pub mod session;
pub mod store;

pub use coords::{ContainerRect, LayerPlacement, PointerPoint};
pub use drag::{DragController, DragState, PointerCapture};
pub use error::{DeliveryError, MemeError, Result};
pub use object_url::{ObjectUrl, ObjectUrls};
pub use session::{Bitmap, EditorSession, ExportSnapshot, ImageSource, LoadTicket, PriorSession, Template};
pub use store::{Axis, LayerEdit, LayerStore, StyleEdit};

pub const DEFAULT_FONT_FAMILY: &str = "Impact";
pub const DEFAULT_FONT_SIZE: f32 = 40.0;
pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";
pub const DEFAULT_STROKE_COLOR: &str = "#000000";
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;
pub const DEFAULT_X_PERCENT: f32 = 50.0;

pub const MIN_FONT_SIZE: f32 = 10.0;
pub const MAX_FONT_SIZE: f32 = 100.0;
pub const MIN_STROKE_WIDTH: f32 = 0.0;
pub const MAX_STROKE_WIDTH: f32 = 10.0;

/// Font families offered by the editor.
pub const FONT_FAMILIES: [&str; 6] = [
    "Impact",
    "Arial",
    "Verdana",
    "Comic Sans MS",
    "Courier New",
    "Georgia",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextLayer {
    pub id: String,
    pub content: String,
    pub position: Position,
    pub style: TextStyle,
}

/// Percentages of the container's width (`x`) and height (`y`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: f32,
    #[serde(default)]
    pub align: Align,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

impl TextLayer {
    /// A layer with the stock meme look: white Impact, black outline, centered.
    pub fn new_default(id: impl Into<String>, content: impl Into<String>, y_percent: f32) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            position: Position {
                x: DEFAULT_X_PERCENT,
                y: clamp_percent(y_percent),
            },
            style: TextStyle::default(),
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            color: DEFAULT_TEXT_COLOR.to_string(),
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            align: Align::Center,
        }
    }
}

impl TextStyle {
    /// Canvas-style font shorthand, e.g. `40px Impact`.
    pub fn font_shorthand(&self) -> String {
        format!("{}px {}", self.font_size, self.font_family)
    }
}

impl Align {
    pub fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "left" | "start" => Some(Align::Left),
            "center" | "middle" => Some(Align::Center),
            "right" | "end" => Some(Align::Right),
            _ => None,
        }
    }

    /// How much of the line width sits left of the anchor point.
    pub fn anchor_fraction(&self) -> f32 {
        match self {
            Align::Left => 0.0,
            Align::Center => 0.5,
            Align::Right => 1.0,
        }
    }

    /// SVG `text-anchor` value that reproduces this alignment.
    pub fn text_anchor(&self) -> &'static str {
        match self {
            Align::Left => "start",
            Align::Center => "middle",
            Align::Right => "end",
        }
    }
}

pub(crate) fn clamp_percent(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Parses `#rrggbb` or `#rgb` into its channels.
pub fn parse_hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match digits.len() {
        6 => {
            let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
            Some((r, g, b))
        }
        3 => {
            let mut channels = digits.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            Some((channels.next()??, channels.next()??, channels.next()??))
        }
        _ => None,
    }
}

/// Normalizes a colour to lowercase `#rrggbb`.
pub fn normalize_hex(hex: &str) -> Option<String> {
    let (r, g, b) = parse_hex_rgb(hex.trim())?;
    Some(format!("#{:02x}{:02x}{:02x}", r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_serializes_with_camel_case_style() {
        let layer = TextLayer::new_default("text-1", "TOP TEXT", 10.0);
        let json = serde_json::to_value(&layer).unwrap();

        assert_eq!(json["style"]["fontFamily"], "Impact");
        assert_eq!(json["style"]["strokeColor"], "#000000");
        assert_eq!(json["style"]["align"], "center");
        assert_eq!(json["position"]["x"], 50.0);

        let back: TextLayer = serde_json::from_value(json).unwrap();
        assert_eq!(back, layer);
    }

    #[test]
    fn default_layer_uses_stock_style() {
        let layer = TextLayer::new_default("a", "BOTTOM TEXT", 90.0);
        assert_eq!(layer.style.font_shorthand(), "40px Impact");
        assert_eq!(layer.style.stroke_width, 2.0);
        assert_eq!(layer.position, Position { x: 50.0, y: 90.0 });
    }

    #[test]
    fn hex_colors_parse_short_and_long_forms() {
        assert_eq!(parse_hex_rgb("#ff8000"), Some((255, 128, 0)));
        assert_eq!(parse_hex_rgb("#fff"), Some((255, 255, 255)));
        assert_eq!(parse_hex_rgb("ff8000"), None);
        assert_eq!(parse_hex_rgb("#ggg"), None);
        assert_eq!(parse_hex_rgb("#ff80"), None);
        assert_eq!(normalize_hex(" #ABC "), Some("#aabbcc".to_string()));
    }

    #[test]
    fn align_maps_to_svg_anchor() {
        assert_eq!(Align::parse("Right"), Some(Align::Right));
        assert_eq!(Align::Center.text_anchor(), "middle");
        assert_eq!(Align::Left.anchor_fraction(), 0.0);
        assert_eq!(Align::parse("justify"), None);
    }
}
