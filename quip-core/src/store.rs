/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use std::collections::HashSet;

use log::{debug, warn};
use serde_json::Value;

use crate::error::{MemeError, Result};
use crate::{
    clamp_percent, normalize_hex, Align, Position, TextLayer, TextStyle, DEFAULT_X_PERCENT,
    MAX_FONT_SIZE, MAX_STROKE_WIDTH, MIN_FONT_SIZE, MIN_STROKE_WIDTH,
};

pub const TOP_TEXT: &str = "TOP TEXT";
pub const BOTTOM_TEXT: &str = "BOTTOM TEXT";
pub const NEW_TEXT: &str = "NEW TEXT";

const TOP_Y_PERCENT: f32 = 10.0;
const BOTTOM_Y_PERCENT: f32 = 90.0;
pub const NEW_TEXT_Y_PERCENT: f32 = 50.0;

const LAST_LAYER_MESSAGE: &str = "You need at least one text element";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyleEdit {
    FontFamily(String),
    FontSize(f32),
    Color(String),
    StrokeColor(String),
    StrokeWidth(f32),
    Align(Align),
}

/// One field-level mutation of a text layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerEdit {
    Content(String),
    Position { axis: Axis, value: f32 },
    Style(StyleEdit),
}

impl LayerEdit {
    /// Builds an edit from a loosely typed `(field, value)` pair as produced by
    /// form controls. `position` takes `{ "axis": "x" | "y", "value": ... }` and
    /// coerces a non-numeric value to 0; any other field names a style key.
    pub fn from_field(field: &str, value: &Value) -> Result<Self> {
        match field {
            "content" => Ok(LayerEdit::Content(value_to_text(value))),
            "position" => {
                let axis = match value.get("axis").and_then(Value::as_str) {
                    Some("x") => Axis::X,
                    Some("y") => Axis::Y,
                    other => {
                        return Err(MemeError::validation(format!(
                            "Unknown position axis: {}",
                            other.unwrap_or("<missing>")
                        )));
                    }
                };
                let value = value.get("value").and_then(numeric_value).unwrap_or(0.0);
                Ok(LayerEdit::Position { axis, value })
            }
            "fontFamily" => Ok(LayerEdit::Style(StyleEdit::FontFamily(value_to_text(value)))),
            "fontSize" => numeric_value(value)
                .map(|size| LayerEdit::Style(StyleEdit::FontSize(size)))
                .ok_or_else(|| MemeError::validation("Font size must be a number")),
            "strokeWidth" => numeric_value(value)
                .map(|width| LayerEdit::Style(StyleEdit::StrokeWidth(width)))
                .ok_or_else(|| MemeError::validation("Outline width must be a number")),
            "color" => Ok(LayerEdit::Style(StyleEdit::Color(value_to_text(value)))),
            "strokeColor" => Ok(LayerEdit::Style(StyleEdit::StrokeColor(value_to_text(value)))),
            "align" => value
                .as_str()
                .and_then(Align::parse)
                .map(|align| LayerEdit::Style(StyleEdit::Align(align)))
                .ok_or_else(|| MemeError::validation("Alignment must be left, center or right")),
            other => Err(MemeError::validation(format!("Unknown text property: {}", other))),
        }
    }
}

/// Ordered text layers plus the active selection.
///
/// The store never drops below one layer.
#[derive(Debug, Clone)]
pub struct LayerStore {
    layers: Vec<TextLayer>,
    active: usize,
    next_id: u64,
    issued_ids: HashSet<String>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// A store seeded with the classic top and bottom captions.
    pub fn new() -> Self {
        let mut store = Self {
            layers: Vec::new(),
            active: 0,
            next_id: 1,
            issued_ids: HashSet::new(),
        };
        store.seed_defaults();
        store
    }

    /// Rebuilds a store from persisted layer JSON. Positions are sanitized
    /// (`x` falls back to 50, `y` to 0) and unusable style fields fall back to
    /// the defaults. An empty list seeds the default captions.
    pub fn from_persisted(texts: &[Value]) -> Self {
        let mut store = Self {
            layers: Vec::with_capacity(texts.len()),
            active: 0,
            next_id: 1,
            issued_ids: HashSet::new(),
        };

        for raw in texts {
            let id = match raw.get("id").map(value_to_text) {
                Some(id) if !id.is_empty() && !store.issued_ids.contains(&id) => id,
                _ => store.fresh_id(),
            };
            store.issued_ids.insert(id.clone());

            let position = raw.get("position");
            let layer = TextLayer {
                id,
                content: raw.get("content").map(value_to_text).unwrap_or_default(),
                position: Position {
                    x: clamp_percent(
                        position
                            .and_then(|p| p.get("x"))
                            .and_then(numeric_value)
                            .unwrap_or(DEFAULT_X_PERCENT),
                    ),
                    y: clamp_percent(
                        position.and_then(|p| p.get("y")).and_then(numeric_value).unwrap_or(0.0),
                    ),
                },
                style: sanitize_style(raw.get("style")),
            };
            store.layers.push(layer);
        }

        if store.layers.is_empty() {
            store.seed_defaults();
        }

        debug!("Ingested {} persisted text layer(s)", store.layers.len());
        store
    }

    fn seed_defaults(&mut self) {
        let top = self.create_default_layer(TOP_TEXT, TOP_Y_PERCENT);
        let bottom = self.create_default_layer(BOTTOM_TEXT, BOTTOM_Y_PERCENT);
        self.layers.push(top);
        self.layers.push(bottom);
        self.active = 0;
    }

    fn fresh_id(&mut self) -> String {
        loop {
            let candidate = format!("text-{}", self.next_id);
            self.next_id += 1;
            if !self.issued_ids.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// A default-styled layer with a never-before-issued id. Not inserted.
    pub fn create_default_layer(&mut self, content: &str, y_percent: f32) -> TextLayer {
        let id = self.fresh_id();
        self.issued_ids.insert(id.clone());
        TextLayer::new_default(id, content, y_percent)
    }

    pub fn layers(&self) -> &[TextLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TextLayer> {
        self.layers.get(index)
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_layer(&self) -> Option<&TextLayer> {
        self.layers.get(self.active)
    }

    pub fn set_active(&mut self, index: usize) {
        debug_assert!(index < self.layers.len(), "active index {index} out of range");
        if index < self.layers.len() {
            self.active = index;
        }
    }

    /// Applies one field edit. Colours must be hex, sizes are clamped to their
    /// ranges and positions to `[0, 100]`.
    ///
    /// An out-of-range `index` is a caller bug: it asserts in debug builds and
    /// is ignored in release builds.
    pub fn update_layer(&mut self, index: usize, edit: LayerEdit) -> Result<()> {
        debug_assert!(index < self.layers.len(), "layer index {index} out of range");
        let Some(layer) = self.layers.get_mut(index) else {
            warn!("Ignoring edit for missing text layer {}", index);
            return Ok(());
        };

        match edit {
            LayerEdit::Content(content) => layer.content = content,
            LayerEdit::Position { axis, value } => {
                let value = clamp_percent(value);
                match axis {
                    Axis::X => layer.position.x = value,
                    Axis::Y => layer.position.y = value,
                }
            }
            LayerEdit::Style(style) => apply_style(&mut layer.style, style)?,
        }
        Ok(())
    }

    /// `update_layer` for loosely typed form input.
    pub fn apply_field(&mut self, index: usize, field: &str, value: &Value) -> Result<()> {
        let edit = LayerEdit::from_field(field, value)?;
        self.update_layer(index, edit)
    }

    /// Moves a layer to `position` in one step.
    pub fn move_layer(&mut self, index: usize, position: Position) {
        debug_assert!(index < self.layers.len(), "layer index {index} out of range");
        if let Some(layer) = self.layers.get_mut(index) {
            layer.position = Position {
                x: clamp_percent(position.x),
                y: clamp_percent(position.y),
            };
        }
    }

    /// Appends a default layer and makes it active. Returns its index.
    pub fn add_layer(&mut self, content: &str, y_percent: f32) -> usize {
        let layer = self.create_default_layer(content, y_percent);
        debug!("Adding text layer {}", layer.id);
        self.layers.push(layer);
        self.active = self.layers.len() - 1;
        self.active
    }

    /// Removes a layer unless it is the last one.
    pub fn remove_layer(&mut self, index: usize) -> Result<TextLayer> {
        let count = self.layers.len();
        if count <= 1 {
            return Err(MemeError::validation(LAST_LAYER_MESSAGE));
        }
        debug_assert!(index < count, "layer index {index} out of range");
        if index >= count {
            return Err(MemeError::validation(format!("No text layer at position {}", index + 1)));
        }

        let removed = self.layers.remove(index);
        self.active = index.min(count - 2);
        debug!("Removed text layer {}", removed.id);
        Ok(removed)
    }

    pub fn snapshot(&self) -> Vec<TextLayer> {
        self.layers.clone()
    }
}

fn apply_style(style: &mut TextStyle, edit: StyleEdit) -> Result<()> {
    match edit {
        StyleEdit::FontFamily(family) => {
            let family = family.trim();
            if family.is_empty() {
                return Err(MemeError::validation("Font family cannot be empty"));
            }
            style.font_family = family.to_string();
        }
        StyleEdit::FontSize(size) => style.font_size = clamp_or(size, MIN_FONT_SIZE, MAX_FONT_SIZE, style.font_size),
        StyleEdit::StrokeWidth(width) => {
            style.stroke_width = clamp_or(width, MIN_STROKE_WIDTH, MAX_STROKE_WIDTH, style.stroke_width)
        }
        StyleEdit::Color(color) => {
            style.color = normalize_hex(&color)
                .ok_or_else(|| MemeError::validation(format!("Invalid text color: {}", color)))?;
        }
        StyleEdit::StrokeColor(color) => {
            style.stroke_color = normalize_hex(&color)
                .ok_or_else(|| MemeError::validation(format!("Invalid outline color: {}", color)))?;
        }
        StyleEdit::Align(align) => style.align = align,
    }
    Ok(())
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn sanitize_style(raw: Option<&Value>) -> TextStyle {
    let mut style = TextStyle::default();
    let Some(raw) = raw else {
        return style;
    };

    if let Some(family) = raw.get("fontFamily").and_then(Value::as_str) {
        if !family.trim().is_empty() {
            style.font_family = family.trim().to_string();
        }
    }
    if let Some(size) = raw.get("fontSize").and_then(numeric_value) {
        style.font_size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    }
    if let Some(color) = raw.get("color").and_then(Value::as_str).and_then(normalize_hex) {
        style.color = color;
    }
    if let Some(color) = raw.get("strokeColor").and_then(Value::as_str).and_then(normalize_hex) {
        style.stroke_color = color;
    }
    if let Some(width) = raw.get("strokeWidth").and_then(numeric_value) {
        style.stroke_width = width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
    }
    if let Some(align) = raw.get("align").and_then(Value::as_str).and_then(Align::parse) {
        style.align = align;
    }
    style
}

/// A finite number, either as a JSON number or a numeric string.
fn numeric_value(value: &Value) -> Option<f32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        _ => return None,
    };
    let number = number as f32;
    number.is_finite().then_some(number)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
