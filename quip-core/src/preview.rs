/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Live preview: text layers as an SVG overlay above the image.
//!
//! SVG `<text>` shares the raster compositor's conventions: `y` is the
//! alphabetic baseline, `text-anchor` mirrors the alignment, and the outline is
//! centered on the glyph edge and painted under the fill.

use crate::coords::place_layer;
use crate::TextLayer;

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewText {
    pub id: String,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub text_anchor: &'static str,
    pub font_family: String,
    pub font_size: f32,
    pub fill: String,
    /// `none` when the layer has no outline.
    pub stroke: String,
    pub stroke_width: f32,
    pub active: bool,
}

/// Lays out every layer for a container of `width` x `height` pixels.
pub fn preview_texts(layers: &[TextLayer], active: usize, width: f32, height: f32) -> Vec<PreviewText> {
    layers
        .iter()
        .enumerate()
        .map(|(index, layer)| {
            let placement = place_layer(layer, width, height);
            let stroke = if placement.line_width > 0.0 {
                layer.style.stroke_color.clone()
            } else {
                "none".to_string()
            };

            PreviewText {
                id: layer.id.clone(),
                content: layer.content.replace('\n', " "),
                x: placement.anchor_x,
                y: placement.baseline_y,
                text_anchor: placement.align.text_anchor(),
                font_family: layer.style.font_family.clone(),
                font_size: placement.font_size,
                fill: layer.style.color.clone(),
                stroke,
                stroke_width: placement.line_width,
                active: index == active,
            }
        })
        .collect()
}

#[cfg(feature = "rsx")]
mod dom {
    use super::preview_texts;
    use crate::TextLayer;

    use dioxus::prelude::*;

    /// Read-only preview: the image with the overlay on top.
    pub fn render_to_rsx(image_url: Option<&str>, layers: &[TextLayer], width: u32, height: u32) -> Element {
        let texts = preview_texts(layers, usize::MAX, width as f32, height as f32);
        let container_style = format!(
            "position: relative; width: {}px; height: {}px; overflow: hidden; background-color: #ffffff;",
            width, height
        );
        let view_box = format!("0 0 {} {}", width, height);

        rsx! {
            div {
                class: "meme-preview",
                style: "{container_style}",
                if let Some(url) = image_url {
                    img {
                        src: "{url}",
                        style: "position: absolute; left: 0; top: 0; width: 100%; height: 100%;",
                        draggable: "false",
                    }
                }
                svg {
                    "viewBox": "{view_box}",
                    style: "position: absolute; left: 0; top: 0; width: 100%; height: 100%; pointer-events: none;",
                    for item in texts {
                        text {
                            key: "{item.id}",
                            "x": "{item.x}",
                            "y": "{item.y}",
                            "text-anchor": "{item.text_anchor}",
                            "font-family": "{item.font_family}",
                            "font-size": "{item.font_size}",
                            "fill": "{item.fill}",
                            "stroke": "{item.stroke}",
                            "stroke-width": "{item.stroke_width}",
                            "stroke-linejoin": "miter",
                            "paint-order": "stroke",
                            "{item.content}"
                        }
                    }
                }
            }
        }
    }
}

#[cfg(feature = "rsx")]
pub use dom::render_to_rsx;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Align;

    #[test]
    fn overlay_matches_raster_placement() {
        let mut top = TextLayer::new_default("text-1", "TOP\nTEXT", 10.0);
        top.style.align = Align::Left;
        let mut bottom = TextLayer::new_default("text-2", "BOTTOM TEXT", 90.0);
        bottom.style.stroke_width = 0.0;

        let texts = preview_texts(&[top, bottom], 1, 500.0, 400.0);

        assert_eq!(texts[0].content, "TOP TEXT");
        assert_eq!((texts[0].x, texts[0].y), (250.0, 40.0));
        assert_eq!(texts[0].text_anchor, "start");
        assert_eq!(texts[0].stroke_width, 4.0);
        assert!(!texts[0].active);

        assert_eq!(texts[1].y, 360.0);
        assert_eq!(texts[1].stroke, "none");
        assert!(texts[1].active);
    }

    #[cfg(feature = "rsx")]
    #[test]
    fn renders_read_only_preview() {
        let layers = vec![TextLayer::new_default("text-1", "HELLO", 10.0)];
        let _element = render_to_rsx(Some("https://img.example/a.png"), &layers, 500, 500);
    }
}
