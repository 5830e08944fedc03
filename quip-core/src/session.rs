/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::coords::fit_within;
use crate::error::{MemeError, Result};
use crate::store::LayerStore;
use crate::TextLayer;

/// Template id sent when the image did not come from the catalogue.
pub const UPLOADED_TEMPLATE_ID: &str = "uploaded";
pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/300x300?text=Template+Image";

/// Decoded straight-alpha RGBA8 pixels.
#[derive(Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(MemeError::image_load(
                "decoded bitmap",
                format!(
                    "{}x{} bitmap needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    pixels.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// A single-colour bitmap.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    RemoteUrl { url: String },
    Blob { data: Arc<[u8]> },
    DecodedBitmap(Bitmap),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum SourceDescriptor {
    RemoteUrl { url: String },
    Blob { data: Vec<u8> },
    DecodedBitmap { width: u32, height: u32, pixels: Vec<u8> },
}

impl ImageSource {
    pub fn remote(url: impl Into<String>) -> Self {
        ImageSource::RemoteUrl { url: url.into() }
    }

    pub fn blob(data: impl Into<Arc<[u8]>>) -> Self {
        ImageSource::Blob { data: data.into() }
    }

    /// Parses a `{ "kind": ... }` descriptor. Kinds other than `remote-url`,
    /// `blob` and `decoded-bitmap` are rejected as unsupported.
    pub fn from_descriptor(value: &Value) -> Result<Self> {
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or("<missing>");
        if !matches!(kind, "remote-url" | "blob" | "decoded-bitmap") {
            return Err(MemeError::UnsupportedSource(kind.to_string()));
        }

        let descriptor: SourceDescriptor = serde_json::from_value(value.clone())
            .map_err(|e| MemeError::UnsupportedSource(format!("{}: {}", kind, e)))?;

        Ok(match descriptor {
            SourceDescriptor::RemoteUrl { url } => ImageSource::RemoteUrl { url },
            SourceDescriptor::Blob { data } => ImageSource::blob(data),
            SourceDescriptor::DecodedBitmap { width, height, pixels } => {
                ImageSource::DecodedBitmap(Bitmap::new(width, height, pixels)?)
            }
        })
    }

    /// Names the source in error messages.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::RemoteUrl { url } => url.clone(),
            ImageSource::Blob { data } => format!("uploaded file ({} bytes)", data.len()),
            ImageSource::DecodedBitmap(bitmap) => {
                format!("decoded bitmap {}x{}", bitmap.width(), bitmap.height())
            }
        }
    }

    /// URL usable directly as an `<img src>` by the live preview.
    pub fn preview_url(&self) -> Option<&str> {
        match self {
            ImageSource::RemoteUrl { url } => Some(url),
            _ => None,
        }
    }
}

/// A catalogue template record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl Template {
    pub fn to_source(&self) -> ImageSource {
        if self.image_url.trim().is_empty() {
            ImageSource::remote(PLACEHOLDER_IMAGE_URL)
        } else {
            ImageSource::remote(self.image_url.clone())
        }
    }
}

/// A previously saved meme handed over by navigation for editing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorSession {
    #[serde(default)]
    pub template: Option<Template>,
    #[serde(default)]
    pub texts: Vec<Value>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub meme_id: Option<String>,
}

/// Receipt for an image load started with [`EditorSession::begin_image_load`].
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    source: ImageSource,
}

impl LoadTicket {
    pub fn source(&self) -> &ImageSource {
        &self.source
    }
}

/// Everything an export needs, detached from the live session.
#[derive(Debug, Clone)]
pub struct ExportSnapshot {
    pub image: ImageSource,
    pub layers: Vec<TextLayer>,
    pub width: u32,
    pub height: u32,
    pub template_id: Option<String>,
    pub meme_id: Option<String>,
}

impl ExportSnapshot {
    pub fn template_id_or_uploaded(&self) -> &str {
        self.template_id.as_deref().unwrap_or(UPLOADED_TEMPLATE_ID)
    }
}

pub struct EditorSession {
    image: Option<ImageSource>,
    preview: Option<Bitmap>,
    store: LayerStore,
    template: Option<Template>,
    existing_meme_id: Option<String>,
    editing_existing: bool,
    generation: u64,
    torn_down: bool,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// A session with the default captions and no image yet.
    pub fn new() -> Self {
        Self {
            image: None,
            preview: None,
            store: LayerStore::new(),
            template: None,
            existing_meme_id: None,
            editing_existing: false,
            generation: 0,
            torn_down: false,
        }
    }

    pub fn for_template(template: Template) -> Self {
        let mut session = Self::new();
        session.template = Some(template);
        session
    }

    /// Starts from an image the user uploaded earlier, passed in explicitly.
    pub fn for_upload(image: ImageSource) -> Self {
        let mut session = Self::new();
        session.image = Some(image);
        session
    }

    /// Edit-existing flow: persisted layers are sanitized, the meme id is kept
    /// for the update. Any handed-over session counts as an edit, with or
    /// without a meme id.
    pub fn from_prior(prior: PriorSession) -> Self {
        let image = prior
            .image_url
            .filter(|url| !url.trim().is_empty())
            .map(ImageSource::remote);

        info!(
            "Editing existing meme {}",
            prior.meme_id.as_deref().unwrap_or("<unsaved>")
        );

        Self {
            image,
            preview: None,
            store: LayerStore::from_persisted(&prior.texts),
            template: prior.template,
            existing_meme_id: prior.meme_id,
            editing_existing: true,
            generation: 0,
            torn_down: false,
        }
    }

    /// The source the editor should load first, if any.
    pub fn initial_source(&self) -> Option<ImageSource> {
        self.image
            .clone()
            .or_else(|| self.template.as_ref().map(Template::to_source))
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LayerStore {
        &mut self.store
    }

    pub fn layers(&self) -> &[TextLayer] {
        self.store.layers()
    }

    pub fn image(&self) -> Option<&ImageSource> {
        self.image.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// The most recently decoded image, for the live preview.
    pub fn preview(&self) -> Option<&Bitmap> {
        self.preview.as_ref()
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn existing_meme_id(&self) -> Option<&str> {
        self.existing_meme_id.as_deref()
    }

    pub fn is_editing_existing(&self) -> bool {
        self.editing_existing
    }

    pub fn title(&self) -> &'static str {
        if self.is_editing_existing() {
            "Edit Your Meme"
        } else {
            "Create a New Meme"
        }
    }

    pub fn save_label(&self) -> &'static str {
        if self.is_editing_existing() {
            "Update Meme"
        } else {
            "Save to My Memes"
        }
    }

    /// Supersedes any load in flight and hands out a ticket for this one.
    pub fn begin_image_load(&mut self, source: ImageSource) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
            source,
        }
    }

    /// Applies a finished load. Results for superseded tickets or a torn-down
    /// session are dropped and `Ok(false)` is returned. On failure the
    /// previous image stays in place and the error is returned.
    pub fn finish_image_load(&mut self, ticket: LoadTicket, result: Result<Bitmap>) -> Result<bool> {
        if self.torn_down || ticket.generation != self.generation {
            debug!("Discarding superseded image load for {}", ticket.source.describe());
            return Ok(false);
        }

        let bitmap = result?;
        debug!(
            "Loaded {} as {}x{}",
            ticket.source.describe(),
            bitmap.width(),
            bitmap.height()
        );
        self.image = Some(ticket.source);
        self.preview = Some(bitmap);
        Ok(true)
    }

    /// Takes `source` as the current image without decoding it here, for hosts
    /// that display the image themselves. Loads in flight are superseded.
    pub fn set_image(&mut self, source: ImageSource) {
        self.generation += 1;
        self.image = Some(source);
        self.preview = None;
    }

    /// Ends the session. Later load results are discarded.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.generation += 1;
    }

    /// Display and export size: the decoded image (or the template's declared
    /// size) fitted inside the configured maximum. The maximum itself while
    /// neither is known.
    pub fn canvas_size(&self, config: &Config) -> (u32, u32) {
        let natural = self
            .preview
            .as_ref()
            .map(|bitmap| (bitmap.width(), bitmap.height()))
            .or_else(|| self.template.as_ref().map(|t| (t.width, t.height)))
            .unwrap_or((0, 0));
        fit_within(
            natural.0,
            natural.1,
            config.max_canvas_width,
            config.max_canvas_height,
        )
    }

    /// Detaches the state an export needs. `None` while no image is loaded.
    pub fn export_snapshot(&self, width: u32, height: u32) -> Option<ExportSnapshot> {
        let image = self.image.clone()?;
        debug_assert!(!self.store.is_empty(), "export with zero layers");
        Some(ExportSnapshot {
            image,
            layers: self.store.snapshot(),
            width,
            height,
            template_id: self.template.as_ref().map(|t| t.id.clone()),
            meme_id: self
                .existing_meme_id
                .clone()
                .filter(|_| self.editing_existing),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Template {
        Template {
            id: "t1".into(),
            name: "Drake".into(),
            image_url: "https://img.example/drake.jpg".into(),
            width: 600,
            height: 600,
        }
    }

    #[test]
    fn descriptor_rejects_unknown_kinds() {
        let err = ImageSource::from_descriptor(&json!({ "kind": "canvas" })).unwrap_err();
        assert!(matches!(err, MemeError::UnsupportedSource(kind) if kind == "canvas"));

        let source =
            ImageSource::from_descriptor(&json!({ "kind": "remote-url", "url": "https://a/b.png" }))
                .unwrap();
        assert_eq!(source, ImageSource::remote("https://a/b.png"));

        let bitmap = ImageSource::from_descriptor(&json!({
            "kind": "decoded-bitmap", "width": 1, "height": 1, "pixels": [1, 2, 3, 4]
        }))
        .unwrap();
        assert!(matches!(bitmap, ImageSource::DecodedBitmap(b) if b.pixels() == [1, 2, 3, 4]));
    }

    #[test]
    fn bitmap_checks_buffer_length() {
        assert!(Bitmap::new(2, 2, vec![0; 15]).is_err());
        assert!(Bitmap::new(0, 2, vec![]).is_err());
        assert_eq!(Bitmap::filled(2, 1, [9, 8, 7, 6]).unwrap().pixels(), [9, 8, 7, 6, 9, 8, 7, 6]);
    }

    #[test]
    fn template_without_url_uses_placeholder() {
        let mut t = template();
        t.image_url.clear();
        assert_eq!(t.to_source(), ImageSource::remote(PLACEHOLDER_IMAGE_URL));
    }

    #[test]
    fn superseded_load_is_discarded() {
        let mut session = EditorSession::for_template(template());
        let first = session.begin_image_load(ImageSource::remote("https://a/1.png"));
        let second = session.begin_image_load(ImageSource::remote("https://a/2.png"));

        let bitmap = Bitmap::filled(1, 1, [0, 0, 0, 255]).unwrap();
        assert!(!session.finish_image_load(first, Ok(bitmap.clone())).unwrap());
        assert!(!session.has_image());

        assert!(session.finish_image_load(second, Ok(bitmap)).unwrap());
        assert_eq!(session.image(), Some(&ImageSource::remote("https://a/2.png")));
    }

    #[test]
    fn failed_load_keeps_previous_image() {
        let mut session = EditorSession::new();
        let ok = session.begin_image_load(ImageSource::remote("https://a/1.png"));
        session
            .finish_image_load(ok, Ok(Bitmap::filled(1, 1, [0; 4]).unwrap()))
            .unwrap();

        let bad = session.begin_image_load(ImageSource::remote("https://a/broken.png"));
        let err = session
            .finish_image_load(bad, Err(MemeError::image_load("https://a/broken.png", "404")))
            .unwrap_err();
        assert!(matches!(err, MemeError::ImageLoad { .. }));
        assert_eq!(session.image(), Some(&ImageSource::remote("https://a/1.png")));
        assert!(session.preview().is_some());
    }

    #[test]
    fn teardown_discards_in_flight_loads() {
        let mut session = EditorSession::new();
        let ticket = session.begin_image_load(ImageSource::remote("https://a/1.png"));
        session.teardown();
        let applied = session
            .finish_image_load(ticket, Ok(Bitmap::filled(1, 1, [0; 4]).unwrap()))
            .unwrap();
        assert!(!applied);
        assert!(!session.has_image());
    }

    #[test]
    fn prior_session_switches_to_edit_mode() {
        let prior: PriorSession = serde_json::from_value(json!({
            "template": { "_id": "t1", "name": "Drake", "imageUrl": "https://img.example/drake.jpg", "width": 600, "height": 600 },
            "texts": [{ "content": "HI", "position": { "x": "bad", "y": 20 } }],
            "imageUrl": "https://cdn.example/meme-7.png",
            "memeId": "m7"
        }))
        .unwrap();

        let session = EditorSession::from_prior(prior);
        assert!(session.is_editing_existing());
        assert_eq!(session.title(), "Edit Your Meme");
        assert_eq!(session.save_label(), "Update Meme");
        assert_eq!(session.layers()[0].position.x, 50.0);

        let snapshot = session.export_snapshot(500, 500).unwrap();
        assert_eq!(snapshot.meme_id.as_deref(), Some("m7"));
        assert_eq!(snapshot.template_id_or_uploaded(), "t1");
        assert_eq!(snapshot.image, ImageSource::remote("https://cdn.example/meme-7.png"));
    }

    #[test]
    fn no_snapshot_without_image() {
        let session = EditorSession::for_template(template());
        assert!(session.export_snapshot(500, 500).is_none());
        assert_eq!(session.initial_source(), Some(ImageSource::remote("https://img.example/drake.jpg")));
        assert_eq!(session.title(), "Create a New Meme");
    }

    #[test]
    fn set_image_supersedes_pending_loads() {
        let mut session = EditorSession::for_template(template());
        let ticket = session.begin_image_load(ImageSource::remote("https://a/old.png"));
        session.set_image(ImageSource::remote("https://a/new.png"));

        let applied = session
            .finish_image_load(ticket, Ok(Bitmap::filled(1, 1, [0; 4]).unwrap()))
            .unwrap();
        assert!(!applied);
        assert_eq!(session.image(), Some(&ImageSource::remote("https://a/new.png")));
        assert_eq!(session.export_snapshot(10, 10).unwrap().template_id_or_uploaded(), "t1");
    }

    #[test]
    fn handed_over_session_without_id_is_still_an_edit() {
        let prior: PriorSession = serde_json::from_value(json!({
            "texts": [{ "content": "HELLO" }],
            "imageUrl": "https://cdn.example/draft.png"
        }))
        .unwrap();

        let session = EditorSession::from_prior(prior);
        assert!(session.is_editing_existing());
        assert_eq!(session.title(), "Edit Your Meme");
        assert_eq!(session.existing_meme_id(), None);
        assert_eq!(session.export_snapshot(500, 500).unwrap().meme_id, None);
    }

    #[test]
    fn canvas_fits_the_loaded_image() {
        let config = Config::default();
        let mut session = EditorSession::for_template(template());
        assert_eq!(session.canvas_size(&config), (500, 500));

        let ticket = session.begin_image_load(ImageSource::remote("https://a/wide.png"));
        session
            .finish_image_load(ticket, Ok(Bitmap::filled(1000, 400, [0; 4]).unwrap()))
            .unwrap();
        assert_eq!(session.canvas_size(&config), (500, 200));

        assert_eq!(EditorSession::new().canvas_size(&config), (500, 500));
    }

    #[test]
    fn uploads_are_saved_as_uploaded_template() {
        let session = EditorSession::for_upload(ImageSource::blob(vec![1u8, 2, 3]));
        let snapshot = session.export_snapshot(10, 10).unwrap();
        assert_eq!(snapshot.template_id_or_uploaded(), "uploaded");
        assert_eq!(snapshot.meme_id, None);
    }
}
