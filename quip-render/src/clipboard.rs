/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use std::borrow::Cow;

use log::debug;
use quip_core::DeliveryError;

/// Destination for the "copy" export.
pub trait ClipboardSink {
    fn write_png(&mut self, png: &[u8]) -> Result<(), DeliveryError>;
}

/// The OS clipboard.
///
/// The arboard handle is opened on first use and kept for the life of this
/// value. On X11 and Wayland the copied image only stays available while a
/// handle is alive, unless a clipboard manager takes it over.
#[derive(Default)]
pub struct SystemClipboard {
    manager: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.manager.is_some()
    }

    fn manager(&mut self) -> Result<&mut arboard::Clipboard, DeliveryError> {
        if self.manager.is_none() {
            debug!("Opening system clipboard");
            let manager =
                arboard::Clipboard::new().map_err(|e| DeliveryError::Clipboard(e.to_string()))?;
            self.manager = Some(manager);
        }
        self.manager
            .as_mut()
            .ok_or_else(|| DeliveryError::Clipboard("clipboard unavailable".into()))
    }
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard")
            .field("open", &self.is_open())
            .finish()
    }
}

impl ClipboardSink for SystemClipboard {
    fn write_png(&mut self, png: &[u8]) -> Result<(), DeliveryError> {
        let rgba = image::load_from_memory(png)
            .map_err(|e| DeliveryError::Clipboard(e.to_string()))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();

        let result = self.manager()?.set_image(arboard::ImageData {
            width: width as usize,
            height: height as usize,
            bytes: Cow::Owned(rgba.into_raw()),
        });

        // A broken connection is reopened on the next copy.
        if result.is_err() {
            self.manager = None;
        }
        result.map_err(|e| DeliveryError::Clipboard(e.to_string()))
    }
}
