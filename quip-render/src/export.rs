/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Export actions: render the snapshot once, then deliver it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use quip_core::config::Config;
use quip_core::{DeliveryError, ExportSnapshot, MemeError, Result};

use crate::clipboard::ClipboardSink;
use crate::persist::{PersistenceClient, SaveRequest, SavedMeme};
use crate::resolve::{ImageResolver, Purpose};
use crate::Compositor;

pub const LOGIN_REQUIRED_MESSAGE: &str = "Please login to save memes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportAction {
    Download,
    Clipboard,
    Save { token: Option<String> },
}

impl ExportAction {
    /// Verb used in failure messages, e.g. "Failed to copy: ...".
    pub fn verb(&self) -> &'static str {
        match self {
            ExportAction::Download => "download meme",
            ExportAction::Clipboard => "copy",
            ExportAction::Save { .. } => "save meme",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Downloaded { path: PathBuf },
    Copied,
    Saved(SavedMeme),
}

impl ExportOutcome {
    pub fn message(&self) -> String {
        match self {
            ExportOutcome::Downloaded { path } => format!("Meme downloaded to {}", path.display()),
            ExportOutcome::Copied => "Meme copied to clipboard!".to_string(),
            ExportOutcome::Saved(_) => "Meme saved to your collection successfully!".to_string(),
        }
    }
}

/// What the host shows after an export.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Success(String),
    Error(String),
}

pub struct Exporter<C: ClipboardSink> {
    compositor: Compositor,
    resolver: ImageResolver,
    persistence: PersistenceClient,
    clipboard: C,
    download_dir: PathBuf,
    download_file_name: String,
    release_delay: Duration,
}

impl<C: ClipboardSink> Exporter<C> {
    pub fn new(config: &Config, compositor: Compositor, clipboard: C) -> Result<Self> {
        Ok(Self {
            compositor,
            resolver: ImageResolver::new(config)?,
            persistence: PersistenceClient::new(config)?,
            clipboard,
            download_dir: config.resolved_download_dir(),
            download_file_name: config.download_file_name.clone(),
            release_delay: Duration::from_millis(config.release_delay_ms),
        })
    }

    pub fn resolver(&self) -> &ImageResolver {
        &self.resolver
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// Runs `action` on `snapshot`. A missing snapshot (no image loaded) is a
    /// no-op returning `Ok(None)`.
    pub async fn export(
        &mut self,
        snapshot: Option<&ExportSnapshot>,
        action: &ExportAction,
    ) -> Result<Option<ExportOutcome>> {
        let Some(snapshot) = snapshot else {
            debug!("Ignoring {} without an image", action.verb());
            return Ok(None);
        };

        // Checked before rendering so no raster is produced.
        let token = match action {
            ExportAction::Save { token } => match token.as_deref().map(str::trim) {
                Some(token) if !token.is_empty() => Some(token.to_string()),
                _ => return Err(MemeError::validation(LOGIN_REQUIRED_MESSAGE)),
            },
            _ => None,
        };

        let png = self.render(snapshot).await?;

        let outcome = match (action, token) {
            (ExportAction::Download, _) => ExportOutcome::Downloaded {
                path: self.download(png).await?,
            },
            (ExportAction::Clipboard, _) => {
                self.clipboard.write_png(&png)?;
                ExportOutcome::Copied
            }
            (ExportAction::Save { .. }, Some(token)) => {
                let request = SaveRequest::from_snapshot(snapshot, png);
                ExportOutcome::Saved(self.persistence.save(request, &token).await?)
            }
            (ExportAction::Save { .. }, None) => {
                return Err(MemeError::validation(LOGIN_REQUIRED_MESSAGE));
            }
        };

        info!("{}", outcome.message());
        Ok(Some(outcome))
    }

    /// [`Exporter::export`] reduced to a message for the user.
    pub async fn run(&mut self, snapshot: Option<&ExportSnapshot>, action: &ExportAction) -> Option<Notice> {
        match self.export(snapshot, action).await {
            Ok(outcome) => outcome.map(|outcome| Notice::Success(outcome.message())),
            Err(err) => {
                warn!("Export failed: {}", err);
                Some(Notice::Error(err.user_message(action.verb())))
            }
        }
    }

    /// The flattened PNG for `snapshot`. Remote images are re-fetched fresh.
    pub async fn render(&mut self, snapshot: &ExportSnapshot) -> Result<Vec<u8>> {
        let bitmap = self.resolver.resolve(&snapshot.image, Purpose::Export).await?;
        let png = self
            .compositor
            .render_png(&bitmap, &snapshot.layers, snapshot.width, snapshot.height)?;
        Ok(png)
    }

    async fn download(&self, png: Vec<u8>) -> Result<PathBuf> {
        let reference = self.resolver.object_urls().create(png.into());
        let data = reference
            .data()
            .ok_or_else(|| MemeError::Encode("download reference was released".into()))?;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| DeliveryError::Io(e.to_string()))?;
        let path = unique_download_path(&self.download_dir, &self.download_file_name);
        tokio::fs::write(&path, &*data)
            .await
            .map_err(|e| DeliveryError::Io(e.to_string()))?;

        let delay = self.release_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reference.release();
        });

        Ok(path)
    }
}

/// `dir/name`, or `dir/stem (n).ext` for the first free `n`.
pub fn unique_download_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    (1u32..)
        .map(|n| match &extension {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
