/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Turns an [`ImageSource`] into a decoded [`Bitmap`].

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use quip_core::config::Config;
use quip_core::{Bitmap, DeliveryError, ImageSource, MemeError, ObjectUrls, Result};
use reqwest::Url;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const GIF_MAGICS: [&[u8]; 2] = [b"GIF87a", b"GIF89a"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Preview,
    /// Remote images are re-fetched past any cache.
    Export,
}

pub struct ImageResolver {
    client: reqwest::Client,
    base_url: Option<Url>,
    object_urls: ObjectUrls,
    max_upload_bytes: usize,
}

impl ImageResolver {
    pub fn new(config: &Config) -> Result<Self> {
        // No cookie store and no credentials: remote fetches are anonymous.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let base_url = match Url::parse(&config.api_base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Ignoring invalid api_base_url {}: {}", config.api_base_url, e);
                None
            }
        };

        Ok(Self {
            client,
            base_url,
            object_urls: ObjectUrls::new(),
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    /// Registry of the temporary references this resolver hands out.
    pub fn object_urls(&self) -> &ObjectUrls {
        &self.object_urls
    }

    pub async fn resolve(&self, source: &ImageSource, purpose: Purpose) -> Result<Bitmap> {
        match source {
            ImageSource::RemoteUrl { url } => {
                let mut absolute = self.absolute_url(url)?;
                if purpose == Purpose::Export {
                    absolute = cache_busted(&absolute, now_millis());
                }
                let bytes = self.fetch(&absolute).await?;
                decode(bytes, absolute).await
            }
            ImageSource::Blob { data } => {
                validate_upload(data, self.max_upload_bytes)?;

                // Released when it goes out of scope, after success or failure.
                let reference = self.object_urls.create(data.clone());
                let origin = reference.as_str().to_string();
                let bytes = reference
                    .data()
                    .ok_or_else(|| MemeError::image_load(&origin, "object reference was released"))?;
                decode(bytes, origin).await
            }
            ImageSource::DecodedBitmap(bitmap) => Ok(bitmap.clone()),
        }
    }

    fn absolute_url(&self, url: &str) -> Result<String> {
        if let Ok(parsed) = Url::parse(url) {
            return Ok(parsed.into());
        }

        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| MemeError::image_load(url, "relative URL without a base"))?;
        base.join(url)
            .map(String::from)
            .map_err(|e| MemeError::image_load(url, e))
    }

    async fn fetch(&self, url: &str) -> Result<Arc<[u8]>> {
        debug!("Fetching image {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| MemeError::image_load(url, e))?;

        let bytes = response.bytes().await.map_err(|e| MemeError::image_load(url, e))?;
        Ok(Arc::from(bytes.as_ref()))
    }
}

/// Decodes off the async thread.
pub async fn decode(bytes: Arc<[u8]>, origin: String) -> Result<Bitmap> {
    let join_origin = origin.clone();
    tokio::task::spawn_blocking(move || decode_bytes(&bytes, &origin))
        .await
        .map_err(|e| MemeError::image_load(join_origin, e))?
}

pub fn decode_bytes(bytes: &[u8], origin: &str) -> Result<Bitmap> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|e| MemeError::image_load(origin, e))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    Bitmap::new(width, height, rgba.into_raw())
}

/// Appends `t=<token>` so caches in between serve a fresh copy.
pub fn cache_busted(url: &str, token: u128) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, separator, token)
}

/// Upload checks: JPEG, PNG or GIF content, at most `max_bytes` long.
pub fn validate_upload(data: &[u8], max_bytes: usize) -> Result<()> {
    let is_image = data.starts_with(JPEG_MAGIC)
        || data.starts_with(PNG_MAGIC)
        || GIF_MAGICS.iter().any(|magic| data.starts_with(magic));
    if !is_image {
        return Err(MemeError::validation(
            "Invalid file type. Please upload an image (JPEG, PNG, GIF)",
        ));
    }

    if data.len() > max_bytes {
        let limit_mb = (max_bytes as f64 / (1024.0 * 1024.0)).round();
        return Err(MemeError::validation(format!(
            "File size must be less than {}MB",
            limit_mb
        )));
    }

    Ok(())
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[test]
    fn cache_token_uses_the_right_separator() {
        assert_eq!(cache_busted("https://a/b.png", 7), "https://a/b.png?t=7");
        assert_eq!(cache_busted("https://a/b.png?w=5", 7), "https://a/b.png?w=5&t=7");
    }

    #[test]
    fn uploads_must_be_small_images() {
        assert!(validate_upload(&png_bytes(2, 2), 5 * 1024 * 1024).is_ok());
        assert!(validate_upload(b"GIF89a....", 1024).is_ok());

        let err = validate_upload(b"%PDF-1.7", 1024).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid file type. Please upload an image (JPEG, PNG, GIF)"
        );

        let mut big = vec![0xFF, 0xD8, 0xFF];
        big.resize(5 * 1024 * 1024 + 1, 0);
        let err = validate_upload(&big, 5 * 1024 * 1024).unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 5MB");
    }

    #[tokio::test]
    async fn blob_reference_is_released_after_decode() {
        let resolver = ImageResolver::new(&Config::default()).unwrap();
        let source = ImageSource::blob(png_bytes(3, 2));

        let bitmap = resolver.resolve(&source, Purpose::Preview).await.unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (3, 2));
        assert_eq!(&bitmap.pixels()[..4], &[10, 20, 30, 255]);
        assert_eq!(resolver.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn blob_reference_is_released_after_failed_decode() {
        let resolver = ImageResolver::new(&Config::default()).unwrap();
        let mut corrupt = PNG_MAGIC.to_vec();
        corrupt.extend_from_slice(&[0; 32]);

        let err = resolver
            .resolve(&ImageSource::blob(corrupt), Purpose::Preview)
            .await
            .unwrap_err();
        assert!(matches!(err, MemeError::ImageLoad { ref origin, .. } if origin.starts_with("blob:")));
        assert_eq!(resolver.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn decoded_bitmaps_pass_through() {
        let resolver = ImageResolver::new(&Config::default()).unwrap();
        let bitmap = Bitmap::filled(1, 1, [1, 2, 3, 4]).unwrap();
        let resolved = resolver
            .resolve(&ImageSource::DecodedBitmap(bitmap.clone()), Purpose::Export)
            .await
            .unwrap();
        assert_eq!(resolved, bitmap);
    }

    #[test]
    fn relative_urls_join_the_api_base() {
        let resolver = ImageResolver::new(&Config::default()).unwrap();
        assert_eq!(
            resolver.absolute_url("/uploads/a.png").unwrap(),
            "http://localhost:5000/uploads/a.png"
        );
        assert_eq!(
            resolver.absolute_url("https://cdn.example/b.png").unwrap(),
            "https://cdn.example/b.png"
        );
    }
}
