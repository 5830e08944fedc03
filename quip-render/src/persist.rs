/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Client for the save-meme endpoint.

use log::{debug, info};
use quip_core::config::Config;
use quip_core::session::UPLOADED_TEMPLATE_ID;
use quip_core::{DeliveryError, ExportSnapshot, MemeError, Result, TextLayer};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;

const SAVE_FAILED_MESSAGE: &str = "Failed to save meme";

/// One save submission.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub png: Vec<u8>,
    /// `None` when the image did not come from the catalogue.
    pub template_id: Option<String>,
    pub texts: Vec<TextLayer>,
    /// Present only when updating an existing record.
    pub meme_id: Option<String>,
}

impl SaveRequest {
    pub fn from_snapshot(snapshot: &ExportSnapshot, png: Vec<u8>) -> Self {
        Self {
            png,
            template_id: snapshot.template_id.clone(),
            texts: snapshot.layers.clone(),
            meme_id: snapshot.meme_id.clone(),
        }
    }

    fn into_form(self) -> Result<Form> {
        let texts = serde_json::to_string(&self.texts)
            .map_err(|e| MemeError::Encode(format!("layers: {}", e)))?;
        let image = Part::bytes(self.png)
            .file_name("meme.png")
            .mime_str("image/png")
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let mut form = Form::new()
            .part("image", image)
            .text(
                "templateId",
                self.template_id.unwrap_or_else(|| UPLOADED_TEMPLATE_ID.to_string()),
            )
            .text("texts", texts);
        if let Some(meme_id) = self.meme_id {
            form = form.text("memeId", meme_id);
        }
        Ok(form)
    }
}

/// The server's saved record, echoed back with what was submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMeme {
    #[serde(flatten)]
    pub record: serde_json::Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub texts: Vec<TextLayer>,
}

impl SavedMeme {
    /// Overlays the submitted template id and layers on the server record.
    /// The server's own `templateId` and `texts` are replaced, and with no
    /// template id the key is left out entirely.
    pub fn merge(
        mut record: serde_json::Map<String, Value>,
        template_id: Option<String>,
        texts: Vec<TextLayer>,
    ) -> Self {
        record.remove("templateId");
        record.remove("texts");
        Self {
            record,
            template_id,
            texts,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.record.get("_id").and_then(Value::as_str)
    }
}

pub struct PersistenceClient {
    client: reqwest::Client,
    save_url: String,
}

impl PersistenceClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        Ok(Self::with_client(client, config.save_url()))
    }

    pub fn with_client(client: reqwest::Client, save_url: impl Into<String>) -> Self {
        Self {
            client,
            save_url: save_url.into(),
        }
    }

    pub fn save_url(&self) -> &str {
        &self.save_url
    }

    /// Submits `request` with `token` as the bearer credential.
    pub async fn save(&self, request: SaveRequest, token: &str) -> Result<SavedMeme> {
        let template_id = request.template_id.clone();
        let texts = request.texts.clone();
        let updating = request.meme_id.is_some();
        let form = request.into_form()?;

        debug!("Submitting meme to {}", self.save_url);
        let response = self
            .client
            .post(&self.save_url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let record = interpret_response(status, &body)?;
        info!("Meme {}", if updating { "updated" } else { "saved" });

        Ok(SavedMeme::merge(record, template_id, texts))
    }
}

/// Reads a save response. Success yields the `savedMeme` record (or the whole
/// body when it has none), failure the server's `message` or a fallback.
pub fn interpret_response(
    status: u16,
    body: &str,
) -> std::result::Result<serde_json::Map<String, Value>, DeliveryError> {
    let parsed: std::result::Result<Value, _> = serde_json::from_str(body);

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(|json| json.get("message"))
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .unwrap_or(SAVE_FAILED_MESSAGE)
            .to_string();
        return Err(DeliveryError::Server { status, message });
    }

    let json = parsed.map_err(|e| DeliveryError::Network(format!("Invalid response: {}", e)))?;
    match json {
        Value::Object(mut body) => match body.remove("savedMeme") {
            Some(Value::Object(record)) => Ok(record),
            Some(_) | None => Ok(body),
        },
        _ => Err(DeliveryError::Network("Invalid response: expected an object".into())),
    }
}
