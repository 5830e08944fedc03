/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemeError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to load image from {origin}: {reason}")]
    ImageLoad { origin: String, reason: String },

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Unsupported image source: {0}")]
    UnsupportedSource(String),

    #[error("Settings file error: {0}")]
    Settings(#[from] std::io::Error),
}

/// The raster was produced but could not be handed over.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Clipboard write failed: {0}")]
    Clipboard(String),

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Failed to write file: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, MemeError>;

impl MemeError {
    pub fn validation(message: impl Into<String>) -> Self {
        MemeError::Validation(message.into())
    }

    pub fn image_load(origin: impl Into<String>, reason: impl ToString) -> Self {
        MemeError::ImageLoad {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    /// Short message for the user-facing error channel. Validation messages
    /// are shown verbatim, everything else is prefixed with the action.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            MemeError::Validation(message) => message.clone(),
            other => format!("Failed to {}: {}", action, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = MemeError::validation("You need at least one text element");
        assert_eq!(err.user_message("remove text"), "You need at least one text element");
    }

    #[test]
    fn delivery_errors_keep_their_kind() {
        let err: MemeError = DeliveryError::Clipboard("denied".into()).into();
        assert!(matches!(err, MemeError::Delivery(DeliveryError::Clipboard(_))));
        assert_eq!(err.user_message("copy"), "Failed to copy: Clipboard write failed: denied");
    }

    #[test]
    fn server_message_is_surfaced_as_is() {
        let err: MemeError = DeliveryError::Server {
            status: 401,
            message: "Not authorized".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Not authorized");
    }
}
