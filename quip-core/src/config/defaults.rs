/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Default values for every settings key.

// ==========================================================================
// Canvas
// ==========================================================================

/// Editor area and export raster are fitted inside this box.
pub const DEFAULT_MAX_CANVAS_WIDTH: u32 = 500;
pub const DEFAULT_MAX_CANVAS_HEIGHT: u32 = 500;

// ==========================================================================
// Persistence
// ==========================================================================

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_SAVE_PATH: &str = "/api/memes/save";

// ==========================================================================
// Export
// ==========================================================================

pub const DEFAULT_DOWNLOAD_FILE_NAME: &str = "meme.png";

/// Delay before a download's object reference is released, in milliseconds.
pub const DEFAULT_RELEASE_DELAY_MS: u64 = 100;

// ==========================================================================
// Uploads
// ==========================================================================

/// 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
