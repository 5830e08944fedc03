/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Temporary `blob:` references to in-memory image data.
//!
//! An [`ObjectUrl`] is released when it is dropped, so every path that owns
//! one (decode success, decode failure, teardown) releases it exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};

#[derive(Default)]
struct Registry {
    next: u64,
    live: HashMap<String, Arc<[u8]>>,
}

#[derive(Clone, Default)]
pub struct ObjectUrls {
    registry: Arc<Mutex<Registry>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, data: Arc<[u8]>) -> ObjectUrl {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next += 1;
        let url = format!("blob:quip/{}", registry.next);
        registry.live.insert(url.clone(), data);
        debug!("Created object reference {}", url);

        ObjectUrl {
            url,
            registry: self.clone(),
        }
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.live.get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner).live.len()
    }

    fn revoke(&self, url: &str) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if registry.live.remove(url).is_some() {
            debug!("Released object reference {}", url);
        } else {
            warn!("Object reference {} was already released", url);
        }
    }
}

/// A live reference created by [`ObjectUrls::create`].
pub struct ObjectUrl {
    url: String,
    registry: ObjectUrls,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn data(&self) -> Option<Arc<[u8]>> {
        self.registry.resolve(&self.url)
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

impl std::fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.url).finish()
    }
}
