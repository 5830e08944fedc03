/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use log::debug;

use crate::coords::{ContainerRect, PointerPoint};
use crate::store::LayerStore;
use crate::Position;

/// Host hook for the document-level move/up listeners.
///
/// The controller attaches exactly when a drag starts and detaches exactly
/// when it ends or the controller is dropped.
pub trait PointerCapture {
    fn attach(&mut self);
    fn detach(&mut self);
}

/// For headless use where pointer events are fed in directly.
impl PointerCapture for () {
    fn attach(&mut self) {}
    fn detach(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        layer: usize,
        /// Pointer position minus layer position at grab time, in percent.
        grab_offset: Position,
    },
}

pub struct DragController<C: PointerCapture> {
    state: DragState,
    capture: C,
}

impl<C: PointerCapture> DragController<C> {
    pub fn new(capture: C) -> Self {
        Self {
            state: DragState::Idle,
            capture,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Grabs `layer_index` and makes it the active layer.
    pub fn on_pointer_down(
        &mut self,
        pointer: PointerPoint,
        layer_index: usize,
        bounds: ContainerRect,
        store: &mut LayerStore,
    ) {
        let Some(layer_position) = store.get(layer_index).map(|layer| layer.position) else {
            debug_assert!(false, "pointer down on missing layer {layer_index}");
            return;
        };
        store.set_active(layer_index);

        let Some(pointer_percent) = bounds.pointer_percent(pointer) else {
            debug!("Ignoring pointer down on a container without area");
            return;
        };

        let grab_offset = Position {
            x: pointer_percent.x - layer_position.x,
            y: pointer_percent.y - layer_position.y,
        };

        let was_dragging = self.is_dragging();
        self.state = DragState::Dragging {
            layer: layer_index,
            grab_offset,
        };
        if !was_dragging {
            self.capture.attach();
        }
    }

    /// Moves the grabbed layer under the pointer. Returns whether a layer moved.
    pub fn on_pointer_move(
        &mut self,
        pointer: PointerPoint,
        bounds: ContainerRect,
        store: &mut LayerStore,
    ) -> bool {
        let DragState::Dragging { layer, grab_offset } = self.state else {
            return false;
        };
        if layer >= store.len() {
            self.on_pointer_up();
            return false;
        }
        let Some(pointer_percent) = bounds.pointer_percent(pointer) else {
            return false;
        };

        store.move_layer(
            layer,
            Position {
                x: pointer_percent.x - grab_offset.x,
                y: pointer_percent.y - grab_offset.y,
            },
        );
        true
    }

    pub fn on_pointer_up(&mut self) {
        if self.is_dragging() {
            self.capture.detach();
        }
        self.state = DragState::Idle;
    }
}

impl<C: PointerCapture> Drop for DragController<C> {
    fn drop(&mut self) {
        if self.is_dragging() {
            self.capture.detach();
        }
    }
}
