//! Deduplicating allocators for temporary render targets.
//!
//! Slots are never freed during a compile: objects are drawn one after the
//! other, so two objects asking for the same key can share the buffer.

use serde::Serialize;

/// Screen scales closer than this are the same slot.
pub const SCALE_EPSILON: f32 = 0.01;

/// Generation 0 and 1 of a key are the ping-pong pair.
pub const PING: u32 = 0;
pub const PONG: u32 = 1;

/// Generation of an effect's `index`-th declared FBO.
pub fn fbo_generation(index: usize) -> u32 {
    2 + index as u32
}

/// Buffer with a fixed pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalBufferKey {
    pub width: u32,
    pub height: u32,
    pub generation: u32,
}

/// Buffer sized relative to the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenBufferKey {
    pub scale_x: f32,
    pub scale_y: f32,
    pub generation: u32,
}

impl ScreenBufferKey {
    fn matches(&self, other: &ScreenBufferKey) -> bool {
        self.generation == other.generation
            && (self.scale_x - other.scale_x).abs() < SCALE_EPSILON
            && (self.scale_y - other.scale_y).abs() < SCALE_EPSILON
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferPools {
    pub local: Vec<LocalBufferKey>,
    pub screen: Vec<ScreenBufferKey>,
}

impl BufferPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the local slot for `key`, allocating it on first use.
    pub fn local_slot(&mut self, key: LocalBufferKey) -> usize {
        if let Some(index) = self.local.iter().position(|k| *k == key) {
            return index;
        }
        self.local.push(key);
        self.local.len() - 1
    }

    /// Index of the screen slot for `key`, allocating it on first use.
    pub fn screen_slot(&mut self, key: ScreenBufferKey) -> usize {
        if let Some(index) = self.screen.iter().position(|k| k.matches(&key)) {
            return index;
        }
        self.screen.push(key);
        self.screen.len() - 1
    }
}

/// Pixel size of an object-local FBO declared with `scale` (a divisor).
pub fn scaled_local_size(base: [u32; 2], scale: f32) -> [u32; 2] {
    let divide = |v: u32| {
        if scale <= 0.0 {
            return v.max(1);
        }
        ((v as f32 / scale).round() as u32).max(1)
    };
    [divide(base[0]), divide(base[1])]
}

/// Screen scale factor of an FBO declared with `scale` (a divisor).
pub fn screen_scale(scale: f32) -> f32 {
    if scale <= 0.0 { 1.0 } else { 1.0 / scale }
}
