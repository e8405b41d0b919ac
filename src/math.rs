//! Math types for posmix

pub use glam::Vec2;

use std::sync::atomic::{AtomicU64, Ordering};

/// A `Vec2` that can be replaced and read from any thread without a lock.
///
/// Both components are packed into one `u64`, so a reader always sees a pair that was
/// written together.
#[derive(Debug, Default)]
pub struct AtomicVec2(AtomicU64);

impl AtomicVec2 {
    pub fn new(value: Vec2) -> Self {
        Self(AtomicU64::new(pack(value)))
    }

    pub fn load(&self) -> Vec2 {
        unpack(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: Vec2) {
        self.0.store(pack(value), Ordering::Release);
    }
}

fn pack(value: Vec2) -> u64 {
    ((value.x.to_bits() as u64) << 32) | value.y.to_bits() as u64
}

fn unpack(bits: u64) -> Vec2 {
    Vec2::new(f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
}
