//! Keyframe data model.

use serde::{Deserialize, Serialize};

use crate::easing::Easing;

/// How a keyframe follows an external target instead of its authored value.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Homing {
    /// Lock onto the target position the first time the keyframe is consulted.
    Static,
    /// Keep following the target, closing the gap at `speed` (per second, exponential).
    Dynamic { speed: f32 },
}

/// A single keyframe at an absolute sequence time.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
    /// Curve used for the segment that ends at this keyframe.
    #[serde(default)]
    pub ease: Easing,
    #[serde(default)]
    pub homing: Option<Homing>,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self {
            time,
            value,
            ease: Easing::Linear,
            homing: None,
        }
    }

    pub fn with_ease(mut self, ease: Easing) -> Self {
        self.ease = ease;
        self
    }

    pub fn with_homing(mut self, homing: Homing) -> Self {
        self.homing = Some(homing);
        self
    }
}
