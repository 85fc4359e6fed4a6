//! Beatline sequence core (engine-agnostic)
//!
//! Keyframe-interpolated channels used by the level runtime: a [`Sequence`] maps a time offset to
//! a position, scale, rotation or color. Evaluation is a pure function of time except for homing
//! keyframes, whose runtime memory lives in an [`EvaluatorState`] carried next to the sequence.

pub mod easing;
pub mod error;
pub mod interp;
pub mod keyframe;
pub mod sequence;
pub mod state;

pub use easing::Easing;
pub use error::{Result, SequenceError};
pub use interp::Animatable;
pub use keyframe::{Homing, Keyframe};
pub use sequence::Sequence;
pub use state::{EvaluatorState, HomingTarget};

/// Position channel value (x, y).
pub type Vec2 = [f32; 2];

/// RGBA color in the 0..1 range.
pub type Rgba = [f32; 4];
