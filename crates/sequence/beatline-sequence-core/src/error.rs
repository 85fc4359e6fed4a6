//! Error types for sequence construction.

/// Result alias that carries [`SequenceError`].
pub type Result<T> = std::result::Result<T, SequenceError>;

/// Validation failures for authored keyframe data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SequenceError {
    /// A keyframe time is NaN or infinite.
    #[error("keyframe {index} has a non-finite time ({time})")]
    NonFiniteTime { index: usize, time: f32 },

    /// A keyframe value contains NaN or infinite components.
    #[error("keyframe {index} has a non-finite value")]
    NonFiniteValue { index: usize },

    /// Bezier easing control points must keep x inside [0, 1] so the curve stays monotonic.
    #[error("keyframe {index} uses a bezier easing with x control points outside [0,1] ({x1}, {x2})")]
    InvalidBezier { index: usize, x1: f32, x2: f32 },

    /// Dynamic homing needs a positive, finite follow speed.
    #[error("keyframe {index} has an invalid dynamic homing speed ({speed})")]
    InvalidHomingSpeed { index: usize, speed: f32 },
}
