//! Interpolation helpers:
//! - component-wise lerp for scalars, 2D vectors and RGBA colors
//! - the [`Animatable`] trait that lets a [`Sequence`](crate::Sequence) carry any of them

use crate::{Rgba, Vec2};

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec2(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    [lerp_f32(a[0], b[0], t), lerp_f32(a[1], b[1], t)]
}

#[inline]
pub fn lerp_vec4(a: Rgba, b: Rgba, t: f32) -> Rgba {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ]
}

/// A value a sequence can interpolate.
///
/// `Default` is what an empty sequence evaluates to.
pub trait Animatable: Copy + Default + PartialEq + std::fmt::Debug {
    fn lerp(a: Self, b: Self, t: f32) -> Self;

    /// Component-wise sum, used for relative keyframes and reactive offsets.
    fn add(self, other: Self) -> Self;

    /// Uniform multiply, used for parallax.
    fn scale(self, factor: f32) -> Self;

    fn is_finite(&self) -> bool;

    /// What a homing keyframe resolves to for a target position.
    /// `None` means the value kind cannot home and the authored value is used.
    fn from_homing(target: Vec2, authored: Self) -> Option<Self> {
        let _ = (target, authored);
        None
    }
}

impl Animatable for f32 {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        lerp_f32(a, b, t)
    }

    #[inline]
    fn add(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn scale(self, factor: f32) -> Self {
        self * factor
    }

    fn is_finite(&self) -> bool {
        f32::is_finite(*self)
    }

    /// Rotation homing faces the target: the angle in degrees from the origin, offset by the
    /// authored value.
    fn from_homing(target: Vec2, authored: Self) -> Option<Self> {
        Some(target[1].atan2(target[0]).to_degrees() + authored)
    }
}

impl Animatable for Vec2 {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        lerp_vec2(a, b, t)
    }

    #[inline]
    fn add(self, other: Self) -> Self {
        [self[0] + other[0], self[1] + other[1]]
    }

    #[inline]
    fn scale(self, factor: f32) -> Self {
        [self[0] * factor, self[1] * factor]
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|c| c.is_finite())
    }

    /// Position homing moves onto the target, offset by the authored value.
    fn from_homing(target: Vec2, authored: Self) -> Option<Self> {
        Some([target[0] + authored[0], target[1] + authored[1]])
    }
}

impl Animatable for Rgba {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        lerp_vec4(a, b, t)
    }

    #[inline]
    fn add(self, other: Self) -> Self {
        [
            self[0] + other[0],
            self[1] + other[1],
            self[2] + other[2],
            self[3] + other[3],
        ]
    }

    #[inline]
    fn scale(self, factor: f32) -> Self {
        [
            self[0] * factor,
            self[1] * factor,
            self[2] * factor,
            self[3] * factor,
        ]
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|c| c.is_finite())
    }
}
