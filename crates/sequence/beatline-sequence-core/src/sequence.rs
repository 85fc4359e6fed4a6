//! Keyframe sequence evaluation.
//!
//! Model:
//! - Keyframes are kept sorted by time (stable, so equal times keep authored order).
//! - Before the first keyframe the first value holds; at or after the last, the last value holds.
//! - Inside a segment [Ki -> K(i+1)] the local time is eased by K(i+1).ease, then lerped.
//! - Homing keyframes replace their authored value with a target-derived one; the memory for
//!   that lives in [`EvaluatorState`], never in the sequence.

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::error::{Result, SequenceError};
use crate::interp::Animatable;
use crate::keyframe::{Homing, Keyframe};
use crate::state::{EvaluatorState, HomingTarget};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence<T> {
    keyframes: Vec<Keyframe<T>>,
}

impl<T: Animatable> Sequence<T> {
    /// Build a sequence, sorting keyframes by time.
    pub fn new(mut keyframes: Vec<Keyframe<T>>) -> Self {
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keyframes }
    }

    /// Build and validate in one go.
    pub fn try_new(keyframes: Vec<Keyframe<T>>) -> Result<Self> {
        let seq = Self::new(keyframes);
        seq.validate()?;
        Ok(seq)
    }

    /// Single linear keyframe at time zero: what a channel without authored animation plays.
    pub fn constant(value: T) -> Self {
        Self {
            keyframes: vec![Keyframe::new(0.0, value)],
        }
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Time of the last keyframe, or 0 for an empty sequence.
    pub fn last_time(&self) -> f32 {
        self.keyframes.last().map(|k| k.time).unwrap_or(0.0)
    }

    pub fn has_homing(&self) -> bool {
        self.keyframes.iter().any(|k| k.homing.is_some())
    }

    /// Reject non-finite data and ill-formed easing/homing parameters.
    pub fn validate(&self) -> Result<()> {
        for (index, k) in self.keyframes.iter().enumerate() {
            if !k.time.is_finite() {
                return Err(SequenceError::NonFiniteTime {
                    index,
                    time: k.time,
                });
            }
            if !k.value.is_finite() {
                return Err(SequenceError::NonFiniteValue { index });
            }
            if let Easing::Bezier { x1, x2, .. } = k.ease {
                if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
                    return Err(SequenceError::InvalidBezier { index, x1, x2 });
                }
            }
            if let Some(Homing::Dynamic { speed }) = k.homing {
                if !speed.is_finite() || speed <= 0.0 {
                    return Err(SequenceError::InvalidHomingSpeed { index, speed });
                }
            }
        }
        Ok(())
    }

    /// Find the bracketing keyframes for `time`: (left, right, local_t).
    /// Clamped ends return the same index twice.
    fn find_segment(&self, time: f32) -> (usize, usize, f32) {
        let n = self.keyframes.len();
        let right = self.keyframes.partition_point(|k| k.time <= time);
        if right == 0 {
            return (0, 0, 0.0);
        }
        if right >= n {
            return (n - 1, n - 1, 0.0);
        }
        let left = right - 1;
        let t0 = self.keyframes[left].time;
        let t1 = self.keyframes[right].time;
        let denom = (t1 - t0).max(f32::EPSILON);
        (left, right, ((time - t0) / denom).clamp(0.0, 1.0))
    }

    /// Pure evaluation from authored values only; homing keyframes use their authored value.
    pub fn evaluate(&self, time: f32) -> T {
        if self.keyframes.is_empty() {
            return T::default();
        }
        let (i0, i1, lt) = self.find_segment(time);
        let left = self.keyframes[i0].value;
        if i0 == i1 {
            return left;
        }
        let right = &self.keyframes[i1];
        T::lerp(left, right.value, right.ease.apply(lt))
    }

    /// Full evaluation, resolving homing keyframes against `target` through `state`.
    pub fn interpolate(
        &self,
        time: f32,
        state: &mut EvaluatorState,
        target: &dyn HomingTarget,
    ) -> T {
        if self.keyframes.is_empty() {
            return T::default();
        }
        let (i0, i1, lt) = self.find_segment(time);
        let left = self.resolve(i0, time, state, target);
        if i0 == i1 {
            return left;
        }
        let right = self.resolve(i1, time, state, target);
        T::lerp(left, right, self.keyframes[i1].ease.apply(lt))
    }

    fn resolve(
        &self,
        index: usize,
        time: f32,
        state: &mut EvaluatorState,
        target: &dyn HomingTarget,
    ) -> T {
        let k = &self.keyframes[index];
        let goal = match k.homing {
            None => return k.value,
            Some(Homing::Static) => state.static_target(index, target.homing_position()),
            Some(Homing::Dynamic { speed }) => {
                state.dynamic_target(index, target.homing_position(), time, speed)
            }
        };
        goal.and_then(|g| T::from_homing(g, k.value))
            .unwrap_or(k.value)
    }
}
