//! Runtime memory for homing keyframes.
//!
//! A [`Sequence`](crate::Sequence) stays immutable and shareable; anything that changes while it
//! plays lives here, one `EvaluatorState` per evaluating object. Calling [`EvaluatorState::reset`]
//! returns the sequence to its freshly-spawned behavior.

use crate::interp::lerp_vec2;
use crate::Vec2;

/// Source of the position homing keyframes chase (usually the player).
pub trait HomingTarget {
    fn homing_position(&self) -> Option<Vec2>;
}

impl HomingTarget for Vec2 {
    fn homing_position(&self) -> Option<Vec2> {
        Some(*self)
    }
}

impl HomingTarget for Option<Vec2> {
    fn homing_position(&self) -> Option<Vec2> {
        *self
    }
}

impl HomingTarget for () {
    fn homing_position(&self) -> Option<Vec2> {
        None
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Slot {
    Locked(Vec2),
    Following { position: Vec2, last_time: f32 },
}

#[derive(Clone, Debug, Default)]
pub struct EvaluatorState {
    slots: Vec<Option<Slot>>,
}

impl EvaluatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every locked or followed target.
    pub fn reset(&mut self) {
        self.slots.clear();
    }

    pub fn is_clear(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn slot_mut(&mut self, index: usize) -> &mut Option<Slot> {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        &mut self.slots[index]
    }

    /// Target for a static homing keyframe: the first observed target, held until reset.
    pub(crate) fn static_target(&mut self, index: usize, target: Option<Vec2>) -> Option<Vec2> {
        let slot = self.slot_mut(index);
        match *slot {
            Some(Slot::Locked(position)) => Some(position),
            _ => {
                let position = target?;
                *slot = Some(Slot::Locked(position));
                Some(position)
            }
        }
    }

    /// Target for a dynamic homing keyframe, smoothed toward the live target.
    ///
    /// Time running backward does not move the follower; it only rebases `last_time`.
    pub(crate) fn dynamic_target(
        &mut self,
        index: usize,
        target: Option<Vec2>,
        time: f32,
        speed: f32,
    ) -> Option<Vec2> {
        let slot = self.slot_mut(index);
        match (*slot, target) {
            (Some(Slot::Following { position, last_time }), Some(goal)) => {
                let dt = (time - last_time).max(0.0);
                let alpha = 1.0 - (-speed * dt).exp();
                let next = lerp_vec2(position, goal, alpha);
                *slot = Some(Slot::Following {
                    position: next,
                    last_time: time,
                });
                Some(next)
            }
            (Some(Slot::Following { position, .. }), None) => Some(position),
            (_, Some(goal)) => {
                *slot = Some(Slot::Following {
                    position: goal,
                    last_time: time,
                });
                Some(goal)
            }
            (_, None) => None,
        }
    }
}
