use crate::data::{ModifierBlock, Room};
use crate::ids::ObjectId;

use super::{RuntimeEnv, TimedObject};

/// External trigger/action evaluator. The runtime only tells it when a block is live and ticks it.
pub trait ModifierHost {
    fn set_active(&mut self, block: &ObjectId, target: Option<&ObjectId>, active: bool);
    fn tick(&mut self, block: &ObjectId, target: Option<&ObjectId>, time: f32);
}

impl ModifierHost for () {
    fn set_active(&mut self, _block: &ObjectId, _target: Option<&ObjectId>, _active: bool) {}
    fn tick(&mut self, _block: &ObjectId, _target: Option<&ObjectId>, _time: f32) {}
}

#[derive(Debug)]
pub struct ModifierRunner {
    pub id: ObjectId,
    pub target: Option<ObjectId>,
    pub start_time: f32,
    pub kill_time: f32,
    pub room: Room,
    pub active: bool,
}

impl ModifierRunner {
    pub fn new(block: &ModifierBlock, level_length: Option<f32>) -> Self {
        Self {
            id: block.id.clone(),
            target: block.target.clone(),
            start_time: block.start_time,
            kill_time: block
                .kill_time
                .or(level_length)
                .unwrap_or(f32::INFINITY),
            room: block.room,
            active: false,
        }
    }
}

impl TimedObject for ModifierRunner {
    fn start_time(&self) -> f32 {
        self.start_time
    }

    fn kill_time(&self) -> f32 {
        self.kill_time
    }

    fn room(&self) -> Room {
        self.room
    }

    fn set_active(&mut self, active: bool, env: &mut RuntimeEnv<'_>) {
        self.active = active;
        env.modifiers
            .set_active(&self.id, self.target.as_ref(), active);
    }

    fn interpolate(&mut self, time: f32, env: &mut RuntimeEnv<'_>) {
        env.modifiers.tick(&self.id, self.target.as_ref(), time);
    }

    fn clear(&mut self, env: &mut RuntimeEnv<'_>) {
        if self.active {
            env.modifiers.set_active(&self.id, self.target.as_ref(), false);
            self.active = false;
        }
    }
}
