//! Output contracts from the level engine.
//!
//! Transforms are written straight into the scene arena; outputs only carry the discrete
//! activation changes of the last tick so hosts can react (sounds, editor highlights).

use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LevelEvent {
    Spawned { id: ObjectId },
    Despawned { id: ObjectId },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TickOutputs {
    /// Level time of the tick.
    pub time: f32,
    pub events: Vec<LevelEvent>,
    /// Objects interpolated this tick.
    pub active_count: usize,
}

impl TickOutputs {
    pub fn clear(&mut self) {
        self.events.clear();
        self.active_count = 0;
    }

    pub fn spawned(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.events.iter().filter_map(|e| match e {
            LevelEvent::Spawned { id } => Some(id),
            _ => None,
        })
    }

    pub fn despawned(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.events.iter().filter_map(|e| match e {
            LevelEvent::Despawned { id } => Some(id),
            _ => None,
        })
    }
}
