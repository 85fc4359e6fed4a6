//! Runtime objects driven by the spawner.
//!
//! The variant set is closed, so [`RuntimeObject`] is an enum and every timed-object call is a
//! `match`. All variants share the same contract: a `[start, kill)` lifespan, a room, and the
//! `set_active` / `interpolate` / `clear` lifecycle.

mod background;
mod modifier;
mod prefab_runner;
mod visual;

pub use background::BackgroundRunner;
pub use modifier::{ModifierHost, ModifierRunner};
pub use prefab_runner::PrefabInstanceRunner;
pub use visual::VisualObject;

use beatline_sequence::Vec2;
use hashbrown::HashMap;

use crate::config::LevelConfig;
use crate::data::Room;
use crate::ids::ObjectId;
use crate::outputs::LevelEvent;
use crate::parent_chain::ReactiveOffsets;
use crate::scene::SceneGraph;
use crate::spawner::{SpawnEntry, SpawnObserver};

/// Everything a runtime object may touch while it runs.
pub struct RuntimeEnv<'a> {
    pub scene: &'a mut SceneGraph,
    pub modifiers: &'a mut dyn ModifierHost,
    pub homing_target: Option<Vec2>,
    pub config: &'a LevelConfig,
}

/// Contract shared by everything the spawner schedules.
pub trait TimedObject {
    fn start_time(&self) -> f32;
    fn kill_time(&self) -> f32;
    fn room(&self) -> Room;
    fn set_active(&mut self, active: bool, env: &mut RuntimeEnv<'_>);
    fn interpolate(&mut self, time: f32, env: &mut RuntimeEnv<'_>);
    /// Release scene nodes and external bindings.
    fn clear(&mut self, env: &mut RuntimeEnv<'_>);
}

#[derive(Debug)]
pub enum RuntimeObject {
    Visual(VisualObject),
    Background(BackgroundRunner),
    Modifier(ModifierRunner),
    PrefabInstance(PrefabInstanceRunner),
}

impl RuntimeObject {
    pub fn spawn_entry(&self, key: ObjectId) -> SpawnEntry<ObjectId> {
        SpawnEntry::new(key, self.start_time(), self.kill_time())
    }

    pub fn is_active(&self) -> bool {
        match self {
            RuntimeObject::Visual(o) => o.active,
            RuntimeObject::Background(o) => o.active,
            RuntimeObject::Modifier(o) => o.active,
            RuntimeObject::PrefabInstance(o) => o.active,
        }
    }

    /// Apply reactive offsets where the variant supports them.
    pub fn set_reactive(&mut self, offsets: ReactiveOffsets) {
        match self {
            RuntimeObject::Visual(o) => o.set_reactive(offsets),
            RuntimeObject::Background(o) => o.reactive_scale = offsets.scale,
            RuntimeObject::Modifier(_) | RuntimeObject::PrefabInstance(_) => {}
        }
    }
}

impl TimedObject for RuntimeObject {
    fn start_time(&self) -> f32 {
        match self {
            RuntimeObject::Visual(o) => o.start_time,
            RuntimeObject::Background(o) => o.start_time,
            RuntimeObject::Modifier(o) => o.start_time,
            RuntimeObject::PrefabInstance(o) => o.start_time,
        }
    }

    fn kill_time(&self) -> f32 {
        match self {
            RuntimeObject::Visual(o) => o.kill_time,
            RuntimeObject::Background(o) => o.kill_time,
            RuntimeObject::Modifier(o) => o.kill_time,
            RuntimeObject::PrefabInstance(o) => o.kill_time,
        }
    }

    fn room(&self) -> Room {
        match self {
            RuntimeObject::Visual(o) => o.room,
            RuntimeObject::Background(o) => o.room,
            RuntimeObject::Modifier(o) => o.room,
            RuntimeObject::PrefabInstance(o) => o.room,
        }
    }

    fn set_active(&mut self, active: bool, env: &mut RuntimeEnv<'_>) {
        match self {
            RuntimeObject::Visual(o) => o.set_active(active, env),
            RuntimeObject::Background(o) => o.set_active(active, env),
            RuntimeObject::Modifier(o) => o.set_active(active, env),
            RuntimeObject::PrefabInstance(o) => o.set_active(active, env),
        }
    }

    fn interpolate(&mut self, time: f32, env: &mut RuntimeEnv<'_>) {
        match self {
            RuntimeObject::Visual(o) => o.interpolate(time, env),
            RuntimeObject::Background(o) => o.interpolate(time, env),
            RuntimeObject::Modifier(o) => o.interpolate(time, env),
            RuntimeObject::PrefabInstance(o) => o.interpolate(time, env),
        }
    }

    fn clear(&mut self, env: &mut RuntimeEnv<'_>) {
        match self {
            RuntimeObject::Visual(o) => o.clear(env),
            RuntimeObject::Background(o) => o.clear(env),
            RuntimeObject::Modifier(o) => o.clear(env),
            RuntimeObject::PrefabInstance(o) => o.clear(env),
        }
    }
}

/// Spawn observer that toggles runtime objects and optionally records events.
pub(crate) struct Activator<'a, 'e> {
    pub objects: &'a mut HashMap<ObjectId, RuntimeObject>,
    pub env: &'a mut RuntimeEnv<'e>,
    pub events: Option<&'a mut Vec<LevelEvent>>,
}

impl SpawnObserver<ObjectId> for Activator<'_, '_> {
    fn on_spawn(&mut self, key: &ObjectId) {
        if let Some(obj) = self.objects.get_mut(key) {
            obj.set_active(true, self.env);
            log::debug!("spawned {key}");
            if let Some(events) = self.events.as_deref_mut() {
                events.push(LevelEvent::Spawned { id: key.clone() });
            }
        }
    }

    fn on_despawn(&mut self, key: &ObjectId) {
        if let Some(obj) = self.objects.get_mut(key) {
            obj.set_active(false, self.env);
            log::debug!("despawned {key}");
            if let Some(events) = self.events.as_deref_mut() {
                events.push(LevelEvent::Despawned { id: key.clone() });
            }
        }
    }
}
