use hashbrown::HashMap;

use crate::data::Room;
use crate::ids::{InstanceId, ObjectId};
use crate::spawner::ObjectSpawner;

use super::{Activator, RuntimeEnv, RuntimeObject, TimedObject};

/// A prefab instance scheduled as one object with its own spawner over its clones.
///
/// The runner is live from its earliest child start to its latest child kill; inside that window
/// the nested spawner decides which clones run. Nothing here is shared with the level spawner.
#[derive(Debug)]
pub struct PrefabInstanceRunner {
    pub instance: InstanceId,
    pub start_time: f32,
    pub kill_time: f32,
    pub room: Room,
    pub active: bool,
    spawner: ObjectSpawner<ObjectId>,
    /// Clone ids in expansion order.
    order: Vec<ObjectId>,
    children: HashMap<ObjectId, RuntimeObject>,
}

impl PrefabInstanceRunner {
    /// `children` must be in expansion order; clones with equal start times spawn in that order.
    pub fn new(instance: InstanceId, children: Vec<(ObjectId, RuntimeObject)>) -> Self {
        let start_time = children
            .iter()
            .map(|(_, child)| child.start_time())
            .fold(f32::INFINITY, f32::min);
        let kill_time = children
            .iter()
            .map(|(_, child)| child.kill_time())
            .fold(f32::NEG_INFINITY, f32::max);
        let spawner = ObjectSpawner::new(
            children
                .iter()
                .map(|(id, child)| child.spawn_entry(id.clone())),
        );
        let order = children.iter().map(|(id, _)| id.clone()).collect();
        Self {
            instance,
            start_time,
            kill_time,
            room: Room::SHARED,
            active: false,
            spawner,
            order,
            children: children.into_iter().collect(),
        }
    }

    pub fn children(&self) -> impl Iterator<Item = (&ObjectId, &RuntimeObject)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.children.get_key_value(id))
    }

    pub fn is_child_active(&self, id: &ObjectId) -> bool {
        self.spawner.is_active(id)
    }

    pub fn active_children(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.spawner.active()
    }

    /// Skip clones outside `room` and despawn any of them that are live.
    pub fn set_room(&mut self, room: Room, env: &mut RuntimeEnv<'_>) {
        for (id, child) in &self.children {
            self.spawner
                .set_skipped(id.clone(), !child.room().visible_in(room));
        }
        let mut activator = Activator {
            objects: &mut self.children,
            env,
            events: None,
        };
        self.spawner.recalculate_object_states(&mut activator);
    }
}

impl TimedObject for PrefabInstanceRunner {
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
        if !active {
            // rewind so every live clone is despawned and the next activation starts clean
            let mut activator = Activator {
                objects: &mut self.children,
                env: &mut *env,
                events: None,
            };
            self.spawner.update(f32::NEG_INFINITY, &mut activator);
        }
    }

    fn interpolate(&mut self, time: f32, env: &mut RuntimeEnv<'_>) {
        let mut activator = Activator {
            objects: &mut self.children,
            env: &mut *env,
            events: None,
        };
        self.spawner.update(time, &mut activator);
        for id in self.spawner.active() {
            if let Some(child) = self.children.get_mut(id) {
                child.interpolate(time, env);
            }
        }
    }

    fn clear(&mut self, env: &mut RuntimeEnv<'_>) {
        for child in self.children.values_mut() {
            child.clear(env);
        }
        self.children.clear();
        self.order.clear();
        self.spawner.clear();
        self.active = false;
    }
}
