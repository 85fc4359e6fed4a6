//! Explicit level context: everything the runtime pieces share for one loaded level.

use beatline_sequence::Vec2;
use hashbrown::HashSet;
use indexmap::IndexMap;

use crate::config::LevelConfig;
use crate::data::{
    BackgroundObject, BeatmapObject, LevelData, ModifierBlock, PrefabInstance, PrefabTemplate,
    Room,
};
use crate::ids::{IdSeeder, InstanceId, ObjectId, PrefabId};
use crate::scene::SceneGraph;

/// Authored data of the loaded level, keyed by id in authored order.
#[derive(Clone, Debug, Default)]
pub struct LevelRegistry {
    objects: IndexMap<ObjectId, BeatmapObject>,
    backgrounds: IndexMap<ObjectId, BackgroundObject>,
    prefabs: IndexMap<PrefabId, PrefabTemplate>,
    instances: IndexMap<InstanceId, PrefabInstance>,
    modifier_blocks: IndexMap<ObjectId, ModifierBlock>,
    length: Option<f32>,
}

impl LevelRegistry {
    /// Index a level. Later duplicates of an id replace earlier ones.
    pub fn from_level(level: LevelData) -> Self {
        let mut registry = Self {
            length: level.length,
            ..Self::default()
        };
        for obj in level.objects {
            if registry.objects.insert(obj.id.clone(), obj).is_some() {
                log::warn!("duplicate object id in level data");
            }
        }
        registry.backgrounds = level
            .backgrounds
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();
        registry.prefabs = level.prefabs.into_iter().map(|p| (p.id.clone(), p)).collect();
        registry.instances = level
            .prefab_instances
            .into_iter()
            .map(|i| (i.id.clone(), i))
            .collect();
        registry.modifier_blocks = level
            .modifier_blocks
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        registry
    }

    /// Snapshot back into the authored shape.
    pub fn to_level_data(&self) -> LevelData {
        LevelData {
            objects: self.objects.values().cloned().collect(),
            backgrounds: self.backgrounds.values().cloned().collect(),
            prefabs: self.prefabs.values().cloned().collect(),
            prefab_instances: self.instances.values().cloned().collect(),
            modifier_blocks: self.modifier_blocks.values().cloned().collect(),
            length: self.length,
        }
    }

    pub fn length(&self) -> Option<f32> {
        self.length
    }

    pub fn object(&self, id: &ObjectId) -> Option<&BeatmapObject> {
        self.objects.get(id)
    }

    pub fn contains_object(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &BeatmapObject> + '_ {
        self.objects.values()
    }

    /// Insert or replace; returns the previous version.
    pub fn insert_object(&mut self, obj: BeatmapObject) -> Option<BeatmapObject> {
        self.objects.insert(obj.id.clone(), obj)
    }

    pub fn remove_object(&mut self, id: &ObjectId) -> Option<BeatmapObject> {
        self.objects.shift_remove(id)
    }

    pub fn background(&self, id: &ObjectId) -> Option<&BackgroundObject> {
        self.backgrounds.get(id)
    }

    pub fn backgrounds(&self) -> impl Iterator<Item = &BackgroundObject> + '_ {
        self.backgrounds.values()
    }

    pub fn modifier_blocks(&self) -> impl Iterator<Item = &ModifierBlock> + '_ {
        self.modifier_blocks.values()
    }

    pub fn prefab(&self, id: &PrefabId) -> Option<&PrefabTemplate> {
        self.prefabs.get(id)
    }

    pub fn insert_prefab(&mut self, template: PrefabTemplate) -> Option<PrefabTemplate> {
        self.prefabs.insert(template.id.clone(), template)
    }

    pub fn remove_prefab(&mut self, id: &PrefabId) -> Option<PrefabTemplate> {
        self.prefabs.shift_remove(id)
    }

    pub fn instance(&self, id: &InstanceId) -> Option<&PrefabInstance> {
        self.instances.get(id)
    }

    pub fn instances(&self) -> impl Iterator<Item = &PrefabInstance> + '_ {
        self.instances.values()
    }

    pub fn insert_instance(&mut self, instance: PrefabInstance) -> Option<PrefabInstance> {
        self.instances.insert(instance.id.clone(), instance)
    }

    pub fn remove_instance(&mut self, id: &InstanceId) -> Option<PrefabInstance> {
        self.instances.shift_remove(id)
    }

    /// Objects expanded from `instance`, in insertion order.
    pub fn objects_of_instance(
        &self,
        instance: &InstanceId,
    ) -> impl Iterator<Item = &BeatmapObject> + '_ {
        let instance = instance.clone();
        self.objects
            .values()
            .filter(move |o| o.prefab.as_ref().is_some_and(|p| p.instance == instance))
    }

    /// `id` and every object whose parent chain passes through it.
    pub fn with_descendants(&self, id: &ObjectId) -> Vec<ObjectId> {
        let mut found: Vec<ObjectId> = vec![id.clone()];
        let mut seen: HashSet<ObjectId> = HashSet::new();
        seen.insert(id.clone());
        let mut cursor = 0;
        while cursor < found.len() {
            let current = found[cursor].clone();
            cursor += 1;
            for obj in self.objects.values() {
                if obj.parent.as_ref() == Some(&current) && seen.insert(obj.id.clone()) {
                    found.push(obj.id.clone());
                }
            }
        }
        found
    }
}

/// Shared state for one level, passed explicitly instead of living in globals.
#[derive(Debug, Default)]
pub struct LevelContext {
    pub config: LevelConfig,
    pub scene: SceneGraph,
    pub registry: LevelRegistry,
    pub seeder: IdSeeder,
    pub homing_target: Option<Vec2>,
    pub room: Room,
}

impl LevelContext {
    pub fn new(config: LevelConfig) -> Self {
        let seeder = IdSeeder::new(config.seed);
        Self {
            config,
            scene: SceneGraph::new(),
            registry: LevelRegistry::default(),
            seeder,
            homing_target: None,
            room: Room::SHARED,
        }
    }

    /// Level length from the data, falling back to the config.
    pub fn level_length(&self) -> Option<f32> {
        self.registry.length().or(self.config.level_length)
    }
}
