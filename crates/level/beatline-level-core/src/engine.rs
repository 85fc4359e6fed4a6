//! Level engine: owns the context, the spawner and the runtime objects, and drives them per tick.
//!
//! Methods:
//! - `load_level`, `clear`
//! - `update` (spawner, then `interpolate` on every active object)
//! - editing: `insert_object`, `update_object`, `remove_object`, `expand_prefab_instance`,
//!   `remove_prefab_instance`, `set_room`, `set_homing_target`, `set_reactive_offsets`,
//!   `recalculate`
//!
//! `update` is not reentrant.

use beatline_sequence::Vec2;
use hashbrown::{HashMap, HashSet};

use crate::compiler::{CompileEnv, ObjectCompiler};
use crate::config::{LevelConfig, PrefabSpawnMode};
use crate::context::{LevelContext, LevelRegistry};
use crate::data::{BeatmapObject, LevelData, PrefabInstance, Room};
use crate::error::{LevelError, Result};
use crate::ids::{IdSeeder, InstanceId, ObjectId};
use crate::outputs::TickOutputs;
use crate::parent_chain::ReactiveOffsets;
use crate::prefab::{ExpansionReport, PrefabExpander};
use crate::runtime::{
    Activator, ModifierHost, PrefabInstanceRunner, RuntimeEnv, RuntimeObject, TimedObject,
};
use crate::scene::SceneGraph;
use crate::spawner::ObjectSpawner;

fn runtime_env<'a>(
    ctx: &'a mut LevelContext,
    modifiers: &'a mut dyn ModifierHost,
) -> RuntimeEnv<'a> {
    RuntimeEnv {
        scene: &mut ctx.scene,
        modifiers,
        homing_target: ctx.homing_target,
        config: &ctx.config,
    }
}

pub struct LevelEngine {
    ctx: LevelContext,
    compiler: ObjectCompiler,
    spawner: ObjectSpawner<ObjectId>,
    objects: HashMap<ObjectId, RuntimeObject>,
    /// Instances running as one nested runner instead of flattened clones.
    nested: HashSet<InstanceId>,
    reactive: HashMap<ObjectId, ReactiveOffsets>,
    modifiers: Box<dyn ModifierHost>,
    outputs: TickOutputs,
}

impl Default for LevelEngine {
    fn default() -> Self {
        Self::new(LevelConfig::default())
    }
}

impl LevelEngine {
    pub fn new(config: LevelConfig) -> Self {
        Self {
            ctx: LevelContext::new(config),
            compiler: ObjectCompiler::new(),
            spawner: ObjectSpawner::default(),
            objects: HashMap::new(),
            nested: HashSet::new(),
            reactive: HashMap::new(),
            modifiers: Box::new(()),
            outputs: TickOutputs::default(),
        }
    }

    /// Route modifier blocks to an external evaluator.
    pub fn with_modifier_host(mut self, host: Box<dyn ModifierHost>) -> Self {
        self.modifiers = host;
        self
    }

    pub fn context(&self) -> &LevelContext {
        &self.ctx
    }

    pub fn config(&self) -> &LevelConfig {
        &self.ctx.config
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.ctx.scene
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.ctx.registry
    }

    pub fn seeder(&self) -> &IdSeeder {
        &self.ctx.seeder
    }

    pub fn outputs(&self) -> &TickOutputs {
        &self.outputs
    }

    pub fn current_time(&self) -> f32 {
        self.spawner.current_time()
    }

    pub fn object(&self, id: &ObjectId) -> Option<&RuntimeObject> {
        self.objects.get(id)
    }

    /// Nested runner of `instance`, when it runs in [`PrefabSpawnMode::Nested`].
    pub fn prefab_runner(&self, instance: &InstanceId) -> Option<&PrefabInstanceRunner> {
        match self.objects.get(&ObjectId::prefab_runner(instance)) {
            Some(RuntimeObject::PrefabInstance(runner)) => Some(runner),
            _ => None,
        }
    }

    pub fn is_active(&self, id: &ObjectId) -> bool {
        self.spawner.is_active(id)
    }

    /// Active runtime keys in activation order.
    pub fn active_ids(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.spawner.active()
    }

    /// Replace whatever is loaded with `level` and expand its prefab instances.
    ///
    /// Objects already carrying provenance from one of the level's instances are dropped; the
    /// expansion regenerates them under the same ids.
    pub fn load_level(&mut self, level: LevelData) {
        self.clear();
        let mut registry = LevelRegistry::from_level(level);
        let reserved: Vec<ObjectId> = registry
            .objects()
            .filter(|o| o.id.is_reserved())
            .map(|o| o.id.clone())
            .collect();
        for id in &reserved {
            log::error!("dropping object {id}: {}", LevelError::ReservedId { id: id.clone() });
            registry.remove_object(id);
        }
        let stale: Vec<ObjectId> = registry
            .objects()
            .filter(|o| {
                o.prefab
                    .as_ref()
                    .is_some_and(|p| registry.instance(&p.instance).is_some())
            })
            .map(|o| o.id.clone())
            .collect();
        for id in &stale {
            registry.remove_object(id);
        }
        self.ctx.registry = registry;

        let instances: Vec<InstanceId> = self
            .ctx
            .registry
            .instances()
            .map(|i| i.id.clone())
            .collect();
        for id in &instances {
            if let Some(report) = self.expand_data(id) {
                if self.ctx.config.prefab_spawn_mode == PrefabSpawnMode::Nested
                    && !report.removed_dangling
                {
                    self.nested.insert(id.clone());
                }
            }
        }

        let compiled = {
            let LevelContext {
                registry,
                config,
                scene,
                ..
            } = &mut self.ctx;
            let mut env = CompileEnv {
                registry,
                config,
                scene,
            };
            self.compiler.compile_level(&mut env, &self.nested)
        };
        for (id, runtime) in compiled {
            self.register(id, runtime);
        }
        self.recalculate();
        log::debug!(
            "loaded level: {} runtime objects, {} prefab instances",
            self.objects.len(),
            instances.len()
        );
    }

    /// Advance (or rewind) to `time` and interpolate everything active.
    pub fn update(&mut self, time: f32) -> &TickOutputs {
        self.outputs.clear();
        self.outputs.time = time;
        let LevelEngine {
            ctx,
            spawner,
            objects,
            modifiers,
            outputs,
            ..
        } = self;
        let mut env = runtime_env(ctx, &mut **modifiers);
        {
            let mut activator = Activator {
                objects: &mut *objects,
                env: &mut env,
                events: Some(&mut outputs.events),
            };
            spawner.update(time, &mut activator);
        }
        for id in spawner.active() {
            if let Some(obj) = objects.get_mut(id) {
                obj.interpolate(time, &mut env);
            }
        }
        outputs.active_count = spawner.active_len();
        &self.outputs
    }

    /// Replay the spawner at the current time, toggling only objects whose state changed.
    pub fn recalculate(&mut self) {
        let LevelEngine {
            ctx,
            spawner,
            objects,
            modifiers,
            ..
        } = self;
        let mut env = runtime_env(ctx, &mut **modifiers);
        let mut activator = Activator {
            objects,
            env: &mut env,
            events: None,
        };
        spawner.recalculate_object_states(&mut activator);
    }

    /// Add a new object, or update it if the id already exists.
    pub fn insert_object(&mut self, obj: BeatmapObject) -> Result<()> {
        if obj.id.is_reserved() {
            return Err(LevelError::ReservedId { id: obj.id });
        }
        if self.ctx.registry.contains_object(&obj.id) {
            return self.update_object(obj);
        }
        let id = obj.id.clone();
        self.ctx.registry.insert_object(obj);
        if let Err(err) = self.rebuild(&[id.clone()]) {
            self.ctx.registry.remove_object(&id);
            return Err(err);
        }
        self.recalculate();
        Ok(())
    }

    /// Replace an object's data and rebuild it together with everything parented under it.
    pub fn update_object(&mut self, obj: BeatmapObject) -> Result<()> {
        if obj.id.is_reserved() {
            return Err(LevelError::ReservedId { id: obj.id });
        }
        let id = obj.id.clone();
        if self.ctx.registry.insert_object(obj).is_none() {
            log::debug!("update_object: {id} was new");
        }
        self.compiler.invalidate(&id);
        let affected = self.ctx.registry.with_descendants(&id);
        let result = self.rebuild(&affected);
        self.recalculate();
        result
    }

    /// Remove an object. Its descendants are rebuilt with shortened chains.
    pub fn remove_object(&mut self, id: &ObjectId) -> Result<BeatmapObject> {
        if !self.ctx.registry.contains_object(id) {
            return Err(LevelError::ObjectNotFound { id: id.clone() });
        }
        let descendants: Vec<ObjectId> = self
            .ctx
            .registry
            .with_descendants(id)
            .into_iter()
            .skip(1)
            .collect();
        self.unregister(id);
        self.compiler.invalidate(id);
        self.reactive.remove(id);
        let removed = self
            .ctx
            .registry
            .remove_object(id)
            .ok_or_else(|| LevelError::ObjectNotFound { id: id.clone() })?;
        if let Err(err) = self.rebuild(&descendants) {
            log::warn!("rebuilding children of {id}: {err}");
        }
        self.recalculate();
        Ok(removed)
    }

    /// Place a prefab instance and expand it into the level.
    ///
    /// A missing template drops the instance again and reports it as dangling.
    pub fn expand_prefab_instance(&mut self, instance: PrefabInstance) -> Result<ExpansionReport> {
        let id = instance.id.clone();
        if self.ctx.registry.instance(&id).is_some() {
            self.remove_prefab_instance(&id)?;
        }
        self.ctx.registry.insert_instance(instance);
        let Some(report) = self.expand_data(&id) else {
            return Err(LevelError::InstanceNotFound { id });
        };
        if report.removed_dangling {
            return Ok(report);
        }

        if self.ctx.config.prefab_spawn_mode == PrefabSpawnMode::Nested {
            self.nested.insert(id.clone());
            let runner = {
                let LevelContext {
                    registry,
                    config,
                    scene,
                    ..
                } = &mut self.ctx;
                let mut env = CompileEnv {
                    registry,
                    config,
                    scene,
                };
                self.compiler.compile_prefab_runner(&id, &mut env)?
            };
            self.register(
                ObjectId::prefab_runner(&id),
                RuntimeObject::PrefabInstance(runner),
            );
        } else {
            let ids: Vec<ObjectId> = report.object_ids().cloned().collect();
            self.rebuild(&ids)?;
        }
        self.recalculate();
        Ok(report)
    }

    /// Despawn and delete every object expanded from `instance`, then the instance itself.
    pub fn remove_prefab_instance(&mut self, instance: &InstanceId) -> Result<PrefabInstance> {
        if self.ctx.registry.instance(instance).is_none() {
            return Err(LevelError::InstanceNotFound {
                id: instance.clone(),
            });
        }
        let clones: Vec<ObjectId> = self
            .ctx
            .registry
            .objects_of_instance(instance)
            .map(|o| o.id.clone())
            .collect();
        let clone_set: HashSet<&ObjectId> = clones.iter().collect();
        let mut outside: Vec<ObjectId> = Vec::new();
        for id in &clones {
            for dependent in self.ctx.registry.with_descendants(id).into_iter().skip(1) {
                if !clone_set.contains(&dependent) && !outside.contains(&dependent) {
                    outside.push(dependent);
                }
            }
        }

        if self.nested.remove(instance) {
            self.unregister(&ObjectId::prefab_runner(instance));
        } else {
            for id in &clones {
                self.unregister(id);
            }
        }
        for id in &clones {
            self.compiler.invalidate(id);
            self.ctx.registry.remove_object(id);
        }
        let removed = self
            .ctx
            .registry
            .remove_instance(instance)
            .ok_or_else(|| LevelError::InstanceNotFound {
                id: instance.clone(),
            })?;
        if let Err(err) = self.rebuild(&outside) {
            log::warn!("rebuilding dependents of prefab instance {instance}: {err}");
        }
        self.recalculate();
        log::debug!("removed prefab instance {instance} ({} objects)", clones.len());
        Ok(removed)
    }

    /// Switch the visible room; objects outside it are despawned and skipped.
    ///
    /// Nested prefab runners apply the same filter to their own clones.
    pub fn set_room(&mut self, room: Room) {
        self.ctx.room = room;
        {
            let LevelEngine {
                ctx,
                spawner,
                objects,
                modifiers,
                ..
            } = self;
            let mut env = runtime_env(ctx, &mut **modifiers);
            for (id, obj) in objects.iter_mut() {
                spawner.set_skipped(id.clone(), !obj.room().visible_in(room));
                if let RuntimeObject::PrefabInstance(runner) = obj {
                    runner.set_room(room, &mut env);
                }
            }
        }
        self.recalculate();
    }

    pub fn set_homing_target(&mut self, target: Option<Vec2>) {
        self.ctx.homing_target = target;
    }

    pub fn set_reactive_offsets(
        &mut self,
        id: &ObjectId,
        offsets: ReactiveOffsets,
    ) -> Result<()> {
        let obj = self
            .objects
            .get_mut(id)
            .ok_or_else(|| LevelError::ObjectNotFound { id: id.clone() })?;
        obj.set_reactive(offsets);
        self.reactive.insert(id.clone(), offsets);
        Ok(())
    }

    /// Drop every runtime object, the authored data and the scene.
    pub fn clear(&mut self) {
        {
            let LevelEngine {
                ctx,
                objects,
                modifiers,
                ..
            } = self;
            let mut env = runtime_env(ctx, &mut **modifiers);
            for obj in objects.values_mut() {
                obj.clear(&mut env);
            }
        }
        self.objects.clear();
        self.spawner.clear();
        self.nested.clear();
        self.reactive.clear();
        self.compiler.clear();
        self.outputs.clear();
        self.ctx.scene.clear();
        self.ctx.registry = LevelRegistry::default();
    }

    /// Expand a registered instance into registry data only.
    ///
    /// Returns `None` when the instance is unknown. A vanished template removes the instance.
    fn expand_data(&mut self, id: &InstanceId) -> Option<ExpansionReport> {
        let instance = self.ctx.registry.instance(id)?.clone();
        let ctx = &self.ctx;
        let expander = PrefabExpander::new(&ctx.registry, &ctx.seeder, &ctx.config);
        let expansion = match expander.expand(&instance) {
            Ok(expansion) => expansion,
            Err(err) => {
                log::warn!("{err}; removing dangling instance");
                self.ctx.registry.remove_instance(id);
                return Some(ExpansionReport::dangling(id.clone()));
            }
        };
        for obj in expansion.objects {
            self.ctx.registry.insert_object(obj);
        }
        Some(ExpansionReport {
            instance: expansion.instance,
            pairs: expansion.pairs,
            errors: expansion.errors,
            removed_dangling: false,
        })
    }

    /// Recompile `ids` from registry data and (re)register them. No recalculation.
    ///
    /// Clones of nested instances rebuild their runner instead. The first failure is returned
    /// after every id has been attempted.
    fn rebuild(&mut self, ids: &[ObjectId]) -> Result<()> {
        let mut first_err = None;
        let mut runners: Vec<InstanceId> = Vec::new();
        for id in ids {
            let nested_in = self
                .ctx
                .registry
                .object(id)
                .and_then(|o| o.prefab.as_ref())
                .map(|p| p.instance.clone())
                .filter(|i| self.nested.contains(i));
            if let Some(instance) = nested_in {
                if !runners.contains(&instance) {
                    runners.push(instance);
                }
                continue;
            }

            self.unregister(id);
            let compiled = {
                let LevelContext {
                    registry,
                    config,
                    scene,
                    ..
                } = &mut self.ctx;
                let mut env = CompileEnv {
                    registry,
                    config,
                    scene,
                };
                self.compiler.compile_object(id, &mut env)
            };
            match compiled {
                Ok(visual) => self.register(id.clone(), RuntimeObject::Visual(visual)),
                Err(err) => {
                    log::error!("skipping object {id} ({}): {err}", err.category());
                    first_err.get_or_insert(err);
                }
            }
        }

        for instance in runners {
            self.unregister(&ObjectId::prefab_runner(&instance));
            let compiled = {
                let LevelContext {
                    registry,
                    config,
                    scene,
                    ..
                } = &mut self.ctx;
                let mut env = CompileEnv {
                    registry,
                    config,
                    scene,
                };
                self.compiler.compile_prefab_runner(&instance, &mut env)
            };
            match compiled {
                Ok(runner) => self.register(
                    ObjectId::prefab_runner(&instance),
                    RuntimeObject::PrefabInstance(runner),
                ),
                Err(err) => {
                    log::error!("skipping prefab instance {instance}: {err}");
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn register(&mut self, id: ObjectId, mut runtime: RuntimeObject) {
        if let Some(offsets) = self.reactive.get(&id) {
            runtime.set_reactive(*offsets);
        }
        if let RuntimeObject::PrefabInstance(runner) = &mut runtime {
            let room = self.ctx.room;
            let mut env = runtime_env(&mut self.ctx, &mut *self.modifiers);
            runner.set_room(room, &mut env);
        }
        let hidden = !runtime.room().visible_in(self.ctx.room);
        self.spawner
            .insert_object(runtime.spawn_entry(id.clone()), false, &mut ());
        self.spawner.set_skipped(id.clone(), hidden);
        self.objects.insert(id, runtime);
    }

    /// Despawn (if needed) and release a runtime object. No recalculation.
    fn unregister(&mut self, id: &ObjectId) -> bool {
        let LevelEngine {
            ctx,
            spawner,
            objects,
            modifiers,
            ..
        } = self;
        let mut env = runtime_env(ctx, &mut **modifiers);
        {
            let mut activator = Activator {
                objects: &mut *objects,
                env: &mut env,
                events: None,
            };
            spawner.remove_object(id, false, &mut activator);
        }
        match objects.remove(id) {
            Some(mut obj) => {
                obj.clear(&mut env);
                true
            }
            None => false,
        }
    }
}
