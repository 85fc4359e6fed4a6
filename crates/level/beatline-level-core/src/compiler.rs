//! Object compiler: authored objects -> runtime objects.
//!
//! Builds validated sequences (cached per object), parent chains with their own scene nodes, and
//! the runtime variant for every kind of authored entity. Failures are per object: the batch
//! entry point logs and skips, it never aborts.

use std::sync::Arc;

use beatline_sequence::{Keyframe, Rgba, Sequence, Vec2};
use hashbrown::{HashMap, HashSet};

use crate::config::LevelConfig;
use crate::context::LevelRegistry;
use crate::data::{BeatmapObject, RotationKey};
use crate::error::{LevelError, Result};
use crate::ids::{InstanceId, ObjectId};
use crate::parent_chain::{ParentChain, ParentLink};
use crate::runtime::{
    BackgroundRunner, ModifierRunner, PrefabInstanceRunner, RuntimeObject, VisualObject,
};
use crate::scene::SceneGraph;

/// Validated sequences of one object.
#[derive(Clone, Debug)]
pub struct CompiledSequences {
    pub position: Arc<Sequence<Vec2>>,
    pub scale: Arc<Sequence<Vec2>>,
    pub rotation: Arc<Sequence<f32>>,
    pub color: Arc<Sequence<Rgba>>,
}

/// Borrowed pieces of the level context the compiler needs.
pub struct CompileEnv<'a> {
    pub registry: &'a LevelRegistry,
    pub config: &'a LevelConfig,
    pub scene: &'a mut SceneGraph,
}

impl CompileEnv<'_> {
    fn level_length(&self) -> Option<f32> {
        self.registry.length().or(self.config.level_length)
    }
}

fn channel<T: beatline_sequence::Animatable>(
    object: &ObjectId,
    name: &'static str,
    keys: Vec<Keyframe<T>>,
    default: T,
) -> Result<Arc<Sequence<T>>> {
    if keys.is_empty() {
        return Ok(Arc::new(Sequence::constant(default)));
    }
    Sequence::try_new(keys)
        .map(Arc::new)
        .map_err(|source| LevelError::InvalidSequence {
            object: object.clone(),
            channel: name,
            source,
        })
}

/// Resolve `relative` rotation keys into absolute angles, in time order.
pub fn absolute_rotation(keys: &[RotationKey]) -> Vec<Keyframe<f32>> {
    let mut sorted: Vec<&RotationKey> = keys.iter().collect();
    sorted.sort_by(|a, b| a.key.time.total_cmp(&b.key.time));
    let mut previous = 0.0;
    sorted
        .into_iter()
        .map(|k| {
            let value = if k.relative {
                previous + k.key.value
            } else {
                k.key.value
            };
            previous = value;
            Keyframe { value, ..k.key }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct ObjectCompiler {
    cache: HashMap<ObjectId, CompiledSequences>,
}

impl ObjectCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached sequences of `id`, e.g. after its keyframes were edited.
    pub fn invalidate(&mut self, id: &ObjectId) {
        self.cache.remove(id);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn sequences(&mut self, obj: &BeatmapObject) -> Result<CompiledSequences> {
        if let Some(cached) = self.cache.get(&obj.id) {
            return Ok(cached.clone());
        }
        let events = &obj.events;
        let compiled = CompiledSequences {
            position: channel(&obj.id, "position", events.position.clone(), [0.0, 0.0])?,
            scale: channel(&obj.id, "scale", events.scale.clone(), [1.0, 1.0])?,
            rotation: channel(&obj.id, "rotation", absolute_rotation(&events.rotation), 0.0)?,
            color: channel(&obj.id, "color", events.color.clone(), [1.0, 1.0, 1.0, 1.0])?,
        };
        self.cache.insert(obj.id.clone(), compiled.clone());
        Ok(compiled)
    }

    /// Chain from `id` out to its outermost ancestor, with fresh scene nodes.
    ///
    /// A missing ancestor ends the chain early (logged). Cycles and chains longer than
    /// `max_chain_depth` fail without creating any nodes.
    pub fn build_parent_chain(
        &mut self,
        id: &ObjectId,
        env: &mut CompileEnv<'_>,
    ) -> Result<ParentChain> {
        let registry = env.registry;
        let mut current = registry
            .object(id)
            .ok_or_else(|| LevelError::ObjectNotFound { id: id.clone() })?;
        let mut visited: HashSet<&ObjectId> = HashSet::new();
        let mut hops: Vec<(&BeatmapObject, CompiledSequences)> = Vec::new();

        loop {
            if !visited.insert(&current.id) {
                return Err(LevelError::ParentCycle {
                    object: id.clone(),
                    repeated: current.id.clone(),
                });
            }
            if hops.len() >= env.config.max_chain_depth {
                return Err(LevelError::ChainTooDeep {
                    object: id.clone(),
                    limit: env.config.max_chain_depth,
                });
            }
            hops.push((current, self.sequences(current)?));

            let Some(parent_id) = current.parent.as_ref() else {
                break;
            };
            match registry.object(parent_id) {
                Some(parent) => current = parent,
                None => {
                    log::warn!(
                        "{id}: parent {parent_id} not found, chain ends at {}",
                        current.id
                    );
                    break;
                }
            }
        }

        // outermost first so each node can be parented under the one above it
        let mut links: Vec<ParentLink> = Vec::with_capacity(hops.len());
        let mut above = None;
        for (obj, seqs) in hops.into_iter().rev() {
            let node = env.scene.create(obj.id.to_string(), above);
            let mut link = ParentLink::new(obj.id.clone(), node, &obj.parent_settings);
            link.position = seqs.position;
            link.scale = seqs.scale;
            link.rotation = seqs.rotation;
            link.time_offset = obj.start_time;
            link.detached = obj.prefab.as_ref().is_some_and(|p| p.detached);
            links.push(link);
            above = Some(node);
        }
        links.reverse();

        let own = registry.object(id);
        if let Some(first) = links.first_mut() {
            first.depth_z = own.map_or(0, |o| o.depth) as f32 * env.config.depth_z_scale;
        }
        let mut chain = ParentChain::new(links);
        // detached prefab clones freeze their parents at the instance start
        if let Some(origin) = own.and_then(|o| o.prefab.as_ref()) {
            if origin.detached {
                chain.prefab_time_correction =
                    origin.instance_start - own.map_or(0.0, |o| o.start_time);
            }
        }
        Ok(chain)
    }

    pub fn compile_object(
        &mut self,
        id: &ObjectId,
        env: &mut CompileEnv<'_>,
    ) -> Result<VisualObject> {
        let chain = self.build_parent_chain(id, env)?;
        let registry = env.registry;
        let obj = registry
            .object(id)
            .ok_or_else(|| LevelError::ObjectNotFound { id: id.clone() })?;
        let seqs = self.sequences(obj)?;

        let visual = match (obj.object_type.has_visual(), chain.root_node()) {
            (true, Some(root)) => {
                let node = env.scene.create(format!("{}/visual", obj.id), Some(root));
                if let Some(n) = env.scene.get_mut(node) {
                    n.local.position = [obj.origin[0], obj.origin[1], 0.0];
                }
                Some(node)
            }
            _ => None,
        };

        Ok(VisualObject {
            id: obj.id.clone(),
            start_time: obj.start_time,
            kill_time: obj.kill_time(env.level_length()),
            room: obj.room,
            object_type: obj.object_type,
            chain,
            visual,
            color: seqs.color,
            color_state: Default::default(),
            active: false,
            visible: true,
        })
    }

    /// Runner over every clone expanded from `instance`, in registry order.
    ///
    /// Expansion inserts clones as it produces them, so registry order is expansion order.
    pub fn compile_prefab_runner(
        &mut self,
        instance: &InstanceId,
        env: &mut CompileEnv<'_>,
    ) -> Result<PrefabInstanceRunner> {
        if env.registry.instance(instance).is_none() {
            return Err(LevelError::InstanceNotFound {
                id: instance.clone(),
            });
        }
        let ids: Vec<ObjectId> = env
            .registry
            .objects_of_instance(instance)
            .map(|o| o.id.clone())
            .collect();
        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            match self.compile_object(&id, env) {
                Ok(obj) => children.push((id, RuntimeObject::Visual(obj))),
                Err(err) => log::error!(
                    "prefab {instance}: skipping {id} ({}): {err}",
                    err.category()
                ),
            }
        }
        Ok(PrefabInstanceRunner::new(instance.clone(), children))
    }

    /// Compile everything in the registry, skipping (and logging) objects that fail.
    ///
    /// Clones of instances listed in `nested` are compiled into one runner per instance instead
    /// of standing alone.
    pub fn compile_level(
        &mut self,
        env: &mut CompileEnv<'_>,
        nested: &HashSet<InstanceId>,
    ) -> Vec<(ObjectId, RuntimeObject)> {
        let registry = env.registry;
        let level_length = env.level_length();
        let mut out = Vec::new();

        for obj in registry.objects() {
            if obj.prefab.as_ref().is_some_and(|p| nested.contains(&p.instance)) {
                continue;
            }
            match self.compile_object(&obj.id, env) {
                Ok(visual) => out.push((obj.id.clone(), RuntimeObject::Visual(visual))),
                Err(err) => log::error!("skipping object {} ({}): {err}", obj.id, err.category()),
            }
        }
        for instance in registry.instances().filter(|i| nested.contains(&i.id)) {
            match self.compile_prefab_runner(&instance.id, env) {
                Ok(runner) => out.push((
                    ObjectId::prefab_runner(&instance.id),
                    RuntimeObject::PrefabInstance(runner),
                )),
                Err(err) => log::error!("skipping prefab instance {}: {err}", instance.id),
            }
        }
        for bg in registry.backgrounds() {
            let runner = BackgroundRunner::new(bg, level_length, env.scene);
            out.push((bg.id.clone(), RuntimeObject::Background(runner)));
        }
        for block in registry.modifier_blocks() {
            out.push((
                block.id.clone(),
                RuntimeObject::Modifier(ModifierRunner::new(block, level_length)),
            ));
        }
        out
    }
}
