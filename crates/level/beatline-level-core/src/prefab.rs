//! Prefab expansion: templates -> concrete, uniquely identified objects.
//!
//! Expansion is pure with respect to the level: the expander reads the registry and returns
//! clones; registering them is the engine's job. Each repetition is one step of
//! [`ExpansionSteps`] so a host may spread a large instance over several frames.
//!
//! Per repetition `i` of instance `inst` over template `tmpl`:
//! - every template object and sub-prefab placement gets an id derived from
//!   `(template id, instance id, i, seed)`;
//! - in-template parent references are rewritten through that map, and root objects take the
//!   instance's parent override when one is set;
//! - `start = inst.start + (tmpl.offset + obj.start) / inst.speed + i * interval`, keyframe times
//!   are divided by `inst.speed`;
//! - sub-prefabs expand first, recursively, with a guard against templates containing themselves.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::config::LevelConfig;
use crate::context::LevelRegistry;
use crate::data::{
    AutoKill, BeatmapObject, PrefabAutoKill, PrefabInstance, PrefabOrigin, PrefabTemplate,
};
use crate::error::{LevelError, Result};
use crate::ids::{IdSeeder, InstanceId, ObjectId, PrefabId};

/// A template object id and the id its clone received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPair {
    pub old: ObjectId,
    pub new: ObjectId,
}

/// Output of one repetition.
#[derive(Clone, Debug, Default)]
pub struct Repetition {
    pub index: u32,
    pub objects: Vec<BeatmapObject>,
    pub pairs: Vec<IdPair>,
    /// Per-object failures; the rest of the repetition still expanded.
    pub errors: Vec<LevelError>,
}

/// Everything produced by a complete expansion.
#[derive(Clone, Debug)]
pub struct Expansion {
    pub instance: InstanceId,
    pub objects: Vec<BeatmapObject>,
    pub pairs: Vec<IdPair>,
    pub errors: Vec<LevelError>,
}

/// What an expansion did to the live level.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpansionReport {
    pub instance: InstanceId,
    pub pairs: Vec<IdPair>,
    /// Objects that could not be placed.
    pub errors: Vec<LevelError>,
    /// The template was gone and the instance was dropped from the level.
    pub removed_dangling: bool,
}

impl ExpansionReport {
    pub fn dangling(instance: InstanceId) -> Self {
        Self {
            instance,
            pairs: Vec::new(),
            errors: Vec::new(),
            removed_dangling: true,
        }
    }

    /// Ids of the clones that were placed.
    pub fn object_ids(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.pairs.iter().map(|p| &p.new)
    }
}

impl Expansion {
    fn absorb(&mut self, rep: Repetition) {
        self.objects.extend(rep.objects);
        self.pairs.extend(rep.pairs);
        self.errors.extend(rep.errors);
    }
}

pub struct PrefabExpander<'a> {
    registry: &'a LevelRegistry,
    seeder: &'a IdSeeder,
    config: &'a LevelConfig,
}

impl<'a> PrefabExpander<'a> {
    pub fn new(
        registry: &'a LevelRegistry,
        seeder: &'a IdSeeder,
        config: &'a LevelConfig,
    ) -> Self {
        Self {
            registry,
            seeder,
            config,
        }
    }

    /// Lazily stepped expansion of `instance`. Fails if its template is gone.
    pub fn steps<'s>(&'s self, instance: &'s PrefabInstance) -> Result<ExpansionSteps<'s>> {
        let template = self
            .registry
            .prefab(&instance.prefab)
            .ok_or_else(|| LevelError::PrefabNotFound {
                prefab: instance.prefab.clone(),
                instance: instance.id.clone(),
            })?;
        Ok(ExpansionSteps {
            expander: PrefabExpander::new(self.registry, self.seeder, self.config),
            template,
            instance,
            next: 0,
            seen: HashSet::new(),
        })
    }

    /// Run every repetition of `instance` to completion.
    pub fn expand(&self, instance: &PrefabInstance) -> Result<Expansion> {
        let mut expansion = Expansion {
            instance: instance.id.clone(),
            objects: Vec::new(),
            pairs: Vec::new(),
            errors: Vec::new(),
        };
        for rep in self.steps(instance)? {
            expansion.absorb(rep);
        }
        log::debug!(
            "expanded prefab {} as {} ({} objects, {} skipped)",
            instance.prefab,
            instance.id,
            expansion.objects.len(),
            expansion.errors.len()
        );
        Ok(expansion)
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_into(
        &self,
        template: &PrefabTemplate,
        placement: &PrefabInstance,
        repetition: u32,
        root: &PrefabInstance,
        stack: &mut Vec<PrefabId>,
        seen: &mut HashSet<ObjectId>,
        out: &mut Repetition,
    ) {
        let speed = if placement.speed > 0.0 {
            placement.speed
        } else {
            1.0
        };
        let shift = placement.start_time + repetition as f32 * placement.repeat_interval();
        let place = |local: f32| shift + (template.offset + local) / speed;

        let ids: HashMap<&ObjectId, ObjectId> = template
            .objects
            .iter()
            .map(|o| (&o.id, self.seeder.object_id(&o.id, &placement.id, repetition)))
            .collect();

        for sub in &template.instances {
            let Some(sub_template) = self.registry.prefab(&sub.prefab) else {
                log::warn!(
                    "prefab {}: sub-prefab {} not found, skipping placement {}",
                    template.id,
                    sub.prefab,
                    sub.id
                );
                continue;
            };
            if stack.contains(&sub.prefab) || stack.len() >= self.config.max_prefab_depth {
                let err = LevelError::PrefabRecursion {
                    prefab: sub.prefab.clone(),
                    depth: stack.len(),
                };
                log::warn!("{err}");
                out.errors.push(err);
                continue;
            }
            let mut nested = sub.clone();
            nested.id = self.seeder.instance_id(&sub.id, &placement.id, repetition);
            nested.start_time = place(sub.start_time);
            nested.speed = sub.speed * speed;
            if let Some(parent) = nested.parent.as_mut() {
                if let Some(remapped) = ids.get(&parent.parent) {
                    parent.parent = remapped.clone();
                }
            }
            stack.push(sub.prefab.clone());
            for sub_rep in 0..=nested.repeat_count {
                self.expand_into(sub_template, &nested, sub_rep, root, stack, seen, out);
            }
            stack.pop();
        }

        let detached = [placement, root]
            .iter()
            .any(|p| p.parent.as_ref().is_some_and(|o| o.settings.desync));
        for obj in &template.objects {
            let Some(new_id) = ids.get(&obj.id).cloned() else {
                continue;
            };
            if self.registry.contains_object(&new_id) || !seen.insert(new_id.clone()) {
                let err = LevelError::IdCollision { id: new_id };
                log::error!("prefab {} ({}): {err}", root.id, obj.id);
                out.errors.push(err);
                continue;
            }

            let mut clone = obj.clone();
            clone.id = new_id.clone();
            clone.start_time = place(obj.start_time);
            if speed != 1.0 {
                clone.events.scale_times(1.0 / speed);
                clone.autokill = match clone.autokill {
                    AutoKill::LastKeyframeOffset { offset } => AutoKill::LastKeyframeOffset {
                        offset: offset / speed,
                    },
                    AutoKill::FixedTime { offset } => AutoKill::FixedTime {
                        offset: offset / speed,
                    },
                    other => other,
                };
            }
            match obj.parent.as_ref() {
                Some(parent) => {
                    let remapped = ids.get(parent).cloned();
                    clone.parent = Some(remapped.unwrap_or_else(|| parent.clone()));
                }
                None => {
                    if let Some(over) = placement.parent.as_ref() {
                        clone.parent = Some(over.parent.clone());
                        clone.parent_settings = over.settings.clone();
                    }
                }
            }
            clone.prefab = Some(PrefabOrigin {
                prefab: root.prefab.clone(),
                instance: root.id.clone(),
                template_object: obj.id.clone(),
                instance_start: root.start_time,
                detached,
            });
            out.pairs.push(IdPair {
                old: obj.id.clone(),
                new: new_id,
            });
            out.objects.push(clone);
        }
    }
}

/// Resumable expansion, one repetition per step.
pub struct ExpansionSteps<'a> {
    expander: PrefabExpander<'a>,
    template: &'a PrefabTemplate,
    instance: &'a PrefabInstance,
    next: u32,
    seen: HashSet<ObjectId>,
}

impl ExpansionSteps<'_> {
    /// Repetitions still to run.
    pub fn remaining(&self) -> u32 {
        (self.instance.repeat_count + 1).saturating_sub(self.next)
    }
}

impl Iterator for ExpansionSteps<'_> {
    type Item = Repetition;

    fn next(&mut self) -> Option<Repetition> {
        if self.next > self.instance.repeat_count {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let mut rep = Repetition {
            index,
            ..Repetition::default()
        };
        let mut stack = vec![self.template.id.clone()];
        self.expander.expand_into(
            self.template,
            self.instance,
            index,
            self.instance,
            &mut stack,
            &mut self.seen,
            &mut rep,
        );

        let kill_at = match self.instance.autokill {
            PrefabAutoKill::Regular => None,
            PrefabAutoKill::StartTimeOffset { offset } => {
                Some(self.instance.start_time + self.template.offset + offset)
            }
            PrefabAutoKill::SongTime { time } => Some(time),
        };
        if let Some(time) = kill_at {
            for obj in &mut rep.objects {
                obj.autokill = AutoKill::SongTime { time };
            }
        }
        Some(rep)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining() as usize;
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LevelData, ParentOverride, ParentSettings};
    use beatline_sequence::Keyframe;

    fn template(id: &str, objects: Vec<BeatmapObject>) -> PrefabTemplate {
        PrefabTemplate {
            id: PrefabId::from(id),
            name: String::new(),
            offset: 0.0,
            objects,
            instances: Vec::new(),
        }
    }

    fn registry(prefabs: Vec<PrefabTemplate>) -> LevelRegistry {
        LevelRegistry::from_level(LevelData {
            prefabs,
            ..LevelData::default()
        })
    }

    #[test]
    fn repetitions_are_spaced_by_interval() {
        let reg = registry(vec![template("p", vec![BeatmapObject::new("t", 0.0)])]);
        let seeder = IdSeeder::new(1);
        let config = LevelConfig::default();
        let mut inst = PrefabInstance::new("i", "p", 0.0);
        inst.repeat_count = 2;
        inst.repeat_offset_time = Some(1.0);

        let out = PrefabExpander::new(&reg, &seeder, &config).expand(&inst).unwrap();
        let starts: Vec<f32> = out.objects.iter().map(|o| o.start_time).collect();
        assert_eq!(starts, vec![0.0, 1.0, 2.0]);
        let ids: HashSet<&ObjectId> = out.objects.iter().map(|o| &o.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn same_seed_same_ids() {
        let reg = registry(vec![template(
            "p",
            vec![BeatmapObject::new("a", 0.0), BeatmapObject::new("b", 0.5)],
        )]);
        let config = LevelConfig::default();
        let mut inst = PrefabInstance::new("i", "p", 3.0);
        inst.repeat_count = 1;

        let first = PrefabExpander::new(&reg, &IdSeeder::new(9), &config)
            .expand(&inst)
            .unwrap();
        let again = PrefabExpander::new(&reg, &IdSeeder::new(9), &config)
            .expand(&inst)
            .unwrap();
        assert_eq!(first.pairs, again.pairs);

        let other_seed = PrefabExpander::new(&reg, &IdSeeder::new(10), &config)
            .expand(&inst)
            .unwrap();
        assert_ne!(first.pairs, other_seed.pairs);
    }

    #[test]
    fn internal_parents_remap_and_roots_take_the_override() {
        let mut child = BeatmapObject::new("child", 0.0);
        child.parent = Some(ObjectId::from("root"));
        let reg = registry(vec![template(
            "p",
            vec![BeatmapObject::new("root", 0.0), child],
        )]);
        let seeder = IdSeeder::default();
        let config = LevelConfig::default();
        let mut inst = PrefabInstance::new("i", "p", 0.0);
        let settings = ParentSettings {
            desync: true,
            ..ParentSettings::default()
        };
        inst.parent = Some(ParentOverride {
            parent: ObjectId::from("player_anchor"),
            settings: settings.clone(),
        });

        let out = PrefabExpander::new(&reg, &seeder, &config).expand(&inst).unwrap();
        let root = &out.objects[0];
        let child = &out.objects[1];
        assert_eq!(root.parent, Some(ObjectId::from("player_anchor")));
        assert_eq!(root.parent_settings, settings);
        assert_eq!(child.parent.as_ref(), Some(&root.id));
        assert_eq!(child.parent_settings, ParentSettings::default());
        assert!(child.prefab.as_ref().unwrap().detached);
    }

    #[test]
    fn autokill_policies() {
        let mut obj = BeatmapObject::new("t", 0.0);
        obj.autokill = AutoKill::FixedTime { offset: 2.0 };
        let mut tmpl = template("p", vec![obj]);
        tmpl.offset = 0.5;
        let reg = registry(vec![tmpl]);
        let seeder = IdSeeder::default();
        let config = LevelConfig::default();
        let expander = PrefabExpander::new(&reg, &seeder, &config);

        let mut inst = PrefabInstance::new("i", "p", 4.0);
        let regular = expander.expand(&inst).unwrap();
        assert_eq!(regular.objects[0].autokill, AutoKill::FixedTime { offset: 2.0 });
        assert_eq!(regular.objects[0].start_time, 4.5);

        inst.autokill = PrefabAutoKill::StartTimeOffset { offset: 1.0 };
        let relative = expander.expand(&inst).unwrap();
        assert_eq!(relative.objects[0].autokill, AutoKill::SongTime { time: 5.5 });

        inst.autokill = PrefabAutoKill::SongTime { time: 20.0 };
        let absolute = expander.expand(&inst).unwrap();
        assert_eq!(absolute.objects[0].autokill, AutoKill::SongTime { time: 20.0 });
    }

    #[test]
    fn speed_compresses_time() {
        let mut obj = BeatmapObject::new("t", 2.0);
        obj.events.position = vec![
            Keyframe::new(0.0, [0.0, 0.0]),
            Keyframe::new(4.0, [1.0, 0.0]),
        ];
        let reg = registry(vec![template("p", vec![obj])]);
        let seeder = IdSeeder::default();
        let config = LevelConfig::default();
        let mut inst = PrefabInstance::new("i", "p", 10.0);
        inst.speed = 2.0;
        let out = PrefabExpander::new(&reg, &seeder, &config).expand(&inst).unwrap();
        let clone = &out.objects[0];
        assert_eq!(clone.start_time, 11.0);
        assert_eq!(clone.events.position[1].time, 2.0);
        assert_eq!(clone.kill_time(None), 13.0);
    }

    #[test]
    fn nested_prefabs_expand_first_with_their_own_ids() {
        let inner = template("inner", vec![BeatmapObject::new("leaf", 0.0)]);
        let mut outer = template("outer", vec![BeatmapObject::new("own", 0.0)]);
        let mut placement = PrefabInstance::new("sub", "inner", 1.0);
        placement.repeat_count = 1;
        outer.instances.push(placement);
        let reg = registry(vec![inner, outer]);
        let seeder = IdSeeder::default();
        let config = LevelConfig::default();
        let mut inst = PrefabInstance::new("i", "outer", 10.0);
        inst.repeat_count = 1;

        let out = PrefabExpander::new(&reg, &seeder, &config).expand(&inst).unwrap();
        // per outer repetition: two leaf clones, then the template's own object
        let olds: Vec<&str> = out.pairs.iter().map(|p| p.old.as_str()).collect();
        assert_eq!(olds, vec!["leaf", "leaf", "own", "leaf", "leaf", "own"]);
        let starts: Vec<f32> = out.objects.iter().map(|o| o.start_time).collect();
        assert_eq!(starts, vec![11.0, 12.0, 10.0, 12.0, 13.0, 11.0]);
        let unique: HashSet<&ObjectId> = out.objects.iter().map(|o| &o.id).collect();
        assert_eq!(unique.len(), 6);
        assert!(out
            .objects
            .iter()
            .all(|o| o.prefab.as_ref().unwrap().instance == InstanceId::from("i")));
    }

    #[test]
    fn self_containing_template_is_cut_off() {
        let mut looping = template("loop", vec![BeatmapObject::new("x", 0.0)]);
        looping
            .instances
            .push(PrefabInstance::new("again", "loop", 0.0));
        let reg = registry(vec![looping]);
        let seeder = IdSeeder::default();
        let config = LevelConfig::default();
        let inst = PrefabInstance::new("i", "loop", 0.0);

        let out = PrefabExpander::new(&reg, &seeder, &config).expand(&inst).unwrap();
        assert_eq!(out.objects.len(), 1);
        assert!(matches!(
            out.errors.as_slice(),
            [LevelError::PrefabRecursion { .. }]
        ));
    }

    #[test]
    fn missing_template_is_an_error() {
        let reg = registry(vec![]);
        let seeder = IdSeeder::default();
        let config = LevelConfig::default();
        let inst = PrefabInstance::new("i", "gone", 0.0);
        assert!(matches!(
            PrefabExpander::new(&reg, &seeder, &config).expand(&inst),
            Err(LevelError::PrefabNotFound { .. })
        ));
    }

    #[test]
    fn steps_run_one_repetition_at_a_time() {
        let reg = registry(vec![template("p", vec![BeatmapObject::new("t", 0.0)])]);
        let seeder = IdSeeder::default();
        let config = LevelConfig::default();
        let mut inst = PrefabInstance::new("i", "p", 0.0);
        inst.repeat_count = 3;
        let expander = PrefabExpander::new(&reg, &seeder, &config);
        let mut steps = expander.steps(&inst).unwrap();
        assert_eq!(steps.remaining(), 4);
        let first = steps.next().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.objects.len(), 1);
        assert_eq!(steps.remaining(), 3);
        assert_eq!(steps.count(), 3);
    }
}
