//! Temporal spawner: incremental activation over half-open `[start, kill)` lifespans.
//!
//! Two copies of the entry list are kept, one sorted by start and one by kill, each with a
//! cursor marking how far the clock has consumed it. Moving forward advances the cursors,
//! moving backward rewinds them, so a tick costs only the transitions it crosses.
//!
//! After any `update`, the active set is exactly `{ e : e.start <= now < e.kill }` minus skipped
//! keys, whatever path the clock took to get there.

use std::hash::Hash;

use hashbrown::HashSet;
use indexmap::IndexSet;

/// Lifespan of one spawnable key.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnEntry<K> {
    pub key: K,
    pub start: f32,
    pub kill: f32,
}

impl<K> SpawnEntry<K> {
    pub fn new(key: K, start: f32, kill: f32) -> Self {
        Self { key, start, kill }
    }
}

/// Receives activation transitions as the spawner crosses them.
pub trait SpawnObserver<K> {
    fn on_spawn(&mut self, key: &K);
    fn on_despawn(&mut self, key: &K);
}

impl<K> SpawnObserver<K> for () {
    fn on_spawn(&mut self, _key: &K) {}
    fn on_despawn(&mut self, _key: &K) {}
}

/// One recorded activation change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition<K> {
    Spawned(K),
    Despawned(K),
}

impl<K: Clone> SpawnObserver<K> for Vec<Transition<K>> {
    fn on_spawn(&mut self, key: &K) {
        self.push(Transition::Spawned(key.clone()));
    }

    fn on_despawn(&mut self, key: &K) {
        self.push(Transition::Despawned(key.clone()));
    }
}

#[derive(Debug)]
pub struct ObjectSpawner<K> {
    by_start: Vec<SpawnEntry<K>>,
    by_kill: Vec<SpawnEntry<K>>,
    activate_index: usize,
    deactivate_index: usize,
    current_time: f32,
    active: IndexSet<K>,
    skipped: HashSet<K>,
}

impl<K: Clone + Eq + Hash> Default for ObjectSpawner<K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<K: Clone + Eq + Hash> ObjectSpawner<K> {
    /// Build from entries; nothing is active until the first `update`.
    pub fn new(entries: impl IntoIterator<Item = SpawnEntry<K>>) -> Self {
        let mut by_start: Vec<SpawnEntry<K>> = entries.into_iter().collect();
        let mut by_kill = by_start.clone();
        by_start.sort_by(|a, b| a.start.total_cmp(&b.start));
        by_kill.sort_by(|a, b| a.kill.total_cmp(&b.kill));
        Self {
            by_start,
            by_kill,
            activate_index: 0,
            deactivate_index: 0,
            current_time: f32::NEG_INFINITY,
            active: IndexSet::new(),
            skipped: HashSet::new(),
        }
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Active keys in activation order.
    pub fn active(&self) -> impl Iterator<Item = &K> + '_ {
        self.active.iter()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, key: &K) -> bool {
        self.active.contains(key)
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.by_start.iter().any(|e| &e.key == key)
    }

    pub fn entry(&self, key: &K) -> Option<&SpawnEntry<K>> {
        self.by_start.iter().find(|e| &e.key == key)
    }

    /// Move the clock to `time`, notifying `observer` of every transition crossed.
    pub fn update(&mut self, time: f32, observer: &mut dyn SpawnObserver<K>) {
        if time >= self.current_time {
            self.walk_forward(time, observer);
        } else {
            self.walk_backward(time, observer);
        }
        self.current_time = time;
    }

    fn walk_forward(&mut self, time: f32, observer: &mut dyn SpawnObserver<K>) {
        while let Some(entry) = self.by_start.get(self.activate_index) {
            if entry.start > time {
                break;
            }
            self.activate_index += 1;
            if entry.kill > time && !self.skipped.contains(&entry.key) {
                if self.active.insert(entry.key.clone()) {
                    observer.on_spawn(&entry.key);
                }
            }
        }
        while let Some(entry) = self.by_kill.get(self.deactivate_index) {
            if entry.kill > time {
                break;
            }
            self.deactivate_index += 1;
            if self.active.shift_remove(&entry.key) {
                observer.on_despawn(&entry.key);
            }
        }
    }

    fn walk_backward(&mut self, time: f32, observer: &mut dyn SpawnObserver<K>) {
        while self.deactivate_index > 0 {
            let entry = &self.by_kill[self.deactivate_index - 1];
            if entry.kill <= time {
                break;
            }
            self.deactivate_index -= 1;
            if entry.start <= time && !self.skipped.contains(&entry.key) {
                if self.active.insert(entry.key.clone()) {
                    observer.on_spawn(&entry.key);
                }
            }
        }
        while self.activate_index > 0 {
            let entry = &self.by_start[self.activate_index - 1];
            if entry.start <= time {
                break;
            }
            self.activate_index -= 1;
            if self.active.shift_remove(&entry.key) {
                observer.on_despawn(&entry.key);
            }
        }
    }

    /// Rebuild the active set from scratch at the current time.
    ///
    /// Only keys whose membership differs from before the replay are reported.
    pub fn recalculate_object_states(&mut self, observer: &mut dyn SpawnObserver<K>) {
        let previous = std::mem::take(&mut self.active);
        self.activate_index = 0;
        self.deactivate_index = 0;
        let time = self.current_time;
        self.walk_forward(time, &mut ());
        for key in previous.iter() {
            if !self.active.contains(key) {
                observer.on_despawn(key);
            }
        }
        for key in self.active.iter() {
            if !previous.contains(key) {
                observer.on_spawn(key);
            }
        }
    }

    pub fn insert_object(
        &mut self,
        entry: SpawnEntry<K>,
        recalculate: bool,
        observer: &mut dyn SpawnObserver<K>,
    ) {
        self.insert_sorted(entry);
        if recalculate {
            self.recalculate_object_states(observer);
        }
    }

    pub fn insert_objects(
        &mut self,
        entries: impl IntoIterator<Item = SpawnEntry<K>>,
        recalculate: bool,
        observer: &mut dyn SpawnObserver<K>,
    ) {
        for entry in entries {
            self.insert_sorted(entry);
        }
        if recalculate {
            self.recalculate_object_states(observer);
        }
    }

    // Equal keys land after existing ones. Cursors shift so the processed prefix stays the same
    // set; the new entry is only picked up by a recalculation.
    fn insert_sorted(&mut self, entry: SpawnEntry<K>) {
        let at = self.by_start.partition_point(|e| e.start <= entry.start);
        if at < self.activate_index {
            self.activate_index += 1;
        }
        self.by_start.insert(at, entry.clone());

        let at = self.by_kill.partition_point(|e| e.kill <= entry.kill);
        if at < self.deactivate_index {
            self.deactivate_index += 1;
        }
        self.by_kill.insert(at, entry);
    }

    /// Remove `key`; an active key is despawned first. Unknown keys are ignored.
    pub fn remove_object(
        &mut self,
        key: &K,
        recalculate: bool,
        observer: &mut dyn SpawnObserver<K>,
    ) -> bool {
        let removed = self.remove_entry(key, observer);
        if recalculate {
            self.recalculate_object_states(observer);
        }
        removed
    }

    pub fn remove_objects<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a K>,
        recalculate: bool,
        observer: &mut dyn SpawnObserver<K>,
    ) where
        K: 'a,
    {
        for key in keys {
            self.remove_entry(key, observer);
        }
        if recalculate {
            self.recalculate_object_states(observer);
        }
    }

    fn remove_entry(&mut self, key: &K, observer: &mut dyn SpawnObserver<K>) -> bool {
        let Some(at) = self.by_start.iter().position(|e| &e.key == key) else {
            return false;
        };
        if at < self.activate_index {
            self.activate_index -= 1;
        }
        self.by_start.remove(at);
        if let Some(at) = self.by_kill.iter().position(|e| &e.key == key) {
            if at < self.deactivate_index {
                self.deactivate_index -= 1;
            }
            self.by_kill.remove(at);
        }
        self.skipped.remove(key);
        if self.active.shift_remove(key) {
            observer.on_despawn(key);
        }
        true
    }

    /// Exclude or re-admit a key. Takes effect on the next recalculation.
    pub fn set_skipped(&mut self, key: K, skipped: bool) -> bool {
        if skipped {
            self.skipped.insert(key)
        } else {
            self.skipped.remove(&key)
        }
    }

    pub fn is_skipped(&self, key: &K) -> bool {
        self.skipped.contains(key)
    }

    /// Drop every entry and rewind the clock.
    pub fn clear(&mut self) {
        self.by_start.clear();
        self.by_kill.clear();
        self.active.clear();
        self.skipped.clear();
        self.activate_index = 0;
        self.deactivate_index = 0;
        self.current_time = f32::NEG_INFINITY;
    }
}
