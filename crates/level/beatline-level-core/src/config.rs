//! Runtime configuration for the level engine.

use serde::{Deserialize, Serialize};

/// How an expanded prefab instance reaches the spawner.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefabSpawnMode {
    /// Every clone is registered with the level spawner directly.
    #[default]
    Flatten,
    /// The instance becomes one runtime object with its own nested spawner over its clones.
    Nested,
}

/// Tuning knobs shared by the spawner, interpolator and expander.
/// Keep this minimal; new fields need a `serde(default)` so older configs keep loading.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// An object whose cumulative scale is at or below this on any axis is hidden and
    /// loses its collider.
    pub visibility_epsilon: f32,
    /// Longest parent chain the compiler will build.
    pub max_chain_depth: usize,
    /// Deepest prefab-within-prefab nesting the expander follows.
    pub max_prefab_depth: usize,
    /// Object depth -> scene Z multiplier.
    pub depth_z_scale: f32,
    /// Z distance between background layers.
    pub background_layer_z: f32,
    /// Global seed mixed into every generated prefab id.
    pub seed: u64,
    pub prefab_spawn_mode: PrefabSpawnMode,
    /// Kill time for objects that never autokill. `None` means they live forever.
    pub level_length: Option<f32>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            visibility_epsilon: 0.001,
            max_chain_depth: 30,
            max_prefab_depth: 16,
            depth_z_scale: 0.0005,
            background_layer_z: 1.0,
            seed: 0,
            prefab_spawn_mode: PrefabSpawnMode::Flatten,
            level_length: None,
        }
    }
}
