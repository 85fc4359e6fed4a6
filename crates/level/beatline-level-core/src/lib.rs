//! Beatline level runtime (engine-agnostic)
//!
//! Turns authored level data (beatmap objects, backgrounds, prefab templates and instances) into
//! live scene nodes for a given playback time:
//! - [`spawner`]: incremental activation over object lifespans, forward and backward
//! - [`parent_chain`]: hierarchical transform evaluation through chains of parents
//! - [`prefab`]: deterministic expansion of prefab instances
//! - [`engine`]: the per-tick driver and editing operations
//!
//! Rendering, audio, persistence and modifier scripting stay with the host.

pub mod compiler;
pub mod config;
pub mod context;
pub mod data;
pub mod engine;
pub mod error;
pub mod ids;
pub mod outputs;
pub mod parent_chain;
pub mod prefab;
pub mod runtime;
pub mod scene;
pub mod spawner;

pub use compiler::{CompileEnv, CompiledSequences, ObjectCompiler};
pub use config::{LevelConfig, PrefabSpawnMode};
pub use context::{LevelContext, LevelRegistry};
pub use data::{
    AutoKill, BackgroundObject, BeatmapObject, Channels, LevelData, ModifierBlock, ObjectEvents,
    ObjectType, ParentOverride, ParentSettings, PrefabAutoKill, PrefabInstance, PrefabOrigin,
    PrefabTemplate, Room, RotationKey,
};
pub use engine::LevelEngine;
pub use error::{LevelError, Result};
pub use ids::{IdSeeder, InstanceId, ObjectId, PrefabId};
pub use outputs::{LevelEvent, TickOutputs};
pub use parent_chain::{interpolate_chain, ChainOutcome, ParentChain, ParentLink, ReactiveOffsets};
pub use prefab::{Expansion, ExpansionReport, ExpansionSteps, IdPair, PrefabExpander, Repetition};
pub use runtime::{ModifierHost, PrefabInstanceRunner, RuntimeEnv, RuntimeObject, TimedObject};
pub use scene::{NodeHandle, SceneGraph, SceneNode, Transform};
pub use spawner::{ObjectSpawner, SpawnEntry, SpawnObserver, Transition};

pub use beatline_sequence;
