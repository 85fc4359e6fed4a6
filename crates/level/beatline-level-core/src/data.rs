//! Authored level data model.
//!
//! These are the declarative inputs the runtime consumes: beatmap objects with their keyframe
//! events and parent settings, background objects, prefab templates and their placed instances.
//! Persistence is the host's business; everything derives serde so any format works.

use beatline_sequence::{Keyframe, Rgba, Vec2};
use serde::{Deserialize, Serialize};

use crate::ids::{InstanceId, ObjectId, PrefabId};

/// One value per transform channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Channels<T> {
    pub position: T,
    pub scale: T,
    pub rotation: T,
}

impl<T: Copy> Channels<T> {
    pub const fn new(position: T, scale: T, rotation: T) -> Self {
        Self {
            position,
            scale,
            rotation,
        }
    }

    pub const fn splat(value: T) -> Self {
        Self::new(value, value, value)
    }
}

/// Visibility partition. Objects in [`Room::SHARED`] show in every room.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Room(pub u32);

impl Room {
    pub const SHARED: Room = Room(0);

    #[inline]
    pub fn visible_in(self, current: Room) -> bool {
        self == Room::SHARED || self == current
    }
}

fn default_parent_type() -> Channels<bool> {
    Channels::new(true, false, true)
}

fn unit_parallax() -> Channels<f32> {
    Channels::splat(1.0)
}

/// How an object follows its parent. Read by the link one hop *above* this object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentSettings {
    /// Which parent channels animate this object.
    #[serde(default = "default_parent_type")]
    pub parent_type: Channels<bool>,
    /// Per-channel delay applied when sampling the parent.
    #[serde(default)]
    pub offsets: Channels<f32>,
    /// Whether each offset also accumulates into the delays of further ancestors.
    #[serde(default)]
    pub additive: Channels<bool>,
    #[serde(default = "unit_parallax")]
    pub parallax: Channels<f32>,
    /// Freeze ancestors at the moment this object spawned instead of following them live.
    #[serde(default)]
    pub desync: bool,
    #[serde(default)]
    pub desync_offset: f32,
}

impl Default for ParentSettings {
    fn default() -> Self {
        Self {
            parent_type: default_parent_type(),
            offsets: Channels::default(),
            additive: Channels::default(),
            parallax: unit_parallax(),
            desync: false,
            desync_offset: 0.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoKill {
    /// Lives until the level ends.
    NoAutokill,
    /// Dies at its last keyframe.
    #[default]
    LastKeyframe,
    LastKeyframeOffset {
        offset: f32,
    },
    /// Dies `offset` seconds after it starts.
    FixedTime {
        offset: f32,
    },
    /// Dies at an absolute level time.
    SongTime {
        time: f32,
    },
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    #[default]
    Normal,
    /// Visible hint for the player, never hurts.
    Helper,
    Decoration,
    /// Transform-only; nothing renders.
    Empty,
    Solid,
}

impl ObjectType {
    pub fn has_visual(self) -> bool {
        !matches!(self, ObjectType::Empty)
    }

    pub fn has_collider(self) -> bool {
        matches!(self, ObjectType::Normal | ObjectType::Solid)
    }
}

/// Rotation keyframe; `relative` keys add onto the previous absolute angle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationKey {
    #[serde(flatten)]
    pub key: Keyframe<f32>,
    #[serde(default)]
    pub relative: bool,
}

/// Keyframe events of one object. Times are relative to the object's start.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectEvents {
    #[serde(default)]
    pub position: Vec<Keyframe<Vec2>>,
    #[serde(default)]
    pub scale: Vec<Keyframe<Vec2>>,
    #[serde(default)]
    pub rotation: Vec<RotationKey>,
    #[serde(default)]
    pub color: Vec<Keyframe<Rgba>>,
}

impl ObjectEvents {
    /// Latest keyframe time over every channel.
    pub fn last_time(&self) -> f32 {
        let pos = self.position.iter().map(|k| k.time);
        let sca = self.scale.iter().map(|k| k.time);
        let rot = self.rotation.iter().map(|k| k.key.time);
        let col = self.color.iter().map(|k| k.time);
        pos.chain(sca).chain(rot).chain(col).fold(0.0, f32::max)
    }

    /// Multiply every keyframe time by `factor`.
    pub fn scale_times(&mut self, factor: f32) {
        self.position.iter_mut().for_each(|k| k.time *= factor);
        self.scale.iter_mut().for_each(|k| k.time *= factor);
        self.rotation.iter_mut().for_each(|k| k.key.time *= factor);
        self.color.iter_mut().for_each(|k| k.time *= factor);
    }
}

/// Where a cloned object came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrefabOrigin {
    pub prefab: PrefabId,
    pub instance: InstanceId,
    /// Id of the template object this is a clone of.
    pub template_object: ObjectId,
    /// Absolute level time the owning instance starts at.
    #[serde(default)]
    pub instance_start: f32,
    /// Clone follows the instance's desync override.
    #[serde(default)]
    pub detached: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatmapObject {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    #[serde(default)]
    pub parent_settings: ParentSettings,
    pub start_time: f32,
    #[serde(default)]
    pub autokill: AutoKill,
    #[serde(default)]
    pub object_type: ObjectType,
    /// Render depth; larger is further back.
    #[serde(default)]
    pub depth: i32,
    /// Pivot offset of the visual relative to the object's transform.
    #[serde(default)]
    pub origin: Vec2,
    #[serde(default)]
    pub room: Room,
    #[serde(default)]
    pub events: ObjectEvents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefab: Option<PrefabOrigin>,
}

impl BeatmapObject {
    pub fn new(id: impl Into<ObjectId>, start_time: f32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            parent: None,
            parent_settings: ParentSettings::default(),
            start_time,
            autokill: AutoKill::default(),
            object_type: ObjectType::default(),
            depth: 0,
            origin: [0.0, 0.0],
            room: Room::SHARED,
            events: ObjectEvents::default(),
            prefab: None,
        }
    }

    /// Absolute time the object stops being active.
    pub fn kill_time(&self, level_length: Option<f32>) -> f32 {
        match self.autokill {
            AutoKill::NoAutokill => level_length.unwrap_or(f32::INFINITY),
            AutoKill::LastKeyframe => self.start_time + self.events.last_time(),
            AutoKill::LastKeyframeOffset { offset } => {
                self.start_time + self.events.last_time() + offset
            }
            AutoKill::FixedTime { offset } => self.start_time + offset,
            AutoKill::SongTime { time } => time,
        }
    }
}

fn unit_scale() -> Vec2 {
    [1.0, 1.0]
}

fn white() -> Rgba {
    [1.0, 1.0, 1.0, 1.0]
}

fn one_layer() -> u32 {
    1
}

fn yes() -> bool {
    true
}

/// Static backdrop shape, drawn as `layers` copies receding in Z.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackgroundObject {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    pub start_time: f32,
    /// `None` lives until the level ends.
    #[serde(default)]
    pub kill_time: Option<f32>,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default = "unit_scale")]
    pub scale: Vec2,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "white")]
    pub color: Rgba,
    #[serde(default = "one_layer")]
    pub layers: u32,
    #[serde(default)]
    pub z_position: f32,
    /// Fade deeper layers toward transparent.
    #[serde(default = "yes")]
    pub fade: bool,
    #[serde(default)]
    pub room: Room,
}

impl BackgroundObject {
    pub fn kill_time(&self, level_length: Option<f32>) -> f32 {
        self.kill_time
            .or(level_length)
            .unwrap_or(f32::INFINITY)
    }
}

/// Span during which an external modifier block runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModifierBlock {
    pub id: ObjectId,
    /// Object the modifiers act on, if any.
    #[serde(default)]
    pub target: Option<ObjectId>,
    pub start_time: f32,
    #[serde(default)]
    pub kill_time: Option<f32>,
    #[serde(default)]
    pub room: Room,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrefabAutoKill {
    /// Clones keep their own autokill.
    #[default]
    Regular,
    /// Clones die `offset` seconds after the instance (plus template offset) starts.
    StartTimeOffset { offset: f32 },
    /// Clones die at an absolute level time.
    SongTime { time: f32 },
}

/// Parent applied to every root-level clone of an instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentOverride {
    pub parent: ObjectId,
    #[serde(default)]
    pub settings: ParentSettings,
}

fn unit_speed() -> f32 {
    1.0
}

/// A placement of a prefab template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrefabInstance {
    pub id: InstanceId,
    pub prefab: PrefabId,
    pub start_time: f32,
    #[serde(default)]
    pub repeat_count: u32,
    /// Gap between repetitions; `None` means one second.
    #[serde(default)]
    pub repeat_offset_time: Option<f32>,
    #[serde(default = "unit_speed")]
    pub speed: f32,
    #[serde(default)]
    pub autokill: PrefabAutoKill,
    #[serde(default)]
    pub parent: Option<ParentOverride>,
}

impl PrefabInstance {
    pub fn new(id: impl Into<InstanceId>, prefab: impl Into<PrefabId>, start_time: f32) -> Self {
        Self {
            id: id.into(),
            prefab: prefab.into(),
            start_time,
            repeat_count: 0,
            repeat_offset_time: None,
            speed: 1.0,
            autokill: PrefabAutoKill::Regular,
            parent: None,
        }
    }

    #[inline]
    pub fn repeat_interval(&self) -> f32 {
        self.repeat_offset_time.unwrap_or(1.0)
    }
}

/// Reusable bundle of objects and nested prefab placements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrefabTemplate {
    pub id: PrefabId,
    #[serde(default)]
    pub name: String,
    /// Time shift applied to every object in the template.
    #[serde(default)]
    pub offset: f32,
    #[serde(default)]
    pub objects: Vec<BeatmapObject>,
    /// Sub-prefab placements, expanded together with the template.
    #[serde(default)]
    pub instances: Vec<PrefabInstance>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    #[serde(default)]
    pub objects: Vec<BeatmapObject>,
    #[serde(default)]
    pub backgrounds: Vec<BackgroundObject>,
    #[serde(default)]
    pub prefabs: Vec<PrefabTemplate>,
    #[serde(default)]
    pub prefab_instances: Vec<PrefabInstance>,
    #[serde(default)]
    pub modifier_blocks: Vec<ModifierBlock>,
    #[serde(default)]
    pub length: Option<f32>,
}
