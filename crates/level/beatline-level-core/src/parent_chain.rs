//! Parent-chain transform interpolation.
//!
//! A chain runs from an object's own hop (index 0) out to its outermost ancestor. Each link owns a
//! scene node; link `i` is parented under link `i + 1`, so writing local transforms per link
//! composes the hierarchy. The important quirk: a link's `animate`, `offsets` and `parallax`
//! describe how the *next* link up is driven, never the link itself. The first link always
//! animates.

use std::sync::Arc;

use beatline_sequence::{EvaluatorState, HomingTarget, Sequence, Vec2};

use crate::data::{Channels, ParentSettings};
use crate::ids::ObjectId;
use crate::scene::{NodeHandle, SceneGraph};

/// Per-channel offsets added on top of evaluated values (audio-reactive or manual nudges).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReactiveOffsets {
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for ReactiveOffsets {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            scale: [0.0, 0.0],
            rotation: 0.0,
        }
    }
}

/// Homing memory for the three transform channels of one link.
#[derive(Clone, Debug, Default)]
pub struct LinkState {
    pub position: EvaluatorState,
    pub scale: EvaluatorState,
    pub rotation: EvaluatorState,
}

impl LinkState {
    pub fn reset(&mut self) {
        self.position.reset();
        self.scale.reset();
        self.rotation.reset();
    }
}

/// One hop of a parent chain.
#[derive(Clone, Debug)]
pub struct ParentLink {
    /// Object this hop evaluates.
    pub object: ObjectId,
    pub node: NodeHandle,
    pub position: Arc<Sequence<Vec2>>,
    pub scale: Arc<Sequence<Vec2>>,
    pub rotation: Arc<Sequence<f32>>,
    pub state: LinkState,
    /// Whether the next link animates each channel.
    pub animate: Channels<bool>,
    /// Delay applied to the next link's channels.
    pub offsets: Channels<f32>,
    pub additive: Channels<bool>,
    pub parallax: Channels<f32>,
    pub desync: bool,
    pub desync_offset: f32,
    /// Set on clones of a prefab instance that detaches from its parent.
    pub detached: bool,
    pub spawned: bool,
    /// Start time of the link's object; sequences are relative to it.
    pub time_offset: f32,
    pub reactive: ReactiveOffsets,
    pub depth_z: f32,
}

impl ParentLink {
    /// Link with default sequences and the given follow settings.
    pub fn new(object: ObjectId, node: NodeHandle, settings: &ParentSettings) -> Self {
        Self {
            object,
            node,
            position: Arc::new(Sequence::constant([0.0, 0.0])),
            scale: Arc::new(Sequence::constant([1.0, 1.0])),
            rotation: Arc::new(Sequence::constant(0.0)),
            state: LinkState::default(),
            animate: settings.parent_type,
            offsets: settings.offsets,
            additive: settings.additive,
            parallax: settings.parallax,
            desync: settings.desync,
            desync_offset: settings.desync_offset,
            detached: false,
            spawned: false,
            time_offset: 0.0,
            reactive: ReactiveOffsets::default(),
            depth_z: 0.0,
        }
    }

    /// Forget spawn-time memory so the next walk behaves like a fresh spawn.
    pub fn reset(&mut self) {
        self.spawned = false;
        self.state.reset();
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParentChain {
    pub links: Vec<ParentLink>,
    /// Added to desync sync offsets when the chain originates inside an expanded prefab.
    pub prefab_time_correction: f32,
}

impl ParentChain {
    pub fn new(links: Vec<ParentLink>) -> Self {
        Self {
            links,
            prefab_time_correction: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Node of the object's own hop.
    pub fn root_node(&self) -> Option<NodeHandle> {
        self.links.first().map(|l| l.node)
    }

    pub fn reset(&mut self) {
        self.links.iter_mut().for_each(ParentLink::reset);
    }
}

/// Result of one walk.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChainOutcome {
    pub total_scale: Vec2,
    /// Every axis of `total_scale` exceeds the visibility epsilon.
    pub visible: bool,
}

/// Write every link's local transform for `time`.
///
/// Walking stops at the first link reached with a collapsed (zero) cumulative scale; links past
/// it keep whatever they held.
pub fn interpolate_chain(
    chain: &mut ParentChain,
    time: f32,
    scene: &mut SceneGraph,
    target: &dyn HomingTarget,
    visibility_epsilon: f32,
) -> ChainOutcome {
    let mut animate = Channels::splat(true);
    let mut offsets = Channels::splat(0.0f32);
    let mut added = Channels::splat(0.0f32);
    let mut parallax = Channels::splat(1.0f32);
    let mut desync = false;
    let mut sync_offset = 0.0;
    let mut total_scale = [1.0f32, 1.0];

    for link in chain.links.iter_mut() {
        if total_scale[0] == 0.0 || total_scale[1] == 0.0 {
            break;
        }

        let frozen = link.spawned && desync;
        link.spawned = true;

        if link.additive.position {
            added.position += link.offsets.position;
        }
        if link.additive.scale {
            added.scale += link.offsets.scale;
        }
        if link.additive.rotation {
            added.rotation += link.offsets.rotation;
        }

        if !frozen {
            let base = if desync { sync_offset } else { time } - link.time_offset;
            let node = scene.get_mut(link.node);
            let mut local = node.as_ref().map(|n| n.local).unwrap_or_default();

            if animate.position {
                let t = base - (offsets.position + added.position);
                let v = link.position.interpolate(t, &mut link.state.position, target);
                local.position = [
                    (v[0] + link.reactive.position[0]) * parallax.position,
                    (v[1] + link.reactive.position[1]) * parallax.position,
                    link.depth_z,
                ];
            }
            if animate.scale {
                let t = base - (offsets.scale + added.scale);
                let v = link.scale.interpolate(t, &mut link.state.scale, target);
                let s = [
                    (v[0] + link.reactive.scale[0]) * parallax.scale,
                    (v[1] + link.reactive.scale[1]) * parallax.scale,
                ];
                total_scale = [total_scale[0] * s[0], total_scale[1] * s[1]];
                local.scale = s;
            }
            if animate.rotation {
                let t = base - (offsets.rotation + added.rotation);
                let v = link.rotation.interpolate(t, &mut link.state.rotation, target);
                local.rotation = (v + link.reactive.rotation) * parallax.rotation;
            }

            if let Some(node) = node {
                node.local = local;
            }
        }

        animate = link.animate;
        offsets = link.offsets;
        parallax = link.parallax;

        if !desync {
            desync = link.desync || link.detached;
            sync_offset = link.time_offset + link.desync_offset + chain.prefab_time_correction;
        }
    }

    ChainOutcome {
        total_scale,
        visible: total_scale[0].abs() > visibility_epsilon
            && total_scale[1].abs() > visibility_epsilon,
    }
}
