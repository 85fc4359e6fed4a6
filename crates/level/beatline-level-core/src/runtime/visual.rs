use std::sync::Arc;

use beatline_sequence::{EvaluatorState, Rgba, Sequence};

use crate::data::{ObjectType, Room};
use crate::ids::ObjectId;
use crate::parent_chain::{interpolate_chain, ParentChain, ReactiveOffsets};
use crate::scene::NodeHandle;

use super::{RuntimeEnv, TimedObject};

/// Beatmap object with a rendered shape.
#[derive(Debug)]
pub struct VisualObject {
    pub id: ObjectId,
    pub start_time: f32,
    pub kill_time: f32,
    pub room: Room,
    pub object_type: ObjectType,
    pub chain: ParentChain,
    /// Shape node, child of the chain's first link. `None` for empty objects.
    pub visual: Option<NodeHandle>,
    pub color: Arc<Sequence<Rgba>>,
    pub color_state: EvaluatorState,
    pub active: bool,
    /// Last visibility computed from the chain's cumulative scale.
    pub visible: bool,
}

impl VisualObject {
    pub fn set_reactive(&mut self, offsets: ReactiveOffsets) {
        if let Some(link) = self.chain.links.first_mut() {
            link.reactive = offsets;
        }
    }

    fn nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.chain.links.iter().map(|l| l.node).chain(self.visual)
    }
}

impl TimedObject for VisualObject {
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
            self.chain.reset();
            self.color_state.reset();
        }
        let handles: Vec<NodeHandle> = self.nodes().collect();
        for handle in handles {
            if let Some(node) = env.scene.get_mut(handle) {
                node.active = active;
            }
        }
    }

    fn interpolate(&mut self, time: f32, env: &mut RuntimeEnv<'_>) {
        let outcome = interpolate_chain(
            &mut self.chain,
            time,
            env.scene,
            &env.homing_target,
            env.config.visibility_epsilon,
        );
        self.visible = outcome.visible;

        let Some(visual) = self.visual else {
            return;
        };
        let color = self
            .color
            .interpolate(time - self.start_time, &mut self.color_state, &());
        if let Some(node) = env.scene.get_mut(visual) {
            node.color = color;
            node.renderer_enabled = outcome.visible;
            node.collider_enabled = outcome.visible && self.object_type.has_collider();
        }
    }

    fn clear(&mut self, env: &mut RuntimeEnv<'_>) {
        let handles: Vec<NodeHandle> = self.nodes().collect();
        for handle in handles {
            env.scene.remove(handle);
        }
        self.visual = None;
        self.chain.links.clear();
        self.active = false;
    }
}
