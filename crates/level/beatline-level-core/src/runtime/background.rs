use beatline_sequence::{Rgba, Vec2};

use crate::data::{BackgroundObject, Room};
use crate::ids::ObjectId;
use crate::scene::{NodeHandle, SceneGraph};

use super::{RuntimeEnv, TimedObject};

/// Layered backdrop shape. Layer `i` sits `i * background_layer_z` further back and, when
/// fading, at `1 - i / layers` of the base alpha.
#[derive(Debug)]
pub struct BackgroundRunner {
    pub id: ObjectId,
    pub start_time: f32,
    pub kill_time: f32,
    pub room: Room,
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    pub color: Rgba,
    pub z_position: f32,
    pub fade: bool,
    pub reactive_scale: Vec2,
    pub layers: Vec<NodeHandle>,
    pub active: bool,
}

impl BackgroundRunner {
    pub fn new(
        source: &BackgroundObject,
        level_length: Option<f32>,
        scene: &mut SceneGraph,
    ) -> Self {
        let layers = (0..source.layers.max(1))
            .map(|i| scene.create(format!("{}#{i}", source.id), None))
            .collect();
        Self {
            id: source.id.clone(),
            start_time: source.start_time,
            kill_time: source.kill_time(level_length),
            room: source.room,
            position: source.position,
            scale: source.scale,
            rotation: source.rotation,
            color: source.color,
            z_position: source.z_position,
            fade: source.fade,
            reactive_scale: [0.0, 0.0],
            layers,
            active: false,
        }
    }
}

impl TimedObject for BackgroundRunner {
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
        for &layer in &self.layers {
            if let Some(node) = env.scene.get_mut(layer) {
                node.active = active;
                node.renderer_enabled = active;
            }
        }
    }

    fn interpolate(&mut self, _time: f32, env: &mut RuntimeEnv<'_>) {
        let count = self.layers.len() as f32;
        let scale = [
            self.scale[0] + self.reactive_scale[0],
            self.scale[1] + self.reactive_scale[1],
        ];
        for (i, &layer) in self.layers.iter().enumerate() {
            let Some(node) = env.scene.get_mut(layer) else {
                continue;
            };
            let depth = i as f32;
            node.local.position = [
                self.position[0],
                self.position[1],
                self.z_position + depth * env.config.background_layer_z,
            ];
            node.local.scale = scale;
            node.local.rotation = self.rotation;
            let mut color = self.color;
            if self.fade {
                color[3] *= 1.0 - depth / count;
            }
            node.color = color;
        }
    }

    fn clear(&mut self, env: &mut RuntimeEnv<'_>) {
        for layer in self.layers.drain(..) {
            env.scene.remove(layer);
        }
        self.active = false;
    }
}
