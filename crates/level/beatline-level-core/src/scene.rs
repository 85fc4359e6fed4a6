//! Minimal scene arena the runtime writes transforms into.
//!
//! Nodes live in a slot vector addressed by generational [`NodeHandle`]s, so a handle kept by a
//! removed object can never alias a node created later. Rendering is someone else's job: hosts
//! read local or world transforms, colors and the collider/renderer flags after each tick.

use beatline_sequence::{Rgba, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

/// Local transform. Rotation is in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0],
            rotation: 0.0,
        }
    }
}

impl Transform {
    /// `self` applied on top of `child` (translate, rotate, scale).
    pub fn compose(&self, child: &Transform) -> Transform {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let x = child.position[0] * self.scale[0];
        let y = child.position[1] * self.scale[1];
        Transform {
            position: [
                self.position[0] + x * cos - y * sin,
                self.position[1] + x * sin + y * cos,
                self.position[2] + child.position[2],
            ],
            scale: [self.scale[0] * child.scale[0], self.scale[1] * child.scale[1]],
            rotation: self.rotation + child.rotation,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeHandle>,
    pub local: Transform,
    pub color: Rgba,
    pub collider_enabled: bool,
    pub renderer_enabled: bool,
    /// Whether the owning object is currently spawned.
    pub active: bool,
}

impl SceneNode {
    fn new(name: String, parent: Option<NodeHandle>) -> Self {
        Self {
            name,
            parent,
            local: Transform::default(),
            color: [1.0, 1.0, 1.0, 1.0],
            collider_enabled: false,
            renderer_enabled: false,
            active: false,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: impl Into<String>, parent: Option<NodeHandle>) -> NodeHandle {
        let node = SceneNode::new(name.into(), parent);
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeHandle {
            index,
            generation: 0,
        }
    }

    /// Drop a node. Children keep a dangling parent handle and resolve as roots.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<SceneNode> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(node)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&SceneNode> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut SceneNode> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.node.as_mut())
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn set_parent(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) {
        if let Some(node) = self.get_mut(handle) {
            node.parent = parent;
        }
    }

    /// Compose local transforms from the root down to `handle`.
    pub fn world_transform(&self, handle: NodeHandle) -> Option<Transform> {
        let mut node = self.get(handle)?;
        let mut world = node.local;
        // bounded so a mis-parented arena cannot spin forever
        for _ in 0..self.slots.len() {
            let Some(parent) = node.parent.and_then(|p| self.get(p)) else {
                break;
            };
            world = parent.local.compose(&world);
            node = parent;
        }
        Some(world)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
