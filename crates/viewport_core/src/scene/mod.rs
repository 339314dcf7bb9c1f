//! Scene graph and bounding volumes

pub mod aabb;
pub mod node;
pub mod scene_graph;

pub use aabb::Aabb;
pub use node::{NodeFlags, NodeId, NodeKind, SceneNode};
pub use scene_graph::{Ancestors, SceneError, SceneGraph, SceneObserver};
