//! # Render List
//!
//! Collects draw entries from the scene graph, keys them against a camera and
//! submits them in key order to a [`DrawBackend`].
//!
//! Per frame:
//! 1. [`RenderList::collect`] walks the tree once, emitting one entry per
//!    (node, pass) pair the node's kind draws in
//! 2. [`RenderList::compute_keys`] fills the sort keys from the camera
//! 3. [`RenderList::sort`] orders entries, stable for equal keys
//! 4. [`RenderList::submit`] hands them to the backend

use std::collections::HashSet;

use super::pass::Pass;
use super::sort_key::{depth_bits, override_bits, sort_key};
use crate::camera::Camera;
use crate::foundation::math::{utils, Mat4, Vec3};
use crate::scene::{NodeId, NodeKind, SceneError, SceneGraph};

/// One node drawn in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntry {
    /// Pass this entry draws in
    pub pass: Pass,
    /// Node drawn
    pub node: NodeId,
    /// Kind of the node, for backends dispatching on it
    pub kind: NodeKind,
    /// Node world transform
    pub world_transform: Mat4,
    /// Origin of the node in world space
    pub world_position: Vec3,
    /// Explicit draw order
    pub override_index: Option<i32>,
    /// Entry belongs to a manipulator
    pub manipulator: bool,
    /// Draw order key, valid after [`RenderList::compute_keys`]
    pub sort_key: u64,
}

/// What the collection walk skips
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderFilter {
    /// Draw outlines for every node, not just the selected ones
    pub outline_shown: bool,
    /// Kinds hidden from the viewport, together with their subtrees
    pub hidden_kinds: HashSet<NodeKind>,
}

impl RenderFilter {
    /// Whether nodes of `kind` are drawn
    pub fn is_kind_visible(&self, kind: NodeKind) -> bool {
        !self.hidden_kinds.contains(&kind)
    }
}

/// Receives sorted draw entries
pub trait DrawBackend {
    /// Called before the first entry of each pass
    fn begin_pass(&mut self, _pass: Pass, _camera: &Camera) {}

    /// Draw one entry. `model` is the world transform, or identity for
    /// passes that do not transform the model.
    fn draw(&mut self, entry: &RenderEntry, model: &Mat4);
}

/// Ordered draw entries for one frame
#[derive(Debug, Clone, Default)]
pub struct RenderList {
    entries: Vec<RenderEntry>,
}

impl RenderList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the subtree at `root` and emit entries for `passes`.
    ///
    /// Invisible nodes and nodes of hidden kinds prune their subtree. Outline
    /// passes only take selected nodes unless `filter.outline_shown` is set.
    pub fn collect(
        scene: &SceneGraph,
        root: NodeId,
        passes: &[Pass],
        filter: &RenderFilter,
        selection: &[NodeId],
    ) -> Result<Self, SceneError> {
        let mut list = Self::new();
        scene.walk(root, |id, node, world| {
            if !node.is_visible() || !filter.is_kind_visible(node.kind()) {
                return false;
            }

            for &pass in passes {
                if !node.kind().renders_in(pass) {
                    continue;
                }
                if pass.is_outline() && !filter.outline_shown && !selection.contains(&id) {
                    continue;
                }
                list.push(RenderEntry {
                    pass,
                    node: id,
                    kind: node.kind(),
                    world_transform: *world,
                    world_position: utils::translation(world),
                    override_index: node.override_index(),
                    manipulator: node.kind().is_manipulator(),
                    sort_key: 0,
                });
            }
            true
        })?;

        log::trace!("Collected {} render entries for {} passes", list.len(), passes.len());
        Ok(list)
    }

    /// Append an entry
    pub fn push(&mut self, entry: RenderEntry) {
        self.entries.push(entry);
    }

    /// Fill every sort key. Entries whose position cannot be projected get the
    /// farthest depth.
    pub fn compute_keys(&mut self, camera: &Camera) {
        for entry in &mut self.entries {
            let depth = match entry.override_index {
                Some(index) => override_bits(index),
                None => match camera.project(&entry.world_position) {
                    Ok(window) => depth_bits(window.z),
                    Err(e) => {
                        log::debug!("Depth for {:?} unavailable ({}), sorting first", entry.node, e);
                        0
                    }
                },
            };
            entry.sort_key = sort_key(entry.pass, entry.manipulator, depth);
        }
    }

    /// Stable ascending sort by key
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|entry| entry.sort_key);
    }

    /// Draw every entry in order, announcing each pass change.
    /// Returns the number of entries drawn.
    pub fn submit(&self, camera: &Camera, backend: &mut dyn DrawBackend) -> usize {
        let identity = Mat4::identity();
        let mut current = None;
        for entry in &self.entries {
            if current != Some(entry.pass) {
                current = Some(entry.pass);
                backend.begin_pass(entry.pass, camera);
            }
            let model = if entry.pass.transforms_model() { &entry.world_transform } else { &identity };
            backend.draw(entry, model);
        }
        self.entries.len()
    }

    /// Entries in current order
    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }

    /// Iterate entries in current order
    pub fn iter(&self) -> std::slice::Iter<'_, RenderEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries, keeping the allocation
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
