//! # Scene Graph
//!
//! Arena-backed node tree with lazily memoized world bounds.
//!
//! ## Dirty tracking
//!
//! A node's cached world AABB covers its own geometry plus every descendant,
//! in world space. It is invalid when anything under it changed, or when any
//! transform above it changed:
//! - transform edits mark the node, its descendants and its ancestors
//! - local bound edits mark the node and its ancestors
//! - attaching marks the attached subtree and the new ancestors, detaching
//!   marks the old ancestors
//!
//! Siblings and their subtrees are never touched.

use std::cmp::Ordering;
use std::fmt;

use slotmap::SlotMap;

use super::aabb::Aabb;
use super::node::{NodeFlags, NodeId, NodeKind, SceneNode};
use crate::foundation::math::{utils, Mat3, Mat4, Quat, Vec3};

/// Scene graph errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// Handle does not refer to a live node
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    /// Scale must be finite and positive
    #[error("invalid scale {0}, must be finite and positive")]
    InvalidScale(f64),

    /// Attaching would make a node its own ancestor
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },

    /// Node already has a parent
    #[error("node {0:?} is already attached")]
    AlreadyAttached(NodeId),

    /// Node is not a child of the given parent
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Given parent
        parent: NodeId,
        /// Given child
        child: NodeId,
    },

    /// The root cannot be destroyed or attached elsewhere
    #[error("operation not allowed on the root node")]
    RootNode,
}

/// Notifications about structural and transform changes
///
/// All methods default to no-ops.
pub trait SceneObserver {
    /// A node's local transform changed
    fn transform_changed(&mut self, _node: NodeId) {}

    /// `child` was attached under `parent`
    fn child_added(&mut self, _parent: NodeId, _child: NodeId) {}

    /// `child` was detached from `parent`
    fn child_removed(&mut self, _parent: NodeId, _child: NodeId) {}
}

/// Node tree owning all [`SceneNode`]s
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
    observer: Option<Box<dyn SceneObserver>>,
}

impl fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneGraph")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph holding only a root collection
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new(NodeKind::Collection, "root".to_string()));
        Self { nodes, root, observer: None }
    }

    /// Root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Install the change observer
    pub fn set_observer(&mut self, observer: Box<dyn SceneObserver>) {
        self.observer = Some(observer);
    }

    /// Whether `id` is live
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Look up a node, failing on stale handles
    pub fn node(&self, id: NodeId) -> Result<&SceneNode, SceneError> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Create a detached node
    pub fn create_node(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeId {
        let name = name.into();
        log::trace!("Creating {:?} node '{}'", kind, name);
        self.nodes.insert(SceneNode::new(kind, name))
    }

    /// Create a node and append it under `parent`
    pub fn spawn(&mut self, parent: NodeId, kind: NodeKind, name: impl Into<String>) -> Result<NodeId, SceneError> {
        self.node(parent)?;
        let id = self.create_node(kind, name);
        self.add_child(parent, id)?;
        Ok(id)
    }

    // ---- tree structure ----

    /// Children of `id` in draw order
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.node(id)?.children)
    }

    /// Parent of `id`
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent)
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors { graph: self, next: self.nodes.get(id).and_then(|n| n.parent) }
    }

    /// `id` and all its descendants, depth first in child order
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.node(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Whether `ancestor` is `id` or above it
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Append `child` under `parent`, at its remembered index when it has one
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let index = self.node(child)?.child_index;
        let len = self.node(parent)?.children.len();
        let index = index.map_or(len, |i| i.min(len));
        self.insert_child(parent, index, child)
    }

    /// Insert `child` under `parent` at `index` (clamped to the child count)
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        let child_node = self.node(child)?;
        if child == self.root {
            return Err(SceneError::RootNode);
        }
        if child_node.parent.is_some() {
            return Err(SceneError::AlreadyAttached(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::WouldCreateCycle { parent, child });
        }

        let parent_node = self.node_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.reindex_children(parent);

        self.node_mut(child)?.parent = Some(parent);
        self.mark_subtree_dirty(child);
        self.mark_ancestors_dirty(child);

        if let Some(observer) = self.observer.as_mut() {
            observer.child_added(parent, child);
        }
        Ok(())
    }

    /// Detach `child` from `parent`; the child keeps its subtree and its index
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let parent_node = self.node_mut(parent)?;
        let position = parent_node
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(SceneError::NotAChild { parent, child })?;
        parent_node.children.remove(position);
        self.reindex_children(parent);

        self.node_mut(child)?.parent = None;
        self.node_mut(child)?.child_index = Some(position);
        self.mark_dirty_from(parent);
        self.mark_subtree_dirty(child);

        if let Some(observer) = self.observer.as_mut() {
            observer.child_removed(parent, child);
        }
        Ok(())
    }

    /// Detach `id` from its parent (if any) and drop it with its subtree
    pub fn destroy(&mut self, id: NodeId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootNode);
        }
        if let Some(parent) = self.node(id)?.parent {
            self.remove_child(parent, id)?;
        }
        for node in self.descendants(id)? {
            self.nodes.remove(node);
        }
        Ok(())
    }

    /// Reorder the children of `parent`; the sort is stable
    pub fn sort_children<F>(&mut self, parent: NodeId, mut compare: F) -> Result<(), SceneError>
    where
        F: FnMut(&SceneNode, &SceneNode) -> Ordering,
    {
        let mut children = std::mem::take(&mut self.node_mut(parent)?.children);
        children.sort_by(|&a, &b| match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(a), Some(b)) => compare(a, b),
            _ => Ordering::Equal,
        });
        self.node_mut(parent)?.children = children;
        self.reindex_children(parent);
        Ok(())
    }

    fn reindex_children(&mut self, parent: NodeId) {
        let Some(children) = self.nodes.get(parent).map(|n| n.children.clone()) else {
            return;
        };
        for (index, child) in children.into_iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(child) {
                node.child_index = Some(index);
            }
        }
    }

    // ---- local state ----

    /// Set the translation
    pub fn set_translation(&mut self, id: NodeId, translation: Vec3) -> Result<(), SceneError> {
        self.node_mut(id)?.translation = translation;
        self.transform_changed(id);
        Ok(())
    }

    /// Set the rotation; the Euler mirror follows
    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) -> Result<(), SceneError> {
        self.node_mut(id)?.set_rotation(rotation);
        self.transform_changed(id);
        Ok(())
    }

    /// Set the rotation from YZX Euler angles in degrees
    pub fn set_euler(&mut self, id: NodeId, euler: Vec3) -> Result<(), SceneError> {
        self.node_mut(id)?.set_euler(euler);
        self.transform_changed(id);
        Ok(())
    }

    /// Set the uniform scale. Non-positive or non-finite values are rejected
    /// and leave the node unchanged.
    pub fn set_scale(&mut self, id: NodeId, scale: f64) -> Result<(), SceneError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SceneError::InvalidScale(scale));
        }
        self.node_mut(id)?.scale = scale;
        self.transform_changed(id);
        Ok(())
    }

    /// Decompose an affine matrix into translation, rotation and uniform scale.
    ///
    /// The scale is the mean basis column length; shear and non-uniform scale
    /// are discarded.
    pub fn set_local_transform(&mut self, id: NodeId, transform: &Mat4) -> Result<(), SceneError> {
        let rotation_scale = utils::rotation_scale(transform);
        let scale = (rotation_scale.column(0).norm() + rotation_scale.column(1).norm() + rotation_scale.column(2).norm())
            / 3.0;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SceneError::InvalidScale(scale));
        }
        let rotation = Quat::from_matrix(&(rotation_scale / scale));

        let node = self.node_mut(id)?;
        node.translation = utils::translation(transform);
        node.set_rotation(rotation);
        node.scale = scale;
        self.transform_changed(id);
        Ok(())
    }

    /// Replace the local-space bounds
    pub fn set_aabb(&mut self, id: NodeId, aabb: Aabb) -> Result<(), SceneError> {
        self.node_mut(id)?.aabb = aabb;
        self.mark_dirty_from(id);
        Ok(())
    }

    /// Set or clear the draw order override
    pub fn set_override_index(&mut self, id: NodeId, index: Option<i32>) -> Result<(), SceneError> {
        self.node_mut(id)?.override_index = index;
        Ok(())
    }

    /// Rename a node
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    // ---- flags ----

    /// Set flags on one node
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) -> Result<(), SceneError> {
        self.update_flags(id, |f| f.insert(flags))
    }

    /// Clear flags on one node
    pub fn clear_flags(&mut self, id: NodeId, flags: NodeFlags) -> Result<(), SceneError> {
        self.update_flags(id, |f| f.remove(flags))
    }

    /// Set flags on a node and all its descendants
    pub fn set_flags_recursively(&mut self, id: NodeId, flags: NodeFlags) -> Result<(), SceneError> {
        for node in self.descendants(id)? {
            self.update_flags(node, |f| f.insert(flags))?;
        }
        Ok(())
    }

    /// Clear flags on a node and all its descendants
    pub fn clear_flags_recursively(&mut self, id: NodeId, flags: NodeFlags) -> Result<(), SceneError> {
        for node in self.descendants(id)? {
            self.update_flags(node, |f| f.remove(flags))?;
        }
        Ok(())
    }

    /// Show or hide a node (and so its subtree)
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), SceneError> {
        self.update_flags(id, |f| f.set(NodeFlags::VISIBLE, visible))
    }

    fn update_flags(&mut self, id: NodeId, update: impl FnOnce(&mut NodeFlags)) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        let before = node.flags;
        update(&mut node.flags);
        let inheritance = NodeFlags::NO_INHERIT_ROTATION | NodeFlags::NO_INHERIT_SCALE | NodeFlags::NO_SCALE_ALONG_Z;
        if (before ^ node.flags).intersects(inheritance) {
            self.transform_changed(id);
        }
        Ok(())
    }

    // ---- dirty tracking ----

    fn transform_changed(&mut self, id: NodeId) {
        self.mark_subtree_dirty(id);
        self.mark_ancestors_dirty(id);
        if let Some(observer) = self.observer.as_mut() {
            observer.transform_changed(id);
        }
    }

    /// Mark `id` and every ancestor
    fn mark_dirty_from(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get_mut(c)) {
            node.world_aabb_dirty = true;
            current = node.parent;
        }
    }

    fn mark_ancestors_dirty(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent) {
            self.mark_dirty_from(parent);
        }
    }

    fn mark_subtree_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current) {
                node.world_aabb_dirty = true;
                stack.extend_from_slice(&node.children);
            }
        }
    }

    /// Whether the cached world bounds of `id` must be recomputed
    pub fn is_world_aabb_dirty(&self, id: NodeId) -> Result<bool, SceneError> {
        Ok(self.node(id)?.world_aabb_dirty)
    }

    // ---- world space ----

    /// Local transform `T * R * S`
    pub fn local_transform(&self, id: NodeId) -> Result<Mat4, SceneError> {
        Ok(self.node(id)?.local_transform())
    }

    /// Local-to-world transform, honoring the inheritance flags of every node
    /// on the path from the root
    pub fn world_transform(&self, id: NodeId) -> Result<Mat4, SceneError> {
        Ok(self.world_frame(id)?.transform)
    }

    fn world_frame(&self, id: NodeId) -> Result<WorldFrame, SceneError> {
        let node = self.node(id)?;
        let parent = match node.parent {
            Some(parent) => self.world_frame(parent)?,
            None => WorldFrame::root(),
        };
        Ok(parent.child(node))
    }

    /// World bounds of `id` and its subtree; recomputed only when dirty
    pub fn world_aabb(&mut self, id: NodeId) -> Result<Aabb, SceneError> {
        let node = self.node(id)?;
        if !node.world_aabb_dirty {
            return Ok(node.world_aabb);
        }
        let parent = match node.parent {
            Some(parent) => self.world_frame(parent)?,
            None => WorldFrame::root(),
        };
        Ok(self.refresh_world_aabb(id, &parent))
    }

    fn refresh_world_aabb(&mut self, id: NodeId, parent: &WorldFrame) -> Aabb {
        let Some(node) = self.nodes.get(id) else {
            return Aabb::identity();
        };
        if !node.world_aabb_dirty {
            return node.world_aabb;
        }

        let frame = parent.child(node);
        let mut aabb = node.aabb.transform(&frame.transform);
        let count = node.children.len();
        for i in 0..count {
            let Some(child) = self.nodes.get(id).and_then(|n| n.children.get(i).copied()) else {
                break;
            };
            aabb = aabb.union(&self.refresh_world_aabb(child, &frame));
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.world_aabb = aabb;
            node.world_aabb_dirty = false;
        }
        aabb
    }

    /// Depth-first walk from `start` that hands every node its world frame
    /// and lets the visitor prune subtrees by returning `false`.
    pub(crate) fn walk<F>(&self, start: NodeId, mut visit: F) -> Result<(), SceneError>
    where
        F: FnMut(NodeId, &SceneNode, &Mat4) -> bool,
    {
        let start_node = self.node(start)?;
        let parent = match start_node.parent {
            Some(parent) => self.world_frame(parent)?,
            None => WorldFrame::root(),
        };

        let mut stack = vec![(start, parent)];
        while let Some((id, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let frame = parent.child(node);
            if visit(id, node, &frame.transform) {
                stack.extend(node.children.iter().rev().map(|&c| (c, frame)));
            }
        }
        Ok(())
    }
}

/// Iterator over a node's ancestors
pub struct Ancestors<'a> {
    graph: &'a SceneGraph,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.nodes.get(current).and_then(|n| n.parent);
        Some(current)
    }
}

/// Accumulated world transform plus the inherited "no scale along Z" state
#[derive(Debug, Clone, Copy)]
struct WorldFrame {
    transform: Mat4,
    no_scale_along_z: bool,
}

impl WorldFrame {
    fn root() -> Self {
        Self { transform: Mat4::identity(), no_scale_along_z: false }
    }

    fn child(&self, node: &SceneNode) -> Self {
        let no_rotation = node.flags.contains(NodeFlags::NO_INHERIT_ROTATION);
        let no_scale = node.flags.contains(NodeFlags::NO_INHERIT_SCALE);
        let no_scale_along_z = self.no_scale_along_z || node.flags.contains(NodeFlags::NO_SCALE_ALONG_Z);

        let mut inherited = self.transform;
        if no_rotation || no_scale {
            let rs = utils::rotation_scale(&inherited);
            let filtered = match (no_rotation, no_scale) {
                (true, true) => Mat3::identity(),
                (true, false) => {
                    let scale = rs.column(0).norm().max(rs.column(1).norm()).max(rs.column(2).norm());
                    Mat3::identity() * scale
                }
                _ => normalize_columns(&rs),
            };
            utils::set_rotation_scale(&mut inherited, &filtered);
        }

        let transform = if no_scale_along_z {
            let mut parent_rs = utils::rotation_scale(&inherited);
            let parent_z = parent_rs.column(2).normalize();
            parent_rs.set_column(2, &parent_z);

            let mut rs = parent_rs * utils::rotation_scale(&node.local_transform());
            let z = rs.column(2).normalize();
            rs.set_column(2, &z);

            let translation = utils::translation(&inherited) + parent_rs * node.translation;
            let mut m = Mat4::identity();
            utils::set_rotation_scale(&mut m, &rs);
            m.m14 = translation.x;
            m.m24 = translation.y;
            m.m34 = translation.z;
            m
        } else {
            inherited * node.local_transform()
        };

        Self { transform, no_scale_along_z }
    }
}

fn normalize_columns(m: &Mat3) -> Mat3 {
    let mut out = *m;
    for i in 0..3 {
        let norm = m.column(i).norm();
        if norm > f64::EPSILON {
            out.set_column(i, &(m.column(i) / norm));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
    }

    fn world_point(graph: &SceneGraph, id: NodeId, p: Vec3) -> Vec3 {
        graph.world_transform(id).unwrap().transform_point(&Point3::from(p)).coords
    }

    /// root -> a -> (b, c), b -> d
    fn sample_tree() -> (SceneGraph, [NodeId; 4]) {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = graph.spawn(root, NodeKind::Instance, "a").unwrap();
        let b = graph.spawn(a, NodeKind::Instance, "b").unwrap();
        let c = graph.spawn(a, NodeKind::Model, "c").unwrap();
        let d = graph.spawn(b, NodeKind::Model, "d").unwrap();
        for id in [a, b, c, d] {
            graph.set_aabb(id, unit_box()).unwrap();
        }
        (graph, [a, b, c, d])
    }

    #[derive(Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl SceneObserver for Recorder {
        fn transform_changed(&mut self, _node: NodeId) {
            self.events.borrow_mut().push("transform".to_string());
        }

        fn child_added(&mut self, _parent: NodeId, _child: NodeId) {
            self.events.borrow_mut().push("added".to_string());
        }

        fn child_removed(&mut self, _parent: NodeId, _child: NodeId) {
            self.events.borrow_mut().push("removed".to_string());
        }
    }

    #[test]
    fn test_world_transform_chain() {
        let (mut graph, [a, b, _, d]) = sample_tree();
        graph.set_translation(a, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        graph.set_euler(a, Vec3::new(0.0, 90.0, 0.0)).unwrap();
        graph.set_scale(b, 2.0).unwrap();
        graph.set_translation(d, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        // d origin: scaled by b (x2), rotated by a (+X -> -Z), then offset by a
        assert_relative_eq!(world_point(&graph, d, Vec3::zeros()), Vec3::new(10.0, 0.0, -2.0), epsilon = 1e-9);
    }

    #[test]
    fn test_no_inherit_rotation_keeps_parent_scale() {
        let (mut graph, [a, b, _, _]) = sample_tree();
        graph.set_euler(a, Vec3::new(0.0, 90.0, 0.0)).unwrap();
        graph.set_scale(a, 3.0).unwrap();
        graph.set_flags(b, NodeFlags::NO_INHERIT_ROTATION).unwrap();

        let p = world_point(&graph, b, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_no_inherit_scale_keeps_parent_rotation() {
        let (mut graph, [a, b, _, _]) = sample_tree();
        graph.set_euler(a, Vec3::new(0.0, 90.0, 0.0)).unwrap();
        graph.set_scale(a, 3.0).unwrap();
        graph.set_flags(b, NodeFlags::NO_INHERIT_SCALE).unwrap();

        let p = world_point(&graph, b, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-9);
    }

    #[test]
    fn test_no_inherit_rotation_and_scale() {
        let (mut graph, [a, b, _, _]) = sample_tree();
        graph.set_translation(a, Vec3::new(0.0, 5.0, 0.0)).unwrap();
        graph.set_euler(a, Vec3::new(45.0, 10.0, 0.0)).unwrap();
        graph.set_scale(a, 4.0).unwrap();
        graph
            .set_flags(b, NodeFlags::NO_INHERIT_ROTATION | NodeFlags::NO_INHERIT_SCALE)
            .unwrap();

        // Only the parent's translation survives
        let p = world_point(&graph, b, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(p, Vec3::new(1.0, 7.0, 3.0), epsilon = 1e-9);
    }

    #[test]
    fn test_no_scale_along_z_is_inherited() {
        let (mut graph, [a, b, _, d]) = sample_tree();
        graph.set_scale(a, 2.0).unwrap();
        graph.set_flags(b, NodeFlags::NO_SCALE_ALONG_Z).unwrap();

        let world = graph.world_transform(d).unwrap();
        let rs = utils::rotation_scale(&world);
        assert_relative_eq!(rs.column(0).norm(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(rs.column(2).norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_scale_along_z_keeps_z_offsets_unscaled() {
        let (mut graph, [a, b, _, d]) = sample_tree();
        graph.set_scale(a, 2.0).unwrap();
        graph.set_translation(b, Vec3::new(1.0, 0.0, 1.0)).unwrap();
        graph.set_translation(d, Vec3::new(1.0, 0.0, 1.0)).unwrap();
        graph.set_flags(b, NodeFlags::NO_SCALE_ALONG_Z).unwrap();

        // X offsets still pick up the parent's scale, Z offsets do not
        let origin = utils::translation(&graph.world_transform(b).unwrap());
        assert_relative_eq!(origin, Vec3::new(2.0, 0.0, 1.0), epsilon = 1e-9);
        let origin = utils::translation(&graph.world_transform(d).unwrap());
        assert_relative_eq!(origin, Vec3::new(4.0, 0.0, 2.0), epsilon = 1e-9);

        graph.clear_flags(b, NodeFlags::NO_SCALE_ALONG_Z).unwrap();
        let origin = utils::translation(&graph.world_transform(b).unwrap());
        assert_relative_eq!(origin, Vec3::new(2.0, 0.0, 2.0), epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let (mut graph, [a, ..]) = sample_tree();
        graph.set_scale(a, 2.5).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(graph.set_scale(a, bad), Err(SceneError::InvalidScale(_))));
        }
        assert_relative_eq!(graph.node(a).unwrap().scale(), 2.5);
    }

    #[test]
    fn test_set_local_transform_decomposes() {
        let (mut graph, [a, ..]) = sample_tree();
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), 0.7);
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)) * rotation.to_homogeneous() * Mat4::new_scaling(1.5);
        graph.set_local_transform(a, &m).unwrap();

        let node = graph.node(a).unwrap();
        assert_relative_eq!(node.translation(), Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-9);
        assert_relative_eq!(node.scale(), 1.5, epsilon = 1e-9);
        assert_relative_eq!(node.rotation(), rotation, epsilon = 1e-9);
        assert_relative_eq!(graph.local_transform(a).unwrap(), m, epsilon = 1e-9);
    }

    #[test]
    fn test_world_aabb_unions_children() {
        let (mut graph, [a, b, c, d]) = sample_tree();
        graph.set_translation(c, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        graph.set_translation(d, Vec3::new(0.0, -4.0, 0.0)).unwrap();

        let world = graph.world_aabb(a).unwrap();
        assert_relative_eq!(world.min, Vec3::new(-1.0, -5.0, -1.0));
        assert_relative_eq!(world.max, Vec3::new(6.0, 1.0, 1.0));
        assert!(!graph.is_world_aabb_dirty(b).unwrap());
    }

    #[test]
    fn test_transform_change_dirties_path_not_siblings() {
        let (mut graph, [a, b, c, d]) = sample_tree();
        graph.world_aabb(graph.root()).unwrap();
        for id in [a, b, c, d] {
            assert!(!graph.is_world_aabb_dirty(id).unwrap());
        }

        graph.set_translation(b, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(graph.is_world_aabb_dirty(b).unwrap());
        assert!(graph.is_world_aabb_dirty(d).unwrap());
        assert!(graph.is_world_aabb_dirty(a).unwrap());
        assert!(graph.is_world_aabb_dirty(graph.root()).unwrap());
        assert!(!graph.is_world_aabb_dirty(c).unwrap());
    }

    #[test]
    fn test_set_aabb_dirties_ancestors_only() {
        let (mut graph, [a, b, c, d]) = sample_tree();
        graph.world_aabb(graph.root()).unwrap();

        graph.set_aabb(b, Aabb::new(Vec3::zeros(), Vec3::new(9.0, 9.0, 9.0))).unwrap();
        assert!(graph.is_world_aabb_dirty(b).unwrap());
        assert!(graph.is_world_aabb_dirty(a).unwrap());
        assert!(!graph.is_world_aabb_dirty(d).unwrap());
        assert!(!graph.is_world_aabb_dirty(c).unwrap());

        assert_relative_eq!(graph.world_aabb(a).unwrap().max, Vec3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn test_world_aabb_matches_full_recompute() {
        let (mut graph, [a, b, c, d]) = sample_tree();
        graph.world_aabb(graph.root()).unwrap();
        graph.set_euler(a, Vec3::new(0.0, 0.0, 45.0)).unwrap();
        graph.set_scale(b, 3.0).unwrap();
        graph.set_translation(c, Vec3::new(-2.0, 0.0, 7.0)).unwrap();
        let cached = graph.world_aabb(graph.root()).unwrap();

        let fresh = [a, b, c, d].iter().fold(Aabb::identity(), |acc, &id| {
            acc.union(&unit_box().transform(&graph.world_transform(id).unwrap()))
        });
        assert_relative_eq!(cached.min, fresh.min, epsilon = 1e-9);
        assert_relative_eq!(cached.max, fresh.max, epsilon = 1e-9);
    }

    #[test]
    fn test_identity_bounds_contribute_nothing() {
        let mut graph = SceneGraph::new();
        let group = graph.spawn(graph.root(), NodeKind::Collection, "group").unwrap();
        assert!(graph.world_aabb(group).unwrap().is_identity());

        let leaf = graph.spawn(group, NodeKind::Model, "leaf").unwrap();
        graph.set_aabb(leaf, unit_box()).unwrap();
        assert_eq!(graph.world_aabb(group).unwrap(), unit_box());
    }

    #[test]
    fn test_remove_and_readd_keeps_index() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let nodes: Vec<NodeId> = (0..3).map(|i| graph.spawn(root, NodeKind::Model, format!("n{i}")).unwrap()).collect();

        graph.remove_child(root, nodes[1]).unwrap();
        assert_eq!(graph.children(root).unwrap(), &[nodes[0], nodes[2]]);
        assert_eq!(graph.parent(nodes[1]).unwrap(), None);

        graph.add_child(root, nodes[1]).unwrap();
        assert_eq!(graph.children(root).unwrap(), nodes.as_slice());
    }

    #[test]
    fn test_structure_errors() {
        let (mut graph, [a, b, c, d]) = sample_tree();
        assert_eq!(graph.add_child(d, a), Err(SceneError::AlreadyAttached(a)));

        graph.remove_child(graph.root(), a).unwrap();
        assert_eq!(graph.add_child(d, a), Err(SceneError::WouldCreateCycle { parent: d, child: a }));
        assert_eq!(graph.remove_child(b, c), Err(SceneError::NotAChild { parent: b, child: c }));
        assert_eq!(graph.destroy(graph.root()), Err(SceneError::RootNode));
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let (mut graph, [a, b, c, d]) = sample_tree();
        graph.destroy(b).unwrap();
        assert!(!graph.contains(b));
        assert!(!graph.contains(d));
        assert_eq!(graph.children(a).unwrap(), &[c]);
        assert_eq!(graph.set_scale(d, 2.0), Err(SceneError::NodeNotFound(d)));
    }

    #[test]
    fn test_sort_children() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let z = graph.spawn(root, NodeKind::Model, "z").unwrap();
        let m = graph.spawn(root, NodeKind::Model, "m").unwrap();
        let a = graph.spawn(root, NodeKind::Model, "a").unwrap();

        graph.sort_children(root, |l, r| l.name().cmp(r.name())).unwrap();
        assert_eq!(graph.children(root).unwrap(), &[a, m, z]);
        assert_eq!(graph.node(z).unwrap().child_index(), Some(2));
    }

    #[test]
    fn test_recursive_flags() {
        let (mut graph, [a, b, c, d]) = sample_tree();
        graph.set_flags_recursively(b, NodeFlags::LOCKED).unwrap();
        assert!(!graph.node(b).unwrap().is_editable());
        assert!(graph.node(d).unwrap().has_flags(NodeFlags::LOCKED));
        assert!(!graph.node(a).unwrap().has_flags(NodeFlags::LOCKED));
        assert!(!graph.node(c).unwrap().has_flags(NodeFlags::LOCKED));

        graph.clear_flags_recursively(a, NodeFlags::LOCKED).unwrap();
        assert!(!graph.node(d).unwrap().has_flags(NodeFlags::LOCKED));
    }

    #[test]
    fn test_observer_hooks() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut graph = SceneGraph::new();
        graph.set_observer(Box::new(Recorder { events: Rc::clone(&events) }));

        let n = graph.spawn(graph.root(), NodeKind::Instance, "n").unwrap();
        graph.set_translation(n, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        graph.remove_child(graph.root(), n).unwrap();

        assert_eq!(*events.borrow(), vec!["added", "transform", "removed"]);
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let (graph, [a, b, c, d]) = sample_tree();
        assert_eq!(graph.ancestors(d).collect::<Vec<_>>(), vec![b, a, graph.root()]);
        assert_eq!(graph.descendants(a).unwrap(), vec![a, b, d, c]);
    }
}
