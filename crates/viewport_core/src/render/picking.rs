//! # Picking
//!
//! Selection re-draws the scene in the selection passes with every entry
//! tagged by its index ("name"). A [`SelectBackend`] reports which names had
//! fragments inside the pick rectangle, and at what depth. The nearest hit is
//! then resolved to the selectable unit: the hit node or its nearest
//! `TRANSFORMABLE` ancestor.
//!
//! [`BoundsSelectBackend`] answers hit queries on the CPU from projected
//! bounds, for hosts without a GPU selection buffer and for tests.

use super::pass::Pass;
use super::render_list::{RenderEntry, RenderFilter, RenderList};
use crate::camera::Camera;
use crate::foundation::math::{Mat4, Vec3};
use crate::scene::{Aabb, NodeId, SceneError, SceneGraph};

/// Pick region in window pixels, stored as center and size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickRect {
    /// Center x
    pub x: i32,
    /// Center y
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl PickRect {
    /// Square of side `min_box` centered on a point
    pub fn around(x: i32, y: i32, min_box: i32) -> Self {
        Self { x, y, width: min_box, height: min_box }
    }

    /// Rectangle spanned by a drag, never smaller than `min_box` per side
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_drag(start: (i32, i32), end: (i32, i32), min_box: i32) -> Self {
        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        // Round half up so drags in either direction agree on the center
        let half = |d: i32| (f64::from(d) * 0.5 + 0.5).floor() as i32;
        Self {
            x: start.0 + half(dx),
            y: start.1 + half(dy),
            width: dx.abs().max(min_box),
            height: dy.abs().max(min_box),
        }
    }

    /// Whether the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let half_w = f64::from(self.width) / 2.0;
        let half_h = f64::from(self.height) / 2.0;
        let (x, y) = (f64::from(self.x), f64::from(self.y));
        (x - half_w, y - half_h, x + half_w, y + half_h)
    }

    /// Whether a window-space box touches the rectangle
    pub fn overlaps(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        let (left, top, right, bottom) = self.bounds();
        min_x <= right && max_x >= left && min_y <= bottom && max_y >= top
    }
}

/// One tagged entry that had fragments inside the pick rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    /// Tag the entry was drawn with
    pub name: u32,
    /// Nearest fragment depth in `[0, 1]`
    pub min_depth: f64,
}

/// A tagged draw during selection
#[derive(Debug, Clone, Copy)]
pub struct SelectQuery<'a> {
    /// Tag to report on a hit
    pub name: u32,
    /// Entry being drawn
    pub entry: &'a RenderEntry,
    /// Node bounds in local space
    pub local_aabb: Aabb,
}

/// Hit-test backend
pub trait SelectBackend {
    /// Start a selection pass restricted to `rect`
    fn begin_select(&mut self, pass: Pass, camera: &Camera, rect: &PickRect);

    /// Draw one tagged entry
    fn draw_named(&mut self, query: &SelectQuery<'_>);

    /// Finish the pass and report every tag that was hit
    fn end_select(&mut self) -> Vec<HitRecord>;
}

/// CPU hit testing against projected bounds
///
/// Geometry hits when the window-space box of its projected world AABB
/// overlaps the pick rectangle. Icon kinds test a fixed-size square around
/// the projected node origin instead.
#[derive(Debug, Clone)]
pub struct BoundsSelectBackend {
    icon_size: f64,
    camera: Option<Camera>,
    rect: Option<PickRect>,
    hits: Vec<HitRecord>,
}

impl BoundsSelectBackend {
    /// Backend with 16 pixel icons
    pub fn new() -> Self {
        Self::with_icon_size(16.0)
    }

    /// Backend with a custom icon size in pixels
    pub fn with_icon_size(icon_size: f64) -> Self {
        Self { icon_size, camera: None, rect: None, hits: Vec::new() }
    }

    fn icon_hit(&self, camera: &Camera, rect: &PickRect, entry: &RenderEntry) -> Option<f64> {
        let center = camera.project(&entry.world_position).ok()?;
        if !(0.0..=1.0).contains(&center.z) {
            return None;
        }
        let half = self.icon_size / 2.0;
        rect.overlaps(center.x - half, center.y - half, center.x + half, center.y + half)
            .then_some(center.z)
    }

    fn bounds_hit(camera: &Camera, rect: &PickRect, aabb: &Aabb, world: &Mat4) -> Option<f64> {
        if aabb.is_identity() {
            return None;
        }

        let mut window = Aabb::identity();
        for corner in aabb.transform(world).corners() {
            // Boxes crossing the camera plane have no stable window footprint
            window = window.union_point(&camera.project(&corner).ok()?);
        }

        let (left, top, right, bottom) = rect.bounds();
        let pick_volume = Aabb::new(Vec3::new(left, top, 0.0), Vec3::new(right, bottom, 1.0));
        window.intersects(&pick_volume).then_some(window.min.z.clamp(0.0, 1.0))
    }
}

impl Default for BoundsSelectBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectBackend for BoundsSelectBackend {
    fn begin_select(&mut self, pass: Pass, camera: &Camera, rect: &PickRect) {
        log::trace!("Hit testing {:?} in {}x{} at ({}, {})", pass, rect.width, rect.height, rect.x, rect.y);
        self.camera = Some(camera.clone());
        self.rect = Some(*rect);
        self.hits.clear();
    }

    fn draw_named(&mut self, query: &SelectQuery<'_>) {
        let (Some(camera), Some(rect)) = (self.camera.as_ref(), self.rect.as_ref()) else {
            log::warn!("draw_named outside begin_select/end_select");
            return;
        };

        let depth = if query.entry.kind.is_icon() {
            self.icon_hit(camera, rect, query.entry)
        } else {
            Self::bounds_hit(camera, rect, &query.local_aabb, &query.entry.world_transform)
        };

        if let Some(min_depth) = depth {
            self.hits.push(HitRecord { name: query.name, min_depth });
        }
    }

    fn end_select(&mut self) -> Vec<HitRecord> {
        self.camera = None;
        self.rect = None;
        std::mem::take(&mut self.hits)
    }
}

/// A resolved hit: the drawn node, the hit depth and the entry's draw key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// Node that was drawn
    pub node: NodeId,
    /// Nearest fragment depth
    pub depth: f64,
    /// Draw order key of the entry
    pub sort_key: u64,
}

/// Runs the selection passes and resolves hits to selectable nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Picker {
    min_selection_box: i32,
}

impl Picker {
    /// Picker with the given minimum pick box side
    pub fn new(min_selection_box: i32) -> Self {
        Self { min_selection_box }
    }

    /// Minimum pick box side in pixels
    pub fn min_selection_box(&self) -> i32 {
        self.min_selection_box
    }

    /// Pick rectangle around a pointer position
    pub fn rect_at(&self, x: i32, y: i32) -> PickRect {
        PickRect::around(x, y, self.min_selection_box)
    }

    /// Pick rectangle spanned by a drag
    pub fn rect_between(&self, start: (i32, i32), end: (i32, i32)) -> PickRect {
        PickRect::from_drag(start, end, self.min_selection_box)
    }

    /// Every raw hit over all selection passes, in report order
    pub fn hit_test(
        &self,
        scene: &SceneGraph,
        camera: &Camera,
        rect: &PickRect,
        filter: &RenderFilter,
        backend: &mut dyn SelectBackend,
    ) -> Result<Vec<PickHit>, SceneError> {
        let mut hits = Vec::new();
        if rect.is_empty() {
            return Ok(hits);
        }

        for pass in Pass::SELECTION_PASSES {
            let mut list = RenderList::collect(scene, scene.root(), &[pass], filter, &[])?;
            list.compute_keys(camera);
            list.sort();

            backend.begin_select(pass, camera, rect);
            for (name, entry) in (0_u32..).zip(list.iter()) {
                let local_aabb = scene.node(entry.node)?.local_aabb();
                backend.draw_named(&SelectQuery { name, entry, local_aabb });
            }

            for hit in backend.end_select() {
                match usize::try_from(hit.name).ok().and_then(|i| list.entries().get(i)) {
                    Some(entry) => hits.push(PickHit { node: entry.node, depth: hit.min_depth, sort_key: entry.sort_key }),
                    None => log::warn!("Selection backend reported unknown name {}", hit.name),
                }
            }
        }

        log::trace!("Hit test at ({}, {}) produced {} hits", rect.x, rect.y, hits.len());
        Ok(hits)
    }

    /// Nearest hit resolved to its selectable node. Ties go to the first hit
    /// reported; hits without a `TRANSFORMABLE` node on their path are dropped.
    pub fn pick(
        &self,
        scene: &SceneGraph,
        camera: &Camera,
        rect: &PickRect,
        filter: &RenderFilter,
        backend: &mut dyn SelectBackend,
    ) -> Result<Option<NodeId>, SceneError> {
        let hits = self.hit_test(scene, camera, rect, filter, backend)?;

        let mut nearest: Option<PickHit> = None;
        for hit in hits {
            if nearest.map_or(true, |best| hit.depth < best.depth) {
                nearest = Some(hit);
            }
        }

        Ok(nearest.and_then(|hit| Self::selectable(scene, hit.node)))
    }

    /// Every hit resolved to selectable nodes in reverse draw order, without
    /// duplicates: later passes first, manipulators before the geometry they
    /// sit on, then nearest first within a pass.
    pub fn pick_all(
        &self,
        scene: &SceneGraph,
        camera: &Camera,
        rect: &PickRect,
        filter: &RenderFilter,
        backend: &mut dyn SelectBackend,
    ) -> Result<Vec<NodeId>, SceneError> {
        let mut hits = self.hit_test(scene, camera, rect, filter, backend)?;
        hits.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));

        let mut nodes: Vec<NodeId> = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(node) = Self::selectable(scene, hit.node) {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }

    /// `node` itself or its nearest `TRANSFORMABLE` ancestor
    pub fn selectable(scene: &SceneGraph, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(scene.ancestors(node))
            .find(|&id| scene.get(id).is_some_and(|n| n.is_transformable()))
    }
}

impl Default for Picker {
    fn default() -> Self {
        Self::new(16)
    }
}
