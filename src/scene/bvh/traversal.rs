use std::sync::Arc;

use crate::geometry::{FloatType, Ray};
use crate::scene::primitives::Primitive;
use crate::scene::Intersection;

use super::{Bvh, NodeId, NodeKind};

/// Where a previous traversal found its nearest hit. Passing it back into
/// [`Bvh::traverse`] lets the next traversal start at that leaf, on the
/// assumption that coherent rays tend to hit the same region of the tree.
#[derive(Clone, Debug, Default)]
pub struct TraversalHistory {
    pub last_selected: Option<NodeId>,
}

#[derive(Clone, Copy, Debug)]
pub struct TraversalOptions {
    /// Start at the leaf recorded in the history instead of the root.
    pub resume_from_history: bool,
    /// Report a fixed distance of 1.0 for boxes that contain the ray
    /// origin, instead of the exact entry distance of 0.0. Kept for
    /// comparison against older renders that relied on this behavior;
    /// it can wrongly prune the enclosing box once a hit closer than
    /// 1.0 has been selected.
    pub legacy_inside_box_distance: bool,
}

impl Default for TraversalOptions {
    fn default() -> TraversalOptions {
        TraversalOptions {
            resume_from_history: true,
            legacy_inside_box_distance: false,
        }
    }
}

impl Bvh {
    /// Starts a front to back traversal of all leaves whose boxes the ray
    /// enters. Call [`BvhCursor::select`] after each confirmed hit to
    /// prune nodes farther than the current nearest.
    pub fn traverse<'a>(
        &'a self,
        ray: &'a Ray,
        history: &TraversalHistory,
        options: TraversalOptions,
    ) -> BvhCursor<'a> {
        let anchor = if options.resume_from_history {
            history.last_selected
        } else {
            None
        };

        let mut cursor = BvhCursor {
            bvh: self,
            ray,
            position: Some(anchor.unwrap_or(self.root)),
            deferred: Vec::new(),
            local_root: anchor.unwrap_or(self.root),
            last_slot: 0,
            max_t: None,
            selected: None,
            legacy_inside: options.legacy_inside_box_distance,
            fresh: true,
        };

        // The anchor leaf is yielded unconditionally; a root start first
        // descends to the nearest overlapped leaf.
        if anchor.is_none() {
            cursor.descend();
        }
        cursor
    }
}

/// Stateful cursor over the leaves a ray may hit. `deferred` holds the far
/// children of inner nodes passed on the way down; `local_root` is the
/// subtree already fully visited, climbed towards the root as the cursor
/// exhausts each sibling.
pub struct BvhCursor<'a> {
    bvh: &'a Bvh,
    ray: &'a Ray,
    position: Option<NodeId>,
    deferred: Vec<NodeId>,
    local_root: NodeId,
    last_slot: usize,
    max_t: Option<FloatType>,
    selected: Option<NodeId>,
    legacy_inside: bool,
    fresh: bool,
}

impl BvhCursor<'_> {
    /// Next candidate primitive, or `None` when the tree is exhausted.
    pub fn next(&mut self) -> Option<Arc<Primitive>> {
        if self.fresh {
            self.fresh = false;
        } else if self.position.is_some() {
            if self.pick_shallower() {
                self.descend();
            }
        }

        let position = self.position?;
        let NodeKind::Leaf { primitive } = &self.bvh[position].kind else {
            unreachable!("descend always stops at a leaf")
        };
        Some(Arc::clone(primitive))
    }

    /// Records that the most recently yielded primitive is the nearest hit
    /// so far. Nodes entered at or beyond `intersection.t` are skipped
    /// from here on.
    pub fn select(&mut self, intersection: &Intersection) {
        self.selected = self.position;
        self.max_t = Some(intersection.t);
    }

    /// History for seeding the next traversal, anchored at the last
    /// selected leaf.
    pub fn history(&self) -> TraversalHistory {
        TraversalHistory {
            last_selected: self.selected,
        }
    }

    fn box_distance(&self, node: NodeId) -> Option<FloatType> {
        let aabb = &self.bvh[node].aabb;
        if self.legacy_inside {
            aabb.legacy_entry_distance(self.ray)
        } else {
            aabb.entry_distance(self.ray)
        }
    }

    /// Moves to the next unvisited sibling subtree. Prefers nodes deferred
    /// during descent; otherwise climbs one level from the local root and
    /// crosses to the other child. Returns false at the root.
    fn pick_shallower(&mut self) -> bool {
        if let Some(node) = self.deferred.pop() {
            self.position = Some(node);
            return true;
        }

        let Some((parent, slot)) = self.bvh[self.local_root].parent else {
            self.position = None;
            return false;
        };

        let NodeKind::Inner { children } = &self.bvh[parent].kind else {
            unreachable!("parent links always point at inner nodes")
        };
        self.last_slot = slot;
        self.local_root = parent;
        self.position = Some(children[if slot == 0 { 1 } else { 0 }]);
        true
    }

    /// Walks down from the current position to the first leaf whose box
    /// the ray enters closer than the selection bound, deferring the other
    /// child at each inner node.
    fn descend(&mut self) {
        loop {
            let Some(position) = self.position else {
                return;
            };

            let entered = self
                .box_distance(position)
                .is_some_and(|t| self.max_t.is_none_or(|max_t| t < max_t));

            if entered {
                match &self.bvh[position].kind {
                    NodeKind::Leaf { .. } => return,
                    NodeKind::Inner { children } => {
                        if self.last_slot == 0 {
                            self.deferred.push(children[1]);
                            self.position = Some(children[0]);
                        } else {
                            self.deferred.push(children[0]);
                            self.position = Some(children[1]);
                        }
                    }
                }
            } else if !self.pick_shallower() {
                return;
            }
        }
    }
}
