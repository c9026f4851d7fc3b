mod building;
mod traversal;

pub use building::EmptySceneError;
pub use traversal::{BvhCursor, TraversalHistory, TraversalOptions};

use std::fmt;
use std::ops;
use std::sync::Arc;

use index_vec::IndexVec;

use crate::geometry::Aabb;
use crate::scene::primitives::Primitive;
use crate::util::Stats;

index_vec::define_index_type! {
    pub struct NodeId = u32;
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Inner { children: [NodeId; 2] },
    Leaf { primitive: Arc<Primitive> },
}

/// One node of the flattened tree. `parent` records the owning node and
/// which child slot this node occupies there; the root has no parent.
#[derive(Clone, Debug)]
pub struct BvhNode {
    pub aabb: Aabb,
    pub parent: Option<(NodeId, usize)>,
    pub kind: NodeKind,
}

/// Binary bounding volume hierarchy over scene objects, stored as a node
/// arena. Built top down with a surface area heuristic.
#[derive(Debug)]
pub struct Bvh {
    nodes: IndexVec<NodeId, BvhNode>,
    root: NodeId,
}

impl ops::Index<NodeId> for Bvh {
    type Output = BvhNode;

    fn index(&self, id: NodeId) -> &BvhNode {
        &self.nodes[id]
    }
}

impl Bvh {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn bounding_box(&self) -> &Aabb {
        &self.nodes[self.root].aabb
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn statistics(&self) -> BvhStatistics {
        let mut stats = BvhStatistics::default();
        stats.node_count = self.nodes.len();
        self.collect_statistics(self.root, 0, &mut stats);
        stats
    }

    fn collect_statistics(&self, id: NodeId, depth: usize, stats: &mut BvhStatistics) {
        match &self.nodes[id].kind {
            NodeKind::Inner { children } => {
                for &child in children {
                    self.collect_statistics(child, depth + 1, stats);
                }
            }
            NodeKind::Leaf { .. } => {
                stats.leaf_count += 1;
                stats.leaf_depth.add_sample(depth);
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BvhStatistics {
    pub node_count: usize,
    pub leaf_count: usize,
    pub leaf_depth: Stats,
}

impl fmt::Display for BvhStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} leaves, leaf depth {}",
            self.node_count, self.leaf_count, self.leaf_depth
        )
    }
}
