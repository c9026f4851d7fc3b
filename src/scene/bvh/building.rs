use std::time::Instant;

use index_vec::IndexVec;
use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::geometry::{Aabb, FloatType};
use crate::scene::SceneObject;

use super::{Bvh, BvhNode, NodeId, NodeKind};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Cannot build an acceleration structure over an empty scene")]
pub struct EmptySceneError;

impl Bvh {
    /// Builds the hierarchy over the given objects. Mesh instances splice
    /// their own prebuilt subtree into the arena instead of becoming leaves.
    pub fn build(objects: &[SceneObject]) -> Result<Bvh, EmptySceneError> {
        let start = Instant::now();

        let mut items: Vec<(Aabb, SceneObject)> = objects
            .iter()
            .map(|object| (object.bounding_box(), object.clone()))
            .collect();

        let mut nodes = IndexVec::new();
        let root = build_range(&mut nodes, &mut items, None)?;

        log::debug!(
            "built BVH over {} objects ({} nodes) in {:.2?}",
            objects.len(),
            nodes.len(),
            start.elapsed()
        );

        Ok(Bvh { nodes, root })
    }
}

fn build_range(
    nodes: &mut IndexVec<NodeId, BvhNode>,
    items: &mut [(Aabb, SceneObject)],
    parent: Option<(NodeId, usize)>,
) -> Result<NodeId, EmptySceneError> {
    match items {
        [] => Err(EmptySceneError),
        [(aabb, object)] => match object {
            SceneObject::Primitive(primitive) => {
                nodes.push(BvhNode {
                    aabb: aabb.clone(),
                    parent,
                    kind: NodeKind::Leaf {
                        primitive: primitive.clone(),
                    },
                });
                Ok(nodes.last_idx())
            }
            SceneObject::MeshInstance(mesh) => Ok(splice(nodes, mesh.structure()?, parent)),
        },
        _ => {
            let aabb = items
                .iter()
                .map(|(aabb, _)| aabb.clone())
                .reduce(|a, b| &a | &b)
                .unwrap();

            // Placeholder children, overwritten below once both subtrees exist
            nodes.push(BvhNode {
                aabb,
                parent,
                kind: NodeKind::Inner {
                    children: [NodeId::new(0); 2],
                },
            });
            let node = nodes.last_idx();

            let split = choose_split(items);
            let (left_items, right_items) = items.split_at_mut(split);

            let left = build_range(nodes, left_items, Some((node, 0)))?;
            let right = build_range(nodes, right_items, Some((node, 1)))?;

            let NodeKind::Inner { children } = &mut nodes[node].kind else {
                unreachable!()
            };
            *children = [left, right];

            Ok(node)
        }
    }
}

/// Full sweep surface area heuristic. Tries all three axes, reorders the
/// slice to the winning axis order and returns the split index into it.
fn choose_split(items: &mut [(Aabb, SceneObject)]) -> usize {
    let n = items.len();

    let mut best: Option<(FloatType, usize, Vec<(Aabb, SceneObject)>)> = None;

    for axis in 0..3 {
        let mut order = items.to_vec();
        // Stable sort keeps ties in input order
        order.sort_by_key(|(aabb, _)| OrderedFloat(aabb.min[axis] + aabb.max[axis]));

        // suffix_union[i] covers order[n - 1 - i ..]
        let mut suffix_union = Vec::with_capacity(n - 1);
        let mut running = order[n - 1].0.clone();
        suffix_union.push(running.clone());
        for (aabb, _) in order[1..n - 1].iter().rev() {
            running |= aabb;
            suffix_union.push(running.clone());
        }

        let mut left = order[0].0.clone();
        for i in 1..n {
            let right = &suffix_union[n - 1 - i];
            let cost = left.area() * i as FloatType + right.area() * (n - i) as FloatType;

            if best.as_ref().is_none_or(|(best_cost, _, _)| cost < *best_cost) {
                best = Some((cost, i, order.clone()));
            }

            left |= &order[i].0;
        }
    }

    let (_, split, order) = best.unwrap();
    items.clone_from_slice(&order);
    split
}

/// Copies a prebuilt subtree into the arena, remapping all internal links
/// by the insertion offset, and attaches its root under `parent`.
fn splice(
    nodes: &mut IndexVec<NodeId, BvhNode>,
    sub: &Bvh,
    parent: Option<(NodeId, usize)>,
) -> NodeId {
    let offset = nodes.len();

    for node in sub.nodes.iter() {
        let mut copy = node.clone();
        copy.parent = copy.parent.map(|(p, slot)| (p + offset, slot));
        if let NodeKind::Inner { children } = &mut copy.kind {
            for child in children {
                *child += offset;
            }
        }
        nodes.push(copy);
    }

    let new_root = sub.root + offset;
    nodes[new_root].parent = parent;
    new_root
}
