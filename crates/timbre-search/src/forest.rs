//! Random-projection trees.
//!
//! Each tree recursively splits its members with a hyperplane through the
//! origin whose normal is the difference of two cluster centres found by a
//! short angular 2-means run. Members with a positive margin go right. When
//! a hyperplane fails to separate the members (identical directions, zero
//! vectors) the split falls back to a random halving with a zero normal,
//! which the search treats as "explore both sides equally".
//!
//! All trees share one node arena so the forest serializes as two flat
//! vectors.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use timbre_core::IndexPosition;

use crate::distance::{cosine, dot, normalized};

const TWO_MEANS_ITERATIONS: usize = 32;

/// Trees deeper than this are cut into a leaf.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(Vec<IndexPosition>),
    Split {
        normal: Vec<f32>,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Forest {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    leaf_size: usize,
}

impl Forest {
    /// Grow `tree_count` trees over every item.
    pub(crate) fn build(
        items: &BTreeMap<IndexPosition, Vec<f32>>,
        tree_count: usize,
        leaf_size: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut forest = Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            leaf_size: leaf_size.max(1),
        };
        if items.is_empty() {
            return forest;
        }

        let unit: BTreeMap<IndexPosition, Vec<f32>> = items
            .iter()
            .map(|(position, v)| (*position, normalized(v)))
            .collect();
        let members: Vec<IndexPosition> = unit.keys().copied().collect();

        for _ in 0..tree_count {
            let root = forest.grow(&unit, members.clone(), rng, 0);
            forest.roots.push(root);
        }
        forest
    }

    pub(crate) fn tree_count(&self) -> usize {
        self.roots.len()
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn grow(
        &mut self,
        unit: &BTreeMap<IndexPosition, Vec<f32>>,
        mut members: Vec<IndexPosition>,
        rng: &mut StdRng,
        depth: usize,
    ) -> usize {
        if members.len() <= self.leaf_size || depth >= MAX_DEPTH {
            return self.push(Node::Leaf(members));
        }

        let mut normal = two_means_normal(unit, &members, rng);
        let mut left = Vec::new();
        let mut right = Vec::new();
        for &position in &members {
            let margin = dot(&normal, &unit[&position]);
            let goes_right = if margin == 0.0 {
                rng.gen_bool(0.5)
            } else {
                margin > 0.0
            };
            if goes_right {
                right.push(position);
            } else {
                left.push(position);
            }
        }

        if left.is_empty() || right.is_empty() {
            members.shuffle(rng);
            right = members.split_off(members.len() / 2);
            left = members;
            normal.iter_mut().for_each(|x| *x = 0.0);
        }

        let left = self.grow(unit, left, rng, depth + 1);
        let right = self.grow(unit, right, rng, depth + 1);
        self.push(Node::Split {
            normal,
            left,
            right,
        })
    }

    /// Collect up to `search_k` distinct candidate positions for a
    /// unit-length query vector, visiting nodes in order of how far the
    /// query lies on their side of each hyperplane.
    pub(crate) fn candidates(&self, query: &[f32], search_k: usize) -> BTreeSet<IndexPosition> {
        let mut heap: BinaryHeap<Pending> = self
            .roots
            .iter()
            .map(|&node| Pending {
                priority: f32::INFINITY,
                node,
            })
            .collect();

        let mut found = BTreeSet::new();
        while found.len() < search_k {
            let Some(Pending { priority, node }) = heap.pop() else {
                break;
            };
            match &self.nodes[node] {
                Node::Leaf(members) => found.extend(members.iter().copied()),
                Node::Split {
                    normal,
                    left,
                    right,
                } => {
                    let margin = dot(normal, query);
                    heap.push(Pending {
                        priority: priority.min(margin),
                        node: *right,
                    });
                    heap.push(Pending {
                        priority: priority.min(-margin),
                        node: *left,
                    });
                }
            }
        }
        found
    }
}

/// Normal of the hyperplane separating two angular cluster centres.
fn two_means_normal(
    unit: &BTreeMap<IndexPosition, Vec<f32>>,
    members: &[IndexPosition],
    rng: &mut StdRng,
) -> Vec<f32> {
    let count = members.len();
    let first = rng.gen_range(0..count);
    let mut second = rng.gen_range(0..count - 1);
    if second >= first {
        second += 1;
    }

    let mut p = unit[&members[first]].clone();
    let mut q = unit[&members[second]].clone();
    let mut p_weight = 1.0f32;
    let mut q_weight = 1.0f32;

    for _ in 0..TWO_MEANS_ITERATIONS {
        let v = &unit[&members[rng.gen_range(0..count)]];
        let to_p = 1.0 - cosine(&p, v);
        let to_q = 1.0 - cosine(&q, v);
        match to_p.partial_cmp(&to_q) {
            Some(Ordering::Less) => {
                absorb(&mut p, p_weight, v);
                p_weight += 1.0;
            }
            Some(Ordering::Greater) => {
                absorb(&mut q, q_weight, v);
                q_weight += 1.0;
            }
            _ => {}
        }
    }

    let diff: Vec<f32> = p.iter().zip(&q).map(|(a, b)| a - b).collect();
    normalized(&diff)
}

/// Move a running centre toward `v` and renormalize it.
fn absorb(centre: &mut Vec<f32>, weight: f32, v: &[f32]) {
    for (c, x) in centre.iter_mut().zip(v) {
        *c = (*c * weight + x) / (weight + 1.0);
    }
    *centre = normalized(centre);
}

/// A node waiting to be visited during search.
#[derive(Debug, Clone, Copy)]
struct Pending {
    priority: f32,
    node: usize,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn items(vectors: &[&[f32]]) -> BTreeMap<IndexPosition, Vec<f32>> {
        vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (IndexPosition::new(i as u32), v.to_vec()))
            .collect()
    }

    fn leaves(forest: &Forest) -> Vec<&Vec<IndexPosition>> {
        forest
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Leaf(members) => Some(members),
                Node::Split { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_small_set_is_a_single_leaf_per_tree() {
        let mut rng = StdRng::seed_from_u64(1);
        let forest = Forest::build(&items(&[&[1.0, 0.0], &[0.0, 1.0]]), 3, 4, &mut rng);
        assert_eq!(forest.tree_count(), 3);
        assert_eq!(forest.node_count(), 3);
    }

    #[test]
    fn test_every_tree_covers_every_item_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let data: Vec<Vec<f32>> = (0..200)
            .map(|_| (0..6).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();
        let forest = Forest::build(&items(&refs), 4, 5, &mut rng);

        let mut counts = BTreeMap::new();
        for leaf in leaves(&forest) {
            assert!(leaf.len() <= 5 || leaf.is_empty());
            for position in leaf {
                *counts.entry(*position).or_insert(0) += 1;
            }
        }
        assert_eq!(counts.len(), 200);
        assert!(counts.values().all(|&c| c == 4));
    }

    #[test]
    fn test_identical_vectors_still_split() {
        let mut rng = StdRng::seed_from_u64(3);
        let same = vec![vec![1.0f32, 1.0]; 20];
        let refs: Vec<&[f32]> = same.iter().map(Vec::as_slice).collect();
        let forest = Forest::build(&items(&refs), 1, 2, &mut rng);
        assert!(leaves(&forest).iter().all(|leaf| leaf.len() <= 2));
    }

    #[test]
    fn test_candidates_stop_at_search_k() {
        let mut rng = StdRng::seed_from_u64(11);
        let data: Vec<Vec<f32>> = (0..100)
            .map(|_| (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();
        let forest = Forest::build(&items(&refs), 2, 3, &mut rng);

        let found = forest.candidates(&normalized(&data[0]), 10);
        assert!(found.len() >= 10);
        assert!(found.len() < 100);
    }

    #[test]
    fn test_empty_forest_has_no_candidates() {
        let mut rng = StdRng::seed_from_u64(0);
        let forest = Forest::build(&BTreeMap::new(), 10, 4, &mut rng);
        assert_eq!(forest.tree_count(), 0);
        assert!(forest.candidates(&[1.0], 5).is_empty());
    }
}
