//! Fuzzy replay of move sequences through the tree
//!
//! Callers that map moves to children (for example eight compass directions)
//! can replay a recorded sequence even when some moves were never expanded:
//! a missing move is replaced by the nearest expanded one within a cyclic
//! tolerance.

use std::collections::BTreeMap;

use log::trace;

use crate::node::NodeId;

/// Number of moves in the default cyclic move space (compass directions)
pub const DEFAULT_DIRECTIONS: u32 = 8;

/// Distance between two moves in a cyclic space of `directions` moves
///
/// With `directions == 0` the space is linear and the distance is the plain
/// absolute difference.
pub fn move_distance(a: u32, b: u32, directions: u32) -> u32 {
    let diff = a.abs_diff(b);
    if directions == 0 {
        return diff;
    }
    let diff = diff % directions;
    diff.min(directions - diff)
}

/// Follows `moves` from `start` through caller-supplied move maps
///
/// `move_map(node)` returns the expanded moves of `node` and the child each
/// leads to. An exact match is followed directly; otherwise the nearest
/// move within `tolerance` is taken, lowest move on ties. Returns
/// [`NodeId::NONE`] once a node has no children or no move is close enough.
pub fn traverse_fuzzy<F>(
    start: NodeId,
    moves: &[u32],
    mut move_map: F,
    tolerance: u32,
    directions: u32,
) -> NodeId
where
    F: FnMut(NodeId) -> BTreeMap<u32, NodeId>,
{
    let mut current = start;

    for &wanted in moves {
        let children = move_map(current);
        if children.is_empty() {
            return NodeId::NONE;
        }

        if let Some(&child) = children.get(&wanted) {
            current = child;
            continue;
        }

        let nearest = children
            .iter()
            .map(|(&mv, &child)| (move_distance(mv, wanted, directions), child))
            .filter(|&(dist, _)| dist <= tolerance)
            .min_by_key(|&(dist, _)| dist);

        match nearest {
            Some((dist, child)) => {
                trace!("fuzzy move {} matched at distance {}", wanted, dist);
                current = child;
            }
            None => return NodeId::NONE,
        }
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_moves(node: NodeId) -> BTreeMap<u32, NodeId> {
        if node == NodeId(0) {
            // 0 = N, 2 = E
            BTreeMap::from([(0, NodeId(1)), (2, NodeId(2))])
        } else {
            BTreeMap::new()
        }
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            traverse_fuzzy(NodeId(0), &[0], root_moves, 1, DEFAULT_DIRECTIONS),
            NodeId(1)
        );
    }

    #[test]
    fn test_neighbouring_move_ties_go_to_lowest() {
        // 1 (NE) is one step from both N and E
        assert_eq!(
            traverse_fuzzy(NodeId(0), &[1], root_moves, 1, DEFAULT_DIRECTIONS),
            NodeId(1)
        );
    }

    #[test]
    fn test_wraps_around() {
        // 7 (NW) is one step from 0 (N)
        assert_eq!(
            traverse_fuzzy(NodeId(0), &[7], root_moves, 1, DEFAULT_DIRECTIONS),
            NodeId(1)
        );
    }

    #[test]
    fn test_lost_when_out_of_tolerance() {
        assert_eq!(
            traverse_fuzzy(NodeId(0), &[5], root_moves, 1, DEFAULT_DIRECTIONS),
            NodeId::NONE
        );
    }

    #[test]
    fn test_lost_past_leaf() {
        assert_eq!(
            traverse_fuzzy(NodeId(0), &[0, 0], root_moves, 1, DEFAULT_DIRECTIONS),
            NodeId::NONE
        );
    }

    #[test]
    fn test_empty_sequence_stays_put() {
        assert_eq!(
            traverse_fuzzy(NodeId(0), &[], root_moves, 1, DEFAULT_DIRECTIONS),
            NodeId(0)
        );
    }

    #[test]
    fn test_linear_distance() {
        assert_eq!(move_distance(1, 7, 8), 2);
        assert_eq!(move_distance(1, 7, 0), 6);
    }
}
