// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG tree normalization
//!
//! Rewrites an arbitrary boolean tree into a union of intersection and
//! difference chains, the form the stencil-buffer preview renderer consumes.
//! The rewrite rules follow Goldfeather, Molnar, Turk and Fuchs, "Near
//! real-time CSG rendering using tree normalization and geometric pruning"
//! (IEEE CG&A, 1989).
//!
//! Source trees are user-generated and can be arbitrarily deep, so the
//! traversal keeps its own frame stack on the heap instead of recursing;
//! the only bound on tree size is the configurable node limit.

use super::node::{
    collapse_null_terms, count_operations, CsgNode, CsgOp, CsgOperation, CsgTree, NodeChild,
};
use tracing::warn;

/// Node limit applied when none is configured explicitly.
pub const DEFAULT_NODE_LIMIT: usize = 100_000;

/// Per-run rewrite accounting. The counter only ever grows: it charges every
/// operation node visited and every node a rewrite creates, including
/// transient ones that later collapse away.
struct NormalizeState {
    nodecount: usize,
    limit: usize,
    aborted: bool,
}

impl NormalizeState {
    fn new(limit: usize) -> Self {
        Self {
            nodecount: 0,
            limit,
            aborted: false,
        }
    }

    fn ok(&self) -> bool {
        !self.aborted
    }

    fn charge(&mut self, nodes: usize) {
        self.nodecount += nodes;
        if !self.aborted && self.nodecount > self.limit {
            self.aborted = true;
            warn!(
                limit = self.limit,
                nodes = self.nodecount,
                "CSG tree grew past the node limit, aborting normalization"
            );
        }
    }

    fn visit(&mut self) {
        self.charge(1);
    }

    fn created(&mut self, nodes: usize) {
        self.charge(nodes);
    }
}

/// Rewrites CSG trees into union-of-chains normal form.
///
/// The node limit is fixed at construction; whether the last `normalize`
/// call ran out of nodes is observable through [`Normalizer::aborted`].
pub struct Normalizer {
    limit: usize,
    aborted: bool,
}

impl Normalizer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            aborted: false,
        }
    }

    /// Whether the most recent [`Normalizer::normalize`] call hit the node
    /// limit and returned a truncated result.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Normalize a tree. An input that denotes the empty solid normalizes
    /// to an empty tree; so does a run that exceeds the node limit, except
    /// that the latter warns and sets the abort flag. Either way the
    /// returned tree never contains an operation with a missing child.
    pub fn normalize(&mut self, tree: CsgTree) -> CsgTree {
        let mut state = NormalizeState::new(self.limit);
        let mut root = normalize_pass(tree.into_root(), &mut state);
        if state.aborted {
            root = cleanup_term(root);
        }
        self.aborted = state.aborted;
        CsgTree::new(root)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_LIMIT)
    }
}

/// A suspended ancestor during the explicit-stack traversal. While a child
/// subtree is being rewritten, its slot in `node` is vacated and
/// `came_from_left` records which slot the result must be spliced into.
struct Frame {
    node: CsgOperation,
    came_from_left: bool,
}

/// Two-phase worklist traversal, equivalent to post-order recursion with
/// rule application interleaved at every node: push a frame, rewrite and
/// descend into the left child, then the right, and splice each rewritten
/// subtree back into its parent on the way up.
fn normalize_pass(root: NodeChild, state: &mut NormalizeState) -> NodeChild {
    let mut stack: Vec<Frame> = Vec::new();
    let mut current = root;

    'descend: loop {
        // Walk down: rewrite the current node to a fixpoint, then step into
        // its left child.
        loop {
            current = rewrite_fixpoint(current, state);
            if state.aborted {
                return unwind_aborted(stack, current);
            }
            match current.take() {
                None => break,
                Some(node) => match *node {
                    CsgNode::Leaf(leaf) => {
                        current = Some(Box::new(CsgNode::Leaf(leaf)));
                        break;
                    }
                    CsgNode::Operation(mut operation) => {
                        state.visit();
                        if state.aborted {
                            current = Some(Box::new(CsgNode::Operation(operation)));
                            return unwind_aborted(stack, current);
                        }
                        let left = operation.left.take();
                        stack.push(Frame {
                            node: operation,
                            came_from_left: true,
                        });
                        current = left;
                    }
                },
            }
        }

        // Walk up: splice the rewritten subtree into the waiting parent.
        loop {
            let Some(mut frame) = stack.pop() else {
                return current;
            };
            if frame.came_from_left {
                frame.node.left = current;
                if ready_for_right(&frame.node) {
                    let right = frame.node.right.take();
                    frame.came_from_left = false;
                    stack.push(frame);
                    current = right;
                } else {
                    // The rewritten left child re-enables distribution at
                    // this node; run it through the rewrite phase again.
                    current = Some(Box::new(CsgNode::Operation(frame.node)));
                }
                continue 'descend;
            }
            frame.node.right = current;
            current = collapse_null_terms(frame.node);
        }
    }
}

/// After the left child is rewritten, a node cycles through the rewrite
/// phase again until it is a union, or its right operand has nothing left
/// to push down while the left operand is not a union awaiting
/// distribution.
fn ready_for_right(node: &CsgOperation) -> bool {
    if node.op == CsgOp::Union {
        return true;
    }
    let right_settled = match node.right.as_deref() {
        None => true,
        Some(child) => child.is_leaf(),
    };
    let left_is_union = matches!(
        node.left.as_deref(),
        Some(CsgNode::Operation(op)) if op.op == CsgOp::Union
    );
    right_settled && !left_is_union
}

/// Stitch suspended frames back into a single tree after an abort. No
/// further rewriting happens; `cleanup_term` repairs the result.
fn unwind_aborted(mut stack: Vec<Frame>, current: NodeChild) -> NodeChild {
    let mut subtree = current;
    while let Some(mut frame) = stack.pop() {
        if frame.came_from_left {
            frame.node.left = subtree;
        } else {
            frame.node.right = subtree;
        }
        subtree = Some(Box::new(CsgNode::Operation(frame.node)));
    }
    subtree
}

/// Apply the rewrite rules at one node until none matches. Collapses of
/// vanished operands are applied first so the rules never see a gap; once
/// the state reports an abort no new nodes are created.
fn rewrite_fixpoint(mut current: NodeChild, state: &mut NormalizeState) -> NodeChild {
    loop {
        let Some(node) = current.take() else {
            return None;
        };
        let operation = match *node {
            leaf @ CsgNode::Leaf(_) => return Some(Box::new(leaf)),
            CsgNode::Operation(operation) => operation,
        };

        if operation.left.is_none() || operation.right.is_none() {
            current = collapse_null_terms(operation);
            continue;
        }

        let mut operation = operation;
        if collapse_child_gap(&mut operation.left) | collapse_child_gap(&mut operation.right) {
            current = Some(Box::new(CsgNode::Operation(operation)));
            continue;
        }

        if !state.ok() {
            return Some(Box::new(CsgNode::Operation(operation)));
        }

        match try_right_rules(operation, state) {
            Applied::Rewritten(node) => {
                current = Some(node);
                continue;
            }
            Applied::Unchanged(operation) => match try_left_rules(operation, state) {
                Applied::Rewritten(node) => {
                    current = Some(node);
                    continue;
                }
                Applied::Unchanged(operation) => {
                    return Some(Box::new(CsgNode::Operation(operation)));
                }
            },
        }
    }
}

/// Collapse a child that is itself an operation with a missing operand.
/// Returns true if the slot changed.
fn collapse_child_gap(slot: &mut NodeChild) -> bool {
    let gap = matches!(
        slot.as_deref(),
        Some(CsgNode::Operation(op)) if op.left.is_none() || op.right.is_none()
    );
    if !gap {
        return false;
    }
    if let Some(boxed) = slot.take() {
        if let CsgNode::Operation(operation) = *boxed {
            *slot = collapse_null_terms(operation);
        }
    }
    true
}

enum Applied {
    Rewritten(Box<CsgNode>),
    Unchanged(CsgOperation),
}

/// Distribution rules keyed on the right child's operator:
///
/// 1. `x − (y ∪ z)` → `(x − y) − z`
/// 2. `x ∩ (y ∪ z)` → `(x ∩ y) ∪ (x ∩ z)`
/// 3. `x − (y ∩ z)` → `(x − y) ∪ (x − z)`
/// 4. `x ∩ (y ∩ z)` → `(x ∩ y) ∩ z`
/// 5. `x − (y − z)` → `(x − y) ∪ (x ∩ z)`
/// 6. `x ∩ (y − z)` → `(x ∩ y) − z`
fn try_right_rules(node: CsgOperation, state: &mut NormalizeState) -> Applied {
    use CsgOp::{Difference, Intersection, Union};

    if node.op == Union {
        return Applied::Unchanged(node);
    }
    let CsgOperation { op, left: x, right } = node;
    let right = match right {
        Some(right) => right,
        None => return Applied::Unchanged(CsgOperation { op, left: x, right: None }),
    };
    let r = match *right {
        CsgNode::Operation(r) if r.left.is_some() && r.right.is_some() => r,
        other => {
            return Applied::Unchanged(CsgOperation {
                op,
                left: x,
                right: Some(Box::new(other)),
            })
        }
    };
    let (y, z) = (r.left, r.right);

    let rewritten = match (op, r.op) {
        (Difference, Union) => {
            state.created(2);
            CsgNode::operation(Difference, Some(CsgNode::operation(Difference, x, y)), z)
        }
        (Intersection, Union) => {
            let x2 = duplicate(&x, state);
            state.created(2);
            CsgNode::operation(
                Union,
                Some(CsgNode::operation(Intersection, x, y)),
                Some(CsgNode::operation(Intersection, x2, z)),
            )
        }
        (Difference, Intersection) => {
            let x2 = duplicate(&x, state);
            state.created(2);
            CsgNode::operation(
                Union,
                Some(CsgNode::operation(Difference, x, y)),
                Some(CsgNode::operation(Difference, x2, z)),
            )
        }
        (Intersection, Intersection) => {
            state.created(2);
            CsgNode::operation(
                Intersection,
                Some(CsgNode::operation(Intersection, x, y)),
                z,
            )
        }
        (Difference, Difference) => {
            let x2 = duplicate(&x, state);
            state.created(2);
            CsgNode::operation(
                Union,
                Some(CsgNode::operation(Difference, x, y)),
                Some(CsgNode::operation(Intersection, x2, z)),
            )
        }
        (Intersection, Difference) => {
            state.created(2);
            CsgNode::operation(Difference, Some(CsgNode::operation(Intersection, x, y)), z)
        }
        (Union, _) => {
            // Unions have no right-hand rewrites; handled above.
            return Applied::Unchanged(CsgOperation {
                op,
                left: x,
                right: Some(Box::new(CsgNode::Operation(CsgOperation {
                    op: r.op,
                    left: y,
                    right: z,
                }))),
            });
        }
    };
    Applied::Rewritten(rewritten)
}

/// Distribution rules keyed on the left child's operator:
///
/// 7. `(x − y) ∩ z` → `(x ∩ z) − y`
/// 8. `(x ∪ y) − z` → `(x − z) ∪ (y − z)`
/// 9. `(x ∪ y) ∩ z` → `(x ∩ z) ∪ (y ∩ z)`
fn try_left_rules(node: CsgOperation, state: &mut NormalizeState) -> Applied {
    use CsgOp::{Difference, Intersection, Union};

    if node.op == Union {
        return Applied::Unchanged(node);
    }
    let CsgOperation { op, left, right: z } = node;
    let left = match left {
        Some(left) => left,
        None => return Applied::Unchanged(CsgOperation { op, left: None, right: z }),
    };
    let l = match *left {
        CsgNode::Operation(l) if l.left.is_some() && l.right.is_some() => l,
        other => {
            return Applied::Unchanged(CsgOperation {
                op,
                left: Some(Box::new(other)),
                right: z,
            })
        }
    };
    let (x, y) = (l.left, l.right);

    let rewritten = match (op, l.op) {
        (Intersection, Difference) => {
            state.created(2);
            CsgNode::operation(Difference, Some(CsgNode::operation(Intersection, x, z)), y)
        }
        (Difference, Union) => {
            let z2 = duplicate(&z, state);
            state.created(2);
            CsgNode::operation(
                Union,
                Some(CsgNode::operation(Difference, x, z)),
                Some(CsgNode::operation(Difference, y, z2)),
            )
        }
        (Intersection, Union) => {
            let z2 = duplicate(&z, state);
            state.created(2);
            CsgNode::operation(
                Union,
                Some(CsgNode::operation(Intersection, x, z)),
                Some(CsgNode::operation(Intersection, y, z2)),
            )
        }
        (parent_op, child_op) => {
            // Left-nested intersections and differences are already in
            // chain form.
            return Applied::Unchanged(CsgOperation {
                op: parent_op,
                left: Some(Box::new(CsgNode::Operation(CsgOperation {
                    op: child_op,
                    left: x,
                    right: y,
                }))),
                right: z,
            });
        }
    };
    Applied::Rewritten(rewritten)
}

/// Deep-copy an operand that a rule places in two positions. Leaf geometry
/// is shared, so the copy only duplicates tree structure; its operation
/// nodes are charged against the limit like any other created nodes.
fn duplicate(child: &NodeChild, state: &mut NormalizeState) -> NodeChild {
    let copy = child.clone();
    if let Some(node) = copy.as_deref() {
        state.created(count_operations(node));
    }
    copy
}

/// Post-order repair pass used after an abort: collapses every operation
/// left with a missing child so callers never see one. Same explicit-stack
/// scheme as the main traversal, without any rewriting.
fn cleanup_term(root: NodeChild) -> NodeChild {
    let mut stack: Vec<Frame> = Vec::new();
    let mut current = root;

    'descend: loop {
        while let Some(node) = current.take() {
            match *node {
                leaf @ CsgNode::Leaf(_) => {
                    current = Some(Box::new(leaf));
                    break;
                }
                CsgNode::Operation(mut operation) => {
                    let left = operation.left.take();
                    stack.push(Frame {
                        node: operation,
                        came_from_left: true,
                    });
                    current = left;
                }
            }
        }

        loop {
            let Some(mut frame) = stack.pop() else {
                return current;
            };
            if frame.came_from_left {
                frame.node.left = current;
                let right = frame.node.right.take();
                frame.came_from_left = false;
                stack.push(frame);
                current = right;
                continue 'descend;
            }
            frame.node.right = current;
            current = collapse_null_terms(frame.node);
        }
    }
}
