// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Exact evaluation entry points
//!
//! The export path reduces whole trees (or prepared operand lists) to one
//! exact solid. Union batches run through the disjoint-merge planner first,
//! so operands that cannot interact never reach the kernel individually.

use super::combine;
use super::merge::merge_disjoint_sources;
use super::solid::{ExactOp, GeometrySource, Solid};
use crate::progress::{Cancelled, ProgressContext};
use crate::tree::{CsgLeaf, CsgNode, CsgOp, CsgTree, Transform};
use std::sync::Arc;
use tracing::error;

/// Reduce a prepared operand list to one solid. Union operands are
/// disjoint-merged before the cost-ordered reduction; other operators go
/// straight to the combiner, since concatenating disjoint solids is only
/// equivalent to combining them under union.
pub fn apply_boolean_reduce<S: Solid>(
    sources: Vec<GeometrySource<S>>,
    op: ExactOp,
    ctx: &ProgressContext,
) -> Result<Option<S>, Cancelled> {
    let sources = if op == ExactOp::Union {
        merge_disjoint_sources(sources)
    } else {
        sources
    };
    combine::reduce(sources, op, ctx)
}

/// [`apply_boolean_reduce`] with the round-based parallel combiner.
pub fn apply_boolean_reduce_parallel<S: Solid + Send>(
    sources: Vec<GeometrySource<S>>,
    op: ExactOp,
    ctx: &ProgressContext,
) -> Result<Option<S>, Cancelled> {
    let sources = if op == ExactOp::Union {
        merge_disjoint_sources(sources)
    } else {
        sources
    };
    combine::reduce_parallel(sources, op, ctx)
}

/// Evaluates a CSG tree to a single exact solid.
///
/// Runs of nested unions and intersections flatten into one n-ary
/// reduction each; differences fold pairwise left to right, because
/// subtraction is neither associative nor commutative. Leaf operands stay
/// in mesh form until the combiner converts them, which lets the planner
/// concatenate disjoint leaves without kernel involvement.
pub struct ExactEvaluator<'a> {
    ctx: &'a ProgressContext,
    parallel: bool,
}

impl<'a> ExactEvaluator<'a> {
    pub fn new(ctx: &'a ProgressContext) -> Self {
        Self {
            ctx,
            parallel: false,
        }
    }

    /// Use the parallel combiner for union and intersection batches.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluate the whole tree. `Ok(None)` is the empty solid; kernel
    /// failures degrade the affected subtree to empty, and only
    /// cancellation surfaces as an error.
    pub fn evaluate<S: Solid + Send>(&self, tree: &CsgTree) -> Result<Option<S>, Cancelled> {
        match tree.root() {
            None => Ok(None),
            Some(root) => self.evaluate_node(root),
        }
    }

    fn evaluate_node<S: Solid + Send>(&self, node: &CsgNode) -> Result<Option<S>, Cancelled> {
        match node {
            CsgNode::Leaf(leaf) => self.convert_leaf(leaf),
            CsgNode::Operation(operation) => match operation.op {
                CsgOp::Union | CsgOp::Intersection => self.reduce_run(node, operation.op),
                CsgOp::Difference => {
                    let minuend = match &operation.left {
                        Some(left) => self.evaluate_node(left)?,
                        None => None,
                    };
                    let Some(minuend) = minuend else {
                        return Ok(None);
                    };
                    let subtrahend = match &operation.right {
                        Some(right) => self.evaluate_node(right)?,
                        None => None,
                    };
                    let Some(subtrahend) = subtrahend else {
                        return Ok(Some(minuend));
                    };
                    self.ctx.tick("subtracting solids")?;
                    match minuend.subtract(&subtrahend) {
                        Ok(result) => Ok((!result.is_empty()).then_some(result)),
                        Err(err) => {
                            error!(
                                op = %ExactOp::Difference,
                                error = %err,
                                "boolean kernel failed, degrading result to empty"
                            );
                            Ok(None)
                        }
                    }
                }
            },
        }
    }

    /// Flatten a maximal run of `op` nodes and reduce its operands n-ary.
    fn reduce_run<S: Solid + Send>(
        &self,
        node: &CsgNode,
        op: CsgOp,
    ) -> Result<Option<S>, Cancelled> {
        let mut operands = Vec::new();
        let mut saw_gap = false;
        collect_run(node, op, &mut operands, &mut saw_gap);
        if saw_gap && op == CsgOp::Intersection {
            // An operand that evaluated to nothing erases the whole
            // intersection.
            return Ok(None);
        }

        let mut sources: Vec<GeometrySource<S>> = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                CsgNode::Leaf(leaf) => sources.push(leaf_source(leaf)),
                nested => match self.evaluate_node(nested)? {
                    Some(solid) => sources.push(GeometrySource::Solid(solid)),
                    None => {
                        if op == CsgOp::Intersection {
                            return Ok(None);
                        }
                    }
                },
            }
        }

        if self.parallel {
            apply_boolean_reduce_parallel(sources, op.into(), self.ctx)
        } else {
            apply_boolean_reduce(sources, op.into(), self.ctx)
        }
    }

    fn convert_leaf<S: Solid>(&self, leaf: &CsgLeaf) -> Result<Option<S>, Cancelled> {
        if leaf.geometry.is_empty() {
            return Ok(None);
        }
        self.ctx.tick("converting solids")?;
        match leaf_source::<S>(leaf).into_solid() {
            Ok(solid) => Ok((!solid.is_empty()).then_some(solid)),
            Err(err) => {
                error!(error = %err, "solid conversion failed, treating leaf as empty");
                Ok(None)
            }
        }
    }
}

/// Gather the operands of a maximal same-operator run. Missing children are
/// reported through `saw_gap` instead of being pushed.
fn collect_run<'n>(node: &'n CsgNode, op: CsgOp, out: &mut Vec<&'n CsgNode>, saw_gap: &mut bool) {
    match node {
        CsgNode::Operation(operation) if operation.op == op => {
            for child in [&operation.left, &operation.right] {
                match child {
                    Some(child) => collect_run(child, op, out, saw_gap),
                    None => *saw_gap = true,
                }
            }
        }
        other => out.push(other),
    }
}

/// A leaf as a combiner operand: its geometry in tree coordinates, left in
/// mesh form so conversion happens at most once, inside the combiner.
fn leaf_source<S: Solid>(leaf: &CsgLeaf) -> GeometrySource<S> {
    let mesh = if leaf.transform == Transform::identity() {
        Arc::clone(&leaf.geometry)
    } else {
        Arc::new(leaf.geometry.transformed(&leaf.transform))
    };
    GeometrySource::Mesh(mesh)
}
