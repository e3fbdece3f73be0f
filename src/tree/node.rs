// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG node model
//!
//! A binary tree of boolean operations over leaf solids. Leaves share their
//! geometry (`Arc<Mesh>`), so the same primitive can appear at many tree
//! positions under different transforms; operation nodes are uniquely owned
//! because rewriting restructures them in place.

use crate::geometry::{BoundingBox, Mesh};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 4x4 affine transform applied to a leaf's geometry
pub type Transform = nalgebra::Matrix4<f64>;

/// Boolean operators available in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsgOp {
    Union,
    Intersection,
    Difference,
}

impl fmt::Display for CsgOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsgOp::Union => write!(f, "union"),
            CsgOp::Intersection => write!(f, "intersection"),
            CsgOp::Difference => write!(f, "difference"),
        }
    }
}

/// RGBA color attached to a leaf
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgba(0.8, 0.8, 0.8, 1.0)
    }
}

/// Render-contribution flags carried by a leaf
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafFlags {
    pub highlight: bool,
    pub background: bool,
}

/// A primitive solid placed in the tree: shared geometry plus the
/// per-placement transform, color, and flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsgLeaf {
    pub geometry: Arc<Mesh>,
    pub transform: Transform,
    pub color: Color,
    pub flags: LeafFlags,
}

impl CsgLeaf {
    pub fn new(geometry: Arc<Mesh>) -> Self {
        Self {
            geometry,
            transform: Transform::identity(),
            color: Color::default(),
            flags: LeafFlags::default(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_flags(mut self, flags: LeafFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Bounding box of the geometry in tree coordinates.
    pub fn bounding_box(&self) -> BoundingBox {
        self.geometry.bounding_box().transformed(&self.transform)
    }
}

/// A child slot. `None` is the empty operand: an operand that evaluated to
/// nothing (for example an intersection of disjoint solids). Every
/// algorithm over the tree must collapse missing children rather than
/// assume both are present.
pub type NodeChild = Option<Box<CsgNode>>;

/// A boolean operation over two child slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsgOperation {
    pub op: CsgOp,
    pub left: NodeChild,
    pub right: NodeChild,
}

/// A node of the CSG tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CsgNode {
    Leaf(CsgLeaf),
    Operation(CsgOperation),
}

impl CsgNode {
    pub fn leaf(leaf: CsgLeaf) -> Box<CsgNode> {
        Box::new(CsgNode::Leaf(leaf))
    }

    pub fn operation(op: CsgOp, left: NodeChild, right: NodeChild) -> Box<CsgNode> {
        Box::new(CsgNode::Operation(CsgOperation { op, left, right }))
    }

    pub fn union(left: Box<CsgNode>, right: Box<CsgNode>) -> Box<CsgNode> {
        Self::operation(CsgOp::Union, Some(left), Some(right))
    }

    pub fn intersection(left: Box<CsgNode>, right: Box<CsgNode>) -> Box<CsgNode> {
        Self::operation(CsgOp::Intersection, Some(left), Some(right))
    }

    pub fn difference(left: Box<CsgNode>, right: Box<CsgNode>) -> Box<CsgNode> {
        Self::operation(CsgOp::Difference, Some(left), Some(right))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, CsgNode::Leaf(_))
    }

    /// The operator tag, if this is an operation node.
    pub fn operator(&self) -> Option<CsgOp> {
        match self {
            CsgNode::Leaf(_) => None,
            CsgNode::Operation(op) => Some(op.op),
        }
    }
}

/// Collapse an operation node with a missing child.
///
/// A union survives as whichever child is present. A difference survives as
/// its left child when the right is missing, and vanishes when the left is
/// missing (there is nothing to subtract from). An intersection vanishes as
/// soon as either side is missing. Nodes with both children present are
/// returned intact.
pub fn collapse_null_terms(node: CsgOperation) -> NodeChild {
    if node.left.is_some() && node.right.is_some() {
        return Some(Box::new(CsgNode::Operation(node)));
    }
    match node.op {
        CsgOp::Union => node.left.or(node.right),
        CsgOp::Difference => {
            if node.right.is_none() {
                node.left
            } else {
                None
            }
        }
        CsgOp::Intersection => None,
    }
}

/// Number of operation (non-leaf) nodes below and including `node`.
/// Iterative so arbitrarily deep trees cannot exhaust the call stack.
pub fn count_operations(node: &CsgNode) -> usize {
    let mut count = 0;
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if let CsgNode::Operation(op) = n {
            count += 1;
            if let Some(left) = &op.left {
                stack.push(left);
            }
            if let Some(right) = &op.right {
                stack.push(right);
            }
        }
    }
    count
}

/// A CSG tree: an optional root node. An absent root is the empty solid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsgTree {
    root: NodeChild,
}

impl CsgTree {
    pub fn new(root: NodeChild) -> Self {
        Self { root }
    }

    pub fn empty() -> Self {
        Self { root: None }
    }

    pub fn root(&self) -> Option<&CsgNode> {
        self.root.as_deref()
    }

    pub fn into_root(self) -> NodeChild {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of operation nodes in the tree, for reporting and tests.
    pub fn operation_count(&self) -> usize {
        self.root.as_deref().map_or(0, count_operations)
    }
}

impl From<Box<CsgNode>> for CsgTree {
    fn from(root: Box<CsgNode>) -> Self {
        Self { root: Some(root) }
    }
}
