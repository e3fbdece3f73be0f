// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Exact kernel capability
//!
//! The pipeline never looks inside the robust-arithmetic kernel that
//! performs real boolean surgery; it only needs a handful of capabilities
//! from whatever solid handle the kernel exposes. Kernel failures surface
//! as `anyhow::Error` and are degraded, not propagated, by the combiner.

use crate::geometry::{BoundingBox, Mesh};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Operators understood by the exact kernel. Minkowski sums exist only on
/// this level; the tree model never produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExactOp {
    Union,
    Intersection,
    Difference,
    Minkowski,
}

impl fmt::Display for ExactOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExactOp::Union => write!(f, "union"),
            ExactOp::Intersection => write!(f, "intersection"),
            ExactOp::Difference => write!(f, "difference"),
            ExactOp::Minkowski => write!(f, "minkowski"),
        }
    }
}

impl From<crate::tree::CsgOp> for ExactOp {
    fn from(op: crate::tree::CsgOp) -> Self {
        match op {
            crate::tree::CsgOp::Union => ExactOp::Union,
            crate::tree::CsgOp::Intersection => ExactOp::Intersection,
            crate::tree::CsgOp::Difference => ExactOp::Difference,
        }
    }
}

/// An opaque solid in the exact kernel's representation.
///
/// `facet_count` is the cheap complexity proxy the combiner sorts by;
/// exact boolean cost grows super-linearly with it, so simpler operands
/// combine first.
pub trait Solid: Sized + Clone {
    fn is_empty(&self) -> bool;

    fn bounding_box(&self) -> BoundingBox;

    fn facet_count(&self) -> usize;

    /// Build a solid from a mesh. Called at most once per operand.
    fn from_mesh(mesh: &Mesh) -> Result<Self>;

    fn union_with(&self, other: &Self) -> Result<Self>;

    fn intersect_with(&self, other: &Self) -> Result<Self>;

    fn subtract(&self, other: &Self) -> Result<Self>;

    fn minkowski_with(&self, other: &Self) -> Result<Self>;

    fn combine(&self, op: ExactOp, other: &Self) -> Result<Self> {
        match op {
            ExactOp::Union => self.union_with(other),
            ExactOp::Intersection => self.intersect_with(other),
            ExactOp::Difference => self.subtract(other),
            ExactOp::Minkowski => self.minkowski_with(other),
        }
    }
}

/// Where an operand currently lives: still a mesh in local memory, or
/// already converted into the kernel's representation. Conversion is
/// deferred so that disjoint mesh operands can be concatenated without ever
/// paying for it.
#[derive(Debug, Clone)]
pub enum GeometrySource<S> {
    Mesh(Arc<Mesh>),
    Solid(S),
}

impl<S: Solid> GeometrySource<S> {
    pub fn is_empty(&self) -> bool {
        match self {
            GeometrySource::Mesh(mesh) => mesh.is_empty(),
            GeometrySource::Solid(solid) => solid.is_empty(),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            GeometrySource::Mesh(mesh) => mesh.bounding_box(),
            GeometrySource::Solid(solid) => solid.bounding_box(),
        }
    }

    /// Convert into the kernel representation; a no-op for operands that
    /// already are.
    pub fn into_solid(self) -> Result<S> {
        match self {
            GeometrySource::Mesh(mesh) => S::from_mesh(&mesh),
            GeometrySource::Solid(solid) => Ok(solid),
        }
    }
}
