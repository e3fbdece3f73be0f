// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG tree module
//!
//! The boolean node model and the normalizer that rewrites arbitrary trees
//! into the union-of-chains form the preview renderer expects.

pub mod node;
mod normalize;

pub use node::{
    collapse_null_terms, count_operations, Color, CsgLeaf, CsgNode, CsgOp, CsgOperation, CsgTree,
    LeafFlags, NodeChild, Transform,
};
pub use normalize::{Normalizer, DEFAULT_NODE_LIMIT};
