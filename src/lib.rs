// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG evaluation pipeline
//!
//! Turns a declarative tree of boolean operations over primitive solids
//! into, on one path, a normalized tree and flat product list for
//! stencil-buffer preview rendering, and on the other, a minimal sequence
//! of exact boolean operations producing a single exportable solid.
//! Parsing, rasterization, export codecs, and the exact kernel itself live
//! elsewhere; the kernel is injected through the [`exact::Solid`]
//! capability trait.

pub mod exact;
pub mod geometry;
pub mod products;
pub mod progress;
pub mod tree;

pub use exact::{apply_boolean_reduce, ExactEvaluator, ExactOp, GeometrySource, Solid};
pub use geometry::{BoundingBox, Mesh};
pub use products::{Product, Products};
pub use progress::{Cancelled, ProgressContext};
pub use tree::{CsgLeaf, CsgNode, CsgOp, CsgTree, Normalizer};

/// A normalized preview compile: the flattened products plus whether the
/// normalizer hit its node limit along the way.
#[derive(Debug, Clone)]
pub struct PreviewCompile {
    pub products: Products,
    pub aborted: bool,
}

/// Main entry point for the preview path: normalize a tree and flatten it
/// into render products. An aborted normalization still yields a usable
/// (possibly incomplete) product list; the flag tells the caller to surface
/// a warning instead of failing the compile.
pub fn compile_preview(tree: CsgTree, node_limit: usize) -> PreviewCompile {
    let mut normalizer = Normalizer::new(node_limit);
    let normalized = normalizer.normalize(tree);
    PreviewCompile {
        products: Products::import(&normalized),
        aborted: normalizer.aborted(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_compile_preview_single_leaf() {
        let tree = CsgTree::from(CsgNode::leaf(CsgLeaf::new(Arc::new(Mesh::empty()))));
        let compile = compile_preview(tree, 1000);
        assert!(!compile.aborted);
        assert_eq!(compile.products.len(), 1);
    }
}
