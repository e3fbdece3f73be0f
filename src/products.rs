// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Flattened render products
//!
//! A normalized tree is a union of chains. Each chain becomes one
//! [`Product`]: the ordered leaves that participate as intersection
//! operands and the ordered leaves subtracted from them. The preview
//! renderer walks products in sequence and relies on the left-to-right
//! order for its stencil counting, so import preserves traversal order.

use crate::geometry::BoundingBox;
use crate::tree::{CsgLeaf, CsgNode, CsgOp, CsgTree};
use serde::{Deserialize, Serialize};

/// One union-term of a normalized tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub intersections: Vec<CsgLeaf>,
    pub subtractions: Vec<CsgLeaf>,
}

impl Product {
    /// Bounds of the term. Subtraction can only carve material away, so
    /// the intersection operands alone bound the product.
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for leaf in &self.intersections {
            bounds.merge(&leaf.bounding_box());
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }
}

/// The ordered product list for one compiled tree, plus its overall bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Products {
    products: Vec<Product>,
    bounds: BoundingBox,
}

impl Products {
    /// Flatten a normalized tree into render products.
    ///
    /// Each subtree is visited under the operator that applies to it: the
    /// left child inherits its parent's operator, the right child takes the
    /// parent's own. A leaf reached under a union opens a new product; under
    /// an intersection it joins the current product's intersections, under a
    /// difference its subtractions.
    pub fn import(tree: &CsgTree) -> Self {
        let mut products = Vec::new();
        if let Some(root) = tree.root() {
            import_node(root, CsgOp::Union, &mut products);
        }
        products.retain(|p| !p.is_empty());

        let mut bounds = BoundingBox::empty();
        for product in &products {
            bounds.merge(&product.bounds());
        }
        Self { products, bounds }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Product> {
        self.products.iter()
    }
}

fn import_node(node: &CsgNode, incoming: CsgOp, products: &mut Vec<Product>) {
    match node {
        CsgNode::Leaf(leaf) => match incoming {
            CsgOp::Union => {
                let mut product = Product::default();
                product.intersections.push(leaf.clone());
                products.push(product);
            }
            CsgOp::Intersection => {
                if let Some(product) = products.last_mut() {
                    product.intersections.push(leaf.clone());
                }
            }
            CsgOp::Difference => {
                if let Some(product) = products.last_mut() {
                    product.subtractions.push(leaf.clone());
                }
            }
        },
        CsgNode::Operation(op) => {
            if let Some(left) = &op.left {
                import_node(left, incoming, products);
            }
            if let Some(right) = &op.right {
                import_node(right, op.op, products);
            }
        }
    }
}
