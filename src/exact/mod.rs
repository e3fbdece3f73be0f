// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Exact evaluation module
//!
//! Everything on the export path: the opaque kernel capability, the
//! disjoint-merge planner, the cost-ordered combiner, and the tree
//! evaluator that wires them together.

mod combine;
mod evaluate;
mod merge;
mod solid;

pub use combine::{reduce, reduce_parallel};
pub use evaluate::{apply_boolean_reduce, apply_boolean_reduce_parallel, ExactEvaluator};
pub use merge::{merge_disjoint_sources, plan_disjoint_groups, MergeGroup};
pub use solid::{ExactOp, GeometrySource, Solid};
