// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Disjoint-merge planning
//!
//! Exact boolean unions are expensive, but solids whose bounding boxes do
//! not touch can be concatenated into one multi-volume mesh for free. The
//! planner partitions union operands into groups whose members are mutually
//! box-disjoint, so each group costs at most one kernel conversion instead
//! of one kernel boolean per operand.

use super::solid::{GeometrySource, Solid};
use crate::geometry::{BoundingBox, Mesh};
use std::sync::Arc;
use tracing::debug;

/// Indices of planner-input solids whose bounding boxes are pairwise
/// disjoint, safe to concatenate as one union operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    pub members: Vec<usize>,
}

/// Partition solids (given by bounding box) into groups of mutually
/// box-disjoint members.
///
/// Groups are built one at a time: the lowest-indexed unplaced solid that is
/// not forbidden for the open group joins it, and every unplaced solid whose
/// box intersects the newcomer becomes forbidden for this group. When no
/// candidate remains the group closes and the forbidden set resets. Every
/// index lands in exactly one group, and each outer round places at least
/// one solid, so the loop terminates.
pub fn plan_disjoint_groups(bounds: &[BoundingBox]) -> Vec<MergeGroup> {
    let n = bounds.len();
    let mut placed = vec![false; n];
    let mut remaining = n;
    let mut groups = Vec::new();

    while remaining > 0 {
        let mut forbidden = vec![false; n];
        let mut members = Vec::new();

        while let Some(next) = (0..n).find(|&i| !placed[i] && !forbidden[i]) {
            placed[next] = true;
            remaining -= 1;
            members.push(next);

            for other in 0..n {
                if !placed[other] && bounds[other].intersects(&bounds[next]) {
                    forbidden[other] = true;
                }
            }
        }

        groups.push(MergeGroup { members });
    }

    debug!(
        solids = n,
        groups = groups.len(),
        "planned disjoint merge groups"
    );
    groups
}

/// Rewrite union operands through the planner: each group's mesh members
/// are concatenated into a single multi-volume source. Operands already in
/// the kernel representation pass through individually, since the kernel
/// capability has no cheap concatenation.
pub fn merge_disjoint_sources<S: Solid>(sources: Vec<GeometrySource<S>>) -> Vec<GeometrySource<S>> {
    if sources.len() < 2 {
        return sources;
    }

    let bounds: Vec<BoundingBox> = sources.iter().map(GeometrySource::bounding_box).collect();
    let groups = plan_disjoint_groups(&bounds);

    let mut slots: Vec<Option<GeometrySource<S>>> = sources.into_iter().map(Some).collect();
    let mut merged = Vec::with_capacity(groups.len());

    for group in groups {
        let mut batch: Option<Mesh> = None;
        for index in group.members {
            match slots[index].take() {
                Some(GeometrySource::Mesh(mesh)) => {
                    batch
                        .get_or_insert_with(Mesh::new)
                        .merge(&mesh);
                }
                Some(solid @ GeometrySource::Solid(_)) => merged.push(solid),
                None => {}
            }
        }
        if let Some(batch) = batch {
            merged.push(GeometrySource::Mesh(Arc::new(batch)));
        }
    }
    merged
}
