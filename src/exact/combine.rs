// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Cost-ordered boolean reduction
//!
//! Exact boolean kernels are super-linear in operand complexity, so the
//! combiner always merges the two simplest solids first: a priority queue
//! keyed by facet count, tie-broken by the progress mark assigned at push
//! time, reduces the batch to a single solid.
//!
//! For large batches [`reduce_parallel`] fans whole rounds of pairwise
//! combinations out to rayon workers. Pairs are taken in input order, not
//! cost order, so the two paths can combine operands in different pairings;
//! union and intersection are associative and commutative up to the
//! kernel's exactness guarantees, which makes the results boolean-equal
//! while intermediate solids may differ bit-for-bit.

use super::solid::{ExactOp, GeometrySource, Solid};
use crate::progress::{Cancelled, ProgressContext};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, error};

/// Heap entry: the facet count is sampled once at push time, and the mark
/// makes the ordering total and stable.
struct QueueItem<S> {
    facets: usize,
    mark: u64,
    solid: S,
}

impl<S> QueueItem<S> {
    fn new(solid: S, mark: u64) -> Self
    where
        S: Solid,
    {
        Self {
            facets: solid.facet_count(),
            mark,
            solid,
        }
    }
}

impl<S> PartialEq for QueueItem<S> {
    fn eq(&self, other: &Self) -> bool {
        self.facets == other.facets && self.mark == other.mark
    }
}

impl<S> Eq for QueueItem<S> {}

impl<S> PartialOrd for QueueItem<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for QueueItem<S> {
    // Inverted so the max-heap pops the cheapest solid first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .facets
            .cmp(&self.facets)
            .then_with(|| other.mark.cmp(&self.mark))
    }
}

/// Reduce a batch of operands to a single solid with `op`, cheapest pairs
/// first. `Ok(None)` is the empty solid.
///
/// An intersection short-circuits to empty as soon as any operand is known
/// empty, before anything is converted. Kernel failures are logged and
/// degrade the affected sub-result to empty; only cancellation propagates.
pub fn reduce<S: Solid>(
    sources: Vec<GeometrySource<S>>,
    op: ExactOp,
    ctx: &ProgressContext,
) -> Result<Option<S>, Cancelled> {
    if op == ExactOp::Intersection && sources.iter().any(GeometrySource::is_empty) {
        return Ok(None);
    }

    let mut queue = BinaryHeap::with_capacity(sources.len());
    for source in sources {
        ctx.tick("converting solids")?;
        match convert(source, op) {
            Converted::Solid(solid) => queue.push(QueueItem::new(solid, ctx.next_mark())),
            Converted::Empty => {}
            Converted::EmptyIntersection => return Ok(None),
        }
    }
    debug!(op = %op, operands = queue.len(), "reducing solids");

    while queue.len() > 1 {
        ctx.tick("combining solids")?;
        let (Some(a), Some(b)) = (queue.pop(), queue.pop()) else {
            break;
        };
        match a.solid.combine(op, &b.solid) {
            Ok(result) => {
                if result.is_empty() {
                    if op == ExactOp::Intersection {
                        return Ok(None);
                    }
                } else {
                    queue.push(QueueItem::new(result, ctx.next_mark()));
                }
            }
            Err(err) => {
                error!(op = %op, error = %err, "boolean kernel failed, degrading result to empty");
                if op == ExactOp::Intersection {
                    return Ok(None);
                }
            }
        }
    }

    Ok(queue.pop().map(|item| item.solid))
}

/// Reduce a large batch with round-based parallel fan-out.
///
/// Each round pairs the surviving operands in input order and combines the
/// pairs concurrently (at most ⌊n/2⌋ in flight), carrying an odd operand
/// into the next round. Once fewer than four solids remain the tail is
/// finished through the sequential cost-ordered queue. Boolean-equal to
/// [`reduce`]; the pairing order is the only difference.
pub fn reduce_parallel<S: Solid + Send>(
    sources: Vec<GeometrySource<S>>,
    op: ExactOp,
    ctx: &ProgressContext,
) -> Result<Option<S>, Cancelled> {
    if op == ExactOp::Intersection && sources.iter().any(GeometrySource::is_empty) {
        return Ok(None);
    }

    let mut solids = Vec::with_capacity(sources.len());
    for source in sources {
        ctx.tick("converting solids")?;
        match convert(source, op) {
            Converted::Solid(solid) => solids.push(solid),
            Converted::Empty => {}
            Converted::EmptyIntersection => return Ok(None),
        }
    }

    while solids.len() >= 4 {
        ctx.tick("combining solid pairs")?;
        debug!(op = %op, operands = solids.len(), "parallel reduction round");

        let leftover = if solids.len() % 2 == 1 {
            solids.pop()
        } else {
            None
        };

        let mut pairs = Vec::with_capacity(solids.len() / 2);
        let mut drain = solids.into_iter();
        while let (Some(a), Some(b)) = (drain.next(), drain.next()) {
            pairs.push((a, b));
        }

        let results: Vec<Option<S>> = pairs
            .into_par_iter()
            .map(|(a, b)| match a.combine(op, &b) {
                Ok(result) => Some(result),
                Err(err) => {
                    error!(op = %op, error = %err, "boolean kernel failed, degrading result to empty");
                    None
                }
            })
            .collect();

        let mut survivors = Vec::with_capacity(results.len() + 1);
        let mut lost_operand = false;
        for result in results {
            match result {
                Some(solid) if !solid.is_empty() => survivors.push(solid),
                _ => lost_operand = true,
            }
        }
        if lost_operand && op == ExactOp::Intersection {
            return Ok(None);
        }
        survivors.extend(leftover);
        solids = survivors;
    }

    reduce(
        solids.into_iter().map(GeometrySource::Solid).collect(),
        op,
        ctx,
    )
}

enum Converted<S> {
    Solid(S),
    Empty,
    EmptyIntersection,
}

fn convert<S: Solid>(source: GeometrySource<S>, op: ExactOp) -> Converted<S> {
    let solid = match source.into_solid() {
        Ok(solid) => solid,
        Err(err) => {
            error!(op = %op, error = %err, "solid conversion failed, treating operand as empty");
            return if op == ExactOp::Intersection {
                Converted::EmptyIntersection
            } else {
                Converted::Empty
            };
        }
    };
    if solid.is_empty() {
        return if op == ExactOp::Intersection {
            Converted::EmptyIntersection
        } else {
            Converted::Empty
        };
    }
    Converted::Solid(solid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Mesh};
    use anyhow::bail;
    use std::sync::Arc;

    /// Facet arithmetic stand-in for a kernel solid. `history` records the
    /// original facet counts folded into this solid, in combination order,
    /// which makes pairing order observable.
    #[derive(Debug, Clone, PartialEq)]
    struct TallySolid {
        facets: usize,
        history: Vec<usize>,
    }

    impl TallySolid {
        fn new(facets: usize) -> Self {
            Self {
                facets,
                history: vec![facets],
            }
        }

        fn merged(&self, other: &Self, facets: usize) -> Self {
            let mut history = self.history.clone();
            history.extend(&other.history);
            Self { facets, history }
        }
    }

    impl Solid for TallySolid {
        fn is_empty(&self) -> bool {
            self.facets == 0
        }

        fn bounding_box(&self) -> BoundingBox {
            BoundingBox::empty()
        }

        fn facet_count(&self) -> usize {
            self.facets
        }

        fn from_mesh(_mesh: &Mesh) -> anyhow::Result<Self> {
            panic!("these tests never convert meshes");
        }

        fn union_with(&self, other: &Self) -> anyhow::Result<Self> {
            Ok(self.merged(other, self.facets + other.facets))
        }

        fn intersect_with(&self, other: &Self) -> anyhow::Result<Self> {
            Ok(self.merged(other, self.facets.min(other.facets)))
        }

        fn subtract(&self, other: &Self) -> anyhow::Result<Self> {
            Ok(self.merged(other, self.facets.saturating_sub(other.facets)))
        }

        fn minkowski_with(&self, other: &Self) -> anyhow::Result<Self> {
            Ok(self.merged(other, self.facets * other.facets))
        }
    }

    /// A solid whose boolean operations always fail.
    #[derive(Debug, Clone)]
    struct BrokenSolid;

    impl Solid for BrokenSolid {
        fn is_empty(&self) -> bool {
            false
        }

        fn bounding_box(&self) -> BoundingBox {
            BoundingBox::empty()
        }

        fn facet_count(&self) -> usize {
            1
        }

        fn from_mesh(_mesh: &Mesh) -> anyhow::Result<Self> {
            Ok(BrokenSolid)
        }

        fn union_with(&self, _other: &Self) -> anyhow::Result<Self> {
            bail!("degenerate input")
        }

        fn intersect_with(&self, _other: &Self) -> anyhow::Result<Self> {
            bail!("degenerate input")
        }

        fn subtract(&self, _other: &Self) -> anyhow::Result<Self> {
            bail!("degenerate input")
        }

        fn minkowski_with(&self, _other: &Self) -> anyhow::Result<Self> {
            bail!("degenerate input")
        }
    }

    fn sources(facets: &[usize]) -> Vec<GeometrySource<TallySolid>> {
        facets
            .iter()
            .map(|&f| GeometrySource::Solid(TallySolid::new(f)))
            .collect()
    }

    #[test]
    fn test_reduce_combines_cheapest_first() {
        let ctx = ProgressContext::new();
        let result = reduce(sources(&[5, 1, 3, 2]), ExactOp::Union, &ctx)
            .unwrap()
            .unwrap();

        assert_eq!(result.facets, 11);
        // 1+2 first, the combined 3 meets the original 3, then 5 joins.
        assert_eq!(result.history, vec![5, 3, 1, 2]);
    }

    #[test]
    fn test_reduce_is_deterministic() {
        let ctx = ProgressContext::new();
        let first = reduce(sources(&[8, 2, 2, 4, 1]), ExactOp::Union, &ctx)
            .unwrap()
            .unwrap();
        let ctx = ProgressContext::new();
        let second = reduce(sources(&[8, 2, 2, 4, 1]), ExactOp::Union, &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reduce_empty_input_yields_empty() {
        let ctx = ProgressContext::new();
        let result = reduce(sources(&[]), ExactOp::Union, &ctx).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_intersection_short_circuits_before_conversion() {
        // The mesh operand would panic in from_mesh if it were ever
        // converted.
        let ctx = ProgressContext::new();
        let operands: Vec<GeometrySource<TallySolid>> = vec![
            GeometrySource::Mesh(Arc::new(Mesh::empty())),
            GeometrySource::Solid(TallySolid::new(7)),
        ];
        let result = reduce(operands, ExactOp::Intersection, &ctx).unwrap();
        assert!(result.is_none());
        assert_eq!(ctx.steps(), 0);
    }

    #[test]
    fn test_empty_operand_skipped_for_union() {
        let ctx = ProgressContext::new();
        let result = reduce(sources(&[0, 4, 2]), ExactOp::Union, &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(result.facets, 6);
    }

    #[test]
    fn test_kernel_failure_degrades_not_propagates() {
        let ctx = ProgressContext::new();
        let operands: Vec<GeometrySource<BrokenSolid>> = vec![
            GeometrySource::Solid(BrokenSolid),
            GeometrySource::Solid(BrokenSolid),
            GeometrySource::Solid(BrokenSolid),
        ];
        // First pair fails and is dropped; the third operand survives.
        let result = reduce(operands, ExactOp::Union, &ctx).unwrap();
        assert!(result.is_some());

        let ctx = ProgressContext::new();
        let operands: Vec<GeometrySource<BrokenSolid>> =
            vec![GeometrySource::Solid(BrokenSolid), GeometrySource::Solid(BrokenSolid)];
        let result = reduce(operands, ExactOp::Union, &ctx).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_cancellation_propagates() {
        let ctx = ProgressContext::with_hook(Box::new(|_, _| false));
        let result = reduce(sources(&[1, 2]), ExactOp::Union, &ctx);
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    fn test_parallel_matches_sequential_total() {
        let facets = [9, 1, 7, 3, 5, 2, 8, 4];
        let ctx = ProgressContext::new();
        let sequential = reduce(sources(&facets), ExactOp::Union, &ctx)
            .unwrap()
            .unwrap();
        let ctx = ProgressContext::new();
        let parallel = reduce_parallel(sources(&facets), ExactOp::Union, &ctx)
            .unwrap()
            .unwrap();

        // Same boolean result; the pairing (and so the history) may differ.
        assert_eq!(sequential.facets, parallel.facets);
        let mut a = sequential.history.clone();
        let mut b = parallel.history.clone();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_pairs_in_input_order() {
        // One round of 4 pairs, then a sequential tail: the first round must
        // pair neighbours in input order.
        let ctx = ProgressContext::new();
        let result = reduce_parallel(sources(&[4, 1, 2, 3]), ExactOp::Union, &ctx)
            .unwrap()
            .unwrap();
        // Round pairs (4,1) and (2,3); the tail queue combines (5, 5).
        assert!(result.history == vec![4, 1, 2, 3] || result.history == vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_parallel_intersection_short_circuit() {
        let ctx = ProgressContext::new();
        let result =
            reduce_parallel(sources(&[3, 0, 5, 9]), ExactOp::Intersection, &ctx).unwrap();
        assert!(result.is_none());
    }
}
