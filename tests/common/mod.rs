// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Lattice-set stand-in for the exact kernel
//!
//! A solid is a finite set of integer lattice cells, so every boolean
//! operator has exact set semantics and results can be compared for
//! set-equality. Meshes convert by rounding vertex positions to cells,
//! which is lossless for the integer-aligned test meshes built here.

use csgpipe::geometry::{Mesh, Vertex};
use csgpipe::{BoundingBox, Solid};
use nalgebra::{Point3, Vector3};
use std::collections::BTreeSet;
use std::sync::Arc;

pub type Cell = [i64; 3];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSolid {
    pub cells: BTreeSet<Cell>,
}

impl GridSolid {
    pub fn from_cells<I: IntoIterator<Item = Cell>>(cells: I) -> Self {
        Self {
            cells: cells.into_iter().collect(),
        }
    }

    /// Filled axis-aligned block of cells, inclusive bounds.
    pub fn block(min: Cell, max: Cell) -> Self {
        let mut cells = BTreeSet::new();
        for x in min[0]..=max[0] {
            for y in min[1]..=max[1] {
                for z in min[2]..=max[2] {
                    cells.insert([x, y, z]);
                }
            }
        }
        Self { cells }
    }
}

impl Solid for GridSolid {
    fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn bounding_box(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for cell in &self.cells {
            bounds.expand_to_include(&Point3::new(cell[0] as f64, cell[1] as f64, cell[2] as f64));
            bounds.expand_to_include(&Point3::new(
                cell[0] as f64 + 1.0,
                cell[1] as f64 + 1.0,
                cell[2] as f64 + 1.0,
            ));
        }
        bounds
    }

    fn facet_count(&self) -> usize {
        self.cells.len()
    }

    fn from_mesh(mesh: &Mesh) -> anyhow::Result<Self> {
        let cells = mesh
            .vertices
            .iter()
            .map(|v| {
                [
                    v.position.x.round() as i64,
                    v.position.y.round() as i64,
                    v.position.z.round() as i64,
                ]
            })
            .collect();
        Ok(Self { cells })
    }

    fn union_with(&self, other: &Self) -> anyhow::Result<Self> {
        Ok(Self {
            cells: self.cells.union(&other.cells).copied().collect(),
        })
    }

    fn intersect_with(&self, other: &Self) -> anyhow::Result<Self> {
        Ok(Self {
            cells: self.cells.intersection(&other.cells).copied().collect(),
        })
    }

    fn subtract(&self, other: &Self) -> anyhow::Result<Self> {
        Ok(Self {
            cells: self.cells.difference(&other.cells).copied().collect(),
        })
    }

    fn minkowski_with(&self, other: &Self) -> anyhow::Result<Self> {
        let mut cells = BTreeSet::new();
        for a in &self.cells {
            for b in &other.cells {
                cells.insert([a[0] + b[0], a[1] + b[1], a[2] + b[2]]);
            }
        }
        Ok(Self { cells })
    }
}

/// Mesh whose vertices sit exactly on the given lattice cells, so
/// `GridSolid::from_mesh` reproduces the set.
pub fn cell_mesh<I: IntoIterator<Item = Cell>>(cells: I) -> Arc<Mesh> {
    let mut mesh = Mesh::new();
    for cell in cells {
        mesh.add_vertex(Vertex::new(
            Point3::new(cell[0] as f64, cell[1] as f64, cell[2] as f64),
            Vector3::z(),
        ));
    }
    Arc::new(mesh)
}

/// Mesh covering a filled block of cells, inclusive bounds.
pub fn block_mesh(min: Cell, max: Cell) -> Arc<Mesh> {
    cell_mesh(GridSolid::block(min, max).cells)
}
