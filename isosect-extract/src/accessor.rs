//! Geometric queries over a volume for marching cubes
//!
//! All coordinates are global voxel indices: a cube is addressed by its
//! minimum corner, and edge ids are computed against the global grid so that
//! every section of the same volume agrees on them.

use crate::tables::CubeTables;
use isosect_core::{Point3f, Vector3f, Volume};
use ndarray::ArrayView1;

/// Volume-wide numbering of lattice edges
///
/// Edges parallel to x, y and z occupy three consecutive, disjoint ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeIndexer {
    dims: [u64; 3],
    x_edges: u64,
    xy_edges: u64,
}

impl EdgeIndexer {
    /// Create an indexer for a grid of the given dimensions
    pub fn new(dims: [usize; 3]) -> Self {
        let [nx, ny, nz] = dims.map(|d| d as u64);
        let x_edges = nx.saturating_sub(1) * ny * nz;
        let xy_edges = x_edges + nx * ny.saturating_sub(1) * nz;
        Self {
            dims: [nx, ny, nz],
            x_edges,
            xy_edges,
        }
    }

    /// Total number of lattice edges in the grid
    pub fn edge_count(&self) -> u64 {
        let [nx, ny, nz] = self.dims;
        self.xy_edges + nx * ny * nz.saturating_sub(1)
    }

    /// Id of the edge starting at voxel `origin` and running along `axis`
    pub fn lattice_edge_id(&self, origin: [usize; 3], axis: usize) -> u64 {
        let [x, y, z] = origin.map(|c| c as u64);
        let [nx, ny, _] = self.dims;
        match axis {
            0 => x + (nx - 1) * (y + ny * z),
            1 => self.x_edges + x + nx * (y + (ny - 1) * z),
            _ => self.xy_edges + x + nx * (y + ny * z),
        }
    }

    /// Voxel endpoints (lower first) of an edge id, `None` if out of range
    pub fn edge_endpoints(&self, edge_id: u64) -> Option<([usize; 3], [usize; 3])> {
        if edge_id >= self.edge_count() {
            return None;
        }
        let [nx, ny, _] = self.dims;
        let (axis, local, row) = if edge_id < self.x_edges {
            (0, edge_id, nx - 1)
        } else if edge_id < self.xy_edges {
            (1, edge_id - self.x_edges, nx)
        } else {
            (2, edge_id - self.xy_edges, nx)
        };
        let rows = if axis == 1 { ny - 1 } else { ny };

        let x = local % row;
        let y = (local / row) % rows;
        let z = local / (row * rows);

        let start = [x as usize, y as usize, z as usize];
        let mut end = start;
        end[axis] += 1;
        Some((start, end))
    }
}

/// Read-only cube queries over a volume region
#[derive(Debug, Clone, Copy)]
pub struct CubeAccessor<'a> {
    volume: &'a Volume,
    tables: &'a CubeTables,
    indexer: EdgeIndexer,
}

impl<'a> CubeAccessor<'a> {
    pub fn new(volume: &'a Volume, tables: &'a CubeTables) -> Self {
        Self {
            volume,
            tables,
            indexer: EdgeIndexer::new(volume.dims()),
        }
    }

    pub fn volume(&self) -> &'a Volume {
        self.volume
    }

    pub fn indexer(&self) -> &EdgeIndexer {
        &self.indexer
    }

    /// Scalar values of the eight corners of cube `(x, y, z)`
    pub fn corner_values(&self, x: usize, y: usize, z: usize) -> [f32; 8] {
        self.tables.corner_offsets.map(|[dx, dy, dz]| self.volume.value(x + dx, y + dy, z + dz))
    }

    /// World positions of the eight corners of cube `(x, y, z)`
    pub fn corner_positions(&self, x: usize, y: usize, z: usize) -> [Point3f; 8] {
        self.tables
            .corner_offsets
            .map(|[dx, dy, dz]| self.volume.grid_to_world(x + dx, y + dy, z + dz))
    }

    /// Gradients at the eight corners of cube `(x, y, z)`
    pub fn corner_gradients(&self, x: usize, y: usize, z: usize) -> [Vector3f; 8] {
        self.tables
            .corner_offsets
            .map(|[dx, dy, dz]| self.gradient(x + dx, y + dy, z + dz))
    }

    /// Finite difference gradient at a voxel
    ///
    /// Central differences inside the volume, one-sided at its faces.
    pub fn gradient(&self, x: usize, y: usize, z: usize) -> Vector3f {
        let dims = self.volume.dims();
        let spacing = self.volume.spacing();
        let p = [x, y, z];
        let mut grad = Vector3f::zeros();

        for axis in 0..3 {
            if dims[axis] < 2 {
                continue;
            }
            let mut lo = p;
            let mut hi = p;
            if p[axis] > 0 {
                lo[axis] -= 1;
            }
            if p[axis] + 1 < dims[axis] {
                hi[axis] += 1;
            }
            let run = (hi[axis] - lo[axis]) as f32 * spacing[axis];
            let rise = self.volume.value(hi[0], hi[1], hi[2]) - self.volume.value(lo[0], lo[1], lo[2]);
            grad[axis] = rise / run;
        }

        grad
    }

    /// Global id of edge `edge` (0..12) of cube `(x, y, z)`
    pub fn global_edge_id(&self, x: usize, y: usize, z: usize, edge: usize) -> u64 {
        let [dx, dy, dz] = self.tables.edge_origin(edge);
        self.indexer
            .lattice_edge_id([x + dx, y + dy, z + dz], self.tables.edge_axis(edge))
    }

    /// Buffer the four sample rows under cubes `x_begin..x_end` of row `(y, z)`
    pub fn row_buffer(&self, y: usize, z: usize, x_begin: usize, x_end: usize) -> RowBuffer<'a> {
        let start = x_begin - self.volume.extent().begin[0];
        let len = x_end - x_begin + 1;
        let row = |y: usize, z: usize| self.volume.row(y, z).slice_move(ndarray::s![start..start + len]);

        RowBuffer {
            x_begin,
            corner_offsets: self.tables.corner_offsets,
            rows: [row(y, z), row(y + 1, z), row(y, z + 1), row(y + 1, z + 1)],
        }
    }
}

/// Sample rows shared by consecutive cubes along x
///
/// Holds rows `(y, z)`, `(y + 1, z)`, `(y, z + 1)` and `(y + 1, z + 1)`, so
/// each cube's corner values come from two adjacent entries per row instead
/// of eight scattered volume lookups. Corners follow the order of the
/// tables the buffer was created with.
#[derive(Debug, Clone)]
pub struct RowBuffer<'a> {
    x_begin: usize,
    corner_offsets: &'static [[usize; 3]; 8],
    rows: [ArrayView1<'a, f32>; 4],
}

impl RowBuffer<'_> {
    /// Corner values of cube `(x, y, z)`, identical to [`CubeAccessor::corner_values`]
    pub fn corner_values(&self, x: usize) -> [f32; 8] {
        let i = x - self.x_begin;
        self.corner_offsets.map(|[dx, dy, dz]| self.rows[dy + 2 * dz][i + dx])
    }
}
