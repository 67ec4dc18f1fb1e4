//! Per-process mesh assembly with vertex deduplication
//!
//! A [`SectionMesher`] accumulates the triangles of every section one process
//! owns. Vertices are keyed by global edge id, so an edge crossed by several
//! cubes of the same process yields a single vertex even when the cubes
//! belong to different sections.

use crate::accessor::CubeAccessor;
use crate::cube::{classify, edges_for_case, interpolate, is_trivial};
use crate::decomposition::Section;
use crate::marching_cubes::ExtractionConfig;
use crate::tables::CubeTables;
use isosect_core::{Error, Result, TriangleMesh, Volume};
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Counters collected while meshing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshingStats {
    pub sections: usize,
    pub cubes_visited: usize,
    pub cubes_intersected: usize,
    pub degenerate_triangles: usize,
}

/// Accumulates one process's mesh across its sections
#[derive(Debug)]
pub struct SectionMesher<'t> {
    config: ExtractionConfig,
    tables: &'t CubeTables,
    mesh: TriangleMesh,
    edge_ids: Vec<u64>,
    point_map: HashMap<u64, usize>,
    stats: MeshingStats,
}

impl<'t> SectionMesher<'t> {
    pub fn new(config: ExtractionConfig, tables: &'t CubeTables) -> Self {
        Self {
            config,
            tables,
            mesh: TriangleMesh::new(),
            edge_ids: Vec::new(),
            point_map: HashMap::new(),
            stats: MeshingStats::default(),
        }
    }

    pub fn stats(&self) -> MeshingStats {
        self.stats
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn face_count(&self) -> usize {
        self.mesh.face_count()
    }

    /// March every cube of `section`, appending to the accumulated mesh
    ///
    /// `volume` must hold the section's ghost extent.
    pub fn process_section(&mut self, volume: &Volume, section: &Section) -> Result<()> {
        let dims = volume.dims();
        let cubes = section.cubes;
        if (0..3).any(|axis| cubes.end[axis] >= dims[axis]) {
            return Err(Error::InvalidData(format!(
                "Section {} cubes {:?} exceed volume dimensions {:?}",
                section.index, cubes, dims
            )));
        }
        let needed = section.ghost_extent(dims);
        if !volume.extent().contains_extent(&needed) {
            return Err(Error::InvalidData(format!(
                "Section {} needs voxels {:?} but the volume holds {:?}",
                section.index,
                needed,
                volume.extent()
            )));
        }

        let accessor = CubeAccessor::new(volume, self.tables);
        let vertices_before = self.mesh.vertex_count();
        let faces_before = self.mesh.face_count();

        for z in cubes.begin[2]..cubes.end[2] {
            for y in cubes.begin[1]..cubes.end[1] {
                let buffer = accessor.row_buffer(y, z, cubes.begin[0], cubes.end[0]);
                for x in cubes.begin[0]..cubes.end[0] {
                    self.process_cube(&accessor, x, y, z, &buffer.corner_values(x));
                }
            }
        }

        self.stats.sections += 1;
        debug!(
            "Section {} {:?}: {} new vertices, {} new triangles",
            section.index,
            section.grid_position,
            self.mesh.vertex_count() - vertices_before,
            self.mesh.face_count() - faces_before
        );
        Ok(())
    }

    /// Emit the triangles of cube `(x, y, z)`
    fn process_cube(&mut self, accessor: &CubeAccessor<'_>, x: usize, y: usize, z: usize, values: &[f32; 8]) {
        self.stats.cubes_visited += 1;

        let iso_level = self.config.iso_level;
        let case = classify(values, iso_level);
        if is_trivial(case) {
            return;
        }
        self.stats.cubes_intersected += 1;

        let positions = accessor.corner_positions(x, y, z);
        let gradients = accessor.corner_gradients(x, y, z);

        for triangle in edges_for_case(self.tables, case) {
            let mut face = [0usize; 3];
            for (slot, &edge) in face.iter_mut().zip(triangle.iter()) {
                let edge_id = accessor.global_edge_id(x, y, z, edge);
                *slot = match self.point_map.entry(edge_id) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        let (position, mut normal) =
                            interpolate(self.tables, iso_level, values, &positions, &gradients, edge);
                        if self.config.normalize_normals {
                            normal = normal.try_normalize(f32::EPSILON).unwrap_or(normal);
                        }
                        self.edge_ids.push(edge_id);
                        *entry.insert(self.mesh.add_vertex(position, normal))
                    }
                };
            }

            if self.is_proper(face) {
                self.mesh.add_face(face);
            } else {
                self.stats.degenerate_triangles += 1;
            }
        }
    }

    /// Whether a face has three distinct vertices at three distinct positions
    ///
    /// A sample lying exactly on the isovalue puts every crossing next to it
    /// on the same corner, so distinct edge ids can still share a position.
    fn is_proper(&self, [a, b, c]: [usize; 3]) -> bool {
        if a == b || b == c || c == a {
            return false;
        }
        let v = &self.mesh.vertices;
        v[a] != v[b] && v[b] != v[c] && v[c] != v[a]
    }

    /// Take the accumulated mesh, tagged with per-vertex edge ids
    pub fn finish(self) -> Result<TriangleMesh> {
        let mut mesh = self.mesh;
        mesh.set_edge_ids(self.edge_ids)?;
        Ok(mesh)
    }
}
