//! Marching Cubes isosurface extraction
//!
//! This module is the entry point for extracting a triangle mesh from a
//! scalar [`Volume`], either as a whole or section by section.

use crate::decomposition::{Decomposition, DecompositionConfig, Section};
use crate::section::{MeshingStats, SectionMesher};
use crate::tables::CubeTables;
use isosect_core::{Error, Point3f, Result, TriangleMesh, Volume};
use log::debug;

/// Configuration for Marching Cubes extraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionConfig {
    /// Isosurface level (scalar value to extract)
    pub iso_level: f32,
    /// Scale vertex normals to unit length
    pub normalize_normals: bool,
}

impl ExtractionConfig {
    pub fn new(iso_level: f32) -> Self {
        Self {
            iso_level,
            ..Default::default()
        }
    }

    pub fn with_iso_level(mut self, iso_level: f32) -> Self {
        self.iso_level = iso_level;
        self
    }

    pub fn with_normalized_normals(mut self, normalize: bool) -> Self {
        self.normalize_normals = normalize;
        self
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            iso_level: 0.0,
            normalize_normals: false,
        }
    }
}

/// Marching Cubes implementation
#[derive(Debug, Clone, Copy)]
pub struct MarchingCubes {
    config: ExtractionConfig,
    tables: CubeTables,
}

impl MarchingCubes {
    /// Create a new Marching Cubes instance with the standard tables
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_tables(config, CubeTables::standard())
    }

    pub fn with_tables(config: ExtractionConfig, tables: CubeTables) -> Self {
        Self { config, tables }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn tables(&self) -> &CubeTables {
        &self.tables
    }

    /// Start a mesher for sections that share one dedup map
    pub fn mesher(&self) -> SectionMesher<'_> {
        SectionMesher::new(self.config, &self.tables)
    }

    /// Extract the isosurface of a whole volume
    pub fn extract(&self, volume: &Volume) -> Result<TriangleMesh> {
        let decomposition = Decomposition::new(volume.dims(), &DecompositionConfig::default())?;
        self.extract_sections(volume, decomposition.sections())
    }

    /// Extract the given sections in order with one shared dedup map
    pub fn extract_sections(&self, volume: &Volume, sections: &[Section]) -> Result<TriangleMesh> {
        self.extract_sections_with_stats(volume, sections).map(|(mesh, _)| mesh)
    }

    pub fn extract_sections_with_stats(
        &self,
        volume: &Volume,
        sections: &[Section],
    ) -> Result<(TriangleMesh, MeshingStats)> {
        if volume.dims().iter().any(|&d| d < 2) {
            return Err(Error::InvalidData(format!(
                "Cannot march a volume of dimensions {:?}",
                volume.dims()
            )));
        }

        let mut mesher = self.mesher();
        for section in sections {
            mesher.process_section(volume, section)?;
        }
        let stats = mesher.stats();
        let mesh = mesher.finish()?;

        debug!(
            "Extracted {} vertices and {} triangles from {} sections ({} of {} cubes intersected)",
            mesh.vertex_count(),
            mesh.face_count(),
            sections.len(),
            stats.cubes_intersected,
            stats.cubes_visited
        );
        Ok((mesh, stats))
    }
}

impl Default for MarchingCubes {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

/// Convenience function for basic marching cubes
pub fn marching_cubes(volume: &Volume, iso_level: f32) -> Result<TriangleMesh> {
    MarchingCubes::new(ExtractionConfig::new(iso_level)).extract(volume)
}

/// Create a simple test volume (signed distance to a sphere)
pub fn create_sphere_volume(
    center: Point3f,
    radius: f32,
    grid_resolution: [usize; 3],
    grid_size: [f32; 3],
) -> Result<Volume> {
    if grid_resolution.iter().any(|&r| r < 2) {
        return Err(Error::InvalidData(format!(
            "Sphere grid resolution {:?} must be at least 2 per axis",
            grid_resolution
        )));
    }

    let origin = Point3f::new(
        center.x - grid_size[0] / 2.0,
        center.y - grid_size[1] / 2.0,
        center.z - grid_size[2] / 2.0,
    );
    let spacing = [
        grid_size[0] / (grid_resolution[0] - 1) as f32,
        grid_size[1] / (grid_resolution[1] - 1) as f32,
        grid_size[2] / (grid_resolution[2] - 1) as f32,
    ];

    Volume::from_fn(grid_resolution, spacing, origin, |x, y, z| {
        let world_pos = Point3f::new(
            origin.x + x as f32 * spacing[0],
            origin.y + y as f32 * spacing[1],
            origin.z + z as f32 * spacing[2],
        );
        (world_pos - center).magnitude() - radius
    })
}
