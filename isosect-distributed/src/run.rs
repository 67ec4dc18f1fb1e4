//! The per-rank extraction driver
//!
//! Every rank decomposes the volume the same way, loads the region its
//! sections need, extracts its partial mesh and then takes part in the
//! collectives: mesh gathering in merged mode and statistics gathering in
//! both modes.

use crate::comm::Communicator;
use crate::local::LocalGroup;
use crate::merge::{gather_and_merge, MergeStrategy};
use crate::stats::{gather_stats, ProcessStats, RunStats};
use isosect_core::{Extent, Result, TriangleMesh, Volume};
use isosect_extract::{
    extract_sections_parallel, Decomposition, DecompositionConfig, ExtractionConfig, MarchingCubes, Section,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Supplies the scalar samples of a volume region by region
pub trait VolumeSource: Sync {
    /// Dimensions of the global grid
    fn dims(&self) -> [usize; 3];

    /// Load the samples of `extent`, keeping global coordinates
    fn load_region(&self, extent: Extent) -> Result<Volume>;
}

impl VolumeSource for Volume {
    fn dims(&self) -> [usize; 3] {
        Volume::dims(self)
    }

    fn load_region(&self, extent: Extent) -> Result<Volume> {
        self.region(extent)
    }
}

/// Where the partial meshes end up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Every rank keeps its own mesh
    #[default]
    PerProcess,
    /// The coordinator gathers one merged mesh
    Merged,
}

/// Configuration of one distributed run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunConfig {
    pub extraction: ExtractionConfig,
    pub sections: DecompositionConfig,
    pub output_mode: OutputMode,
    pub merge_strategy: MergeStrategy,
    /// Extract a rank's sections on the rayon pool
    pub parallel_sections: bool,
}

impl RunConfig {
    pub fn new(extraction: ExtractionConfig, sections: DecompositionConfig) -> Self {
        Self {
            extraction,
            sections,
            ..Default::default()
        }
    }

    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    pub fn with_merge_strategy(mut self, merge_strategy: MergeStrategy) -> Self {
        self.merge_strategy = merge_strategy;
        self
    }

    pub fn with_parallel_sections(mut self, parallel: bool) -> Self {
        self.parallel_sections = parallel;
        self
    }
}

/// What one rank holds after a run
#[derive(Debug, Clone)]
pub struct RankOutcome {
    pub rank: usize,
    /// The rank's own mesh in per-process mode, the merged mesh on the
    /// coordinator in merged mode, `None` otherwise
    pub mesh: Option<TriangleMesh>,
    pub local_stats: ProcessStats,
    /// Statistics of every rank, on the coordinator only
    pub run_stats: Option<RunStats>,
    /// Effective section counts along each axis
    pub section_counts: [usize; 3],
}

/// Smallest extent holding the ghost extents of all `sections`
fn sections_extent(sections: &[Section], dims: [usize; 3]) -> Option<Extent> {
    sections
        .iter()
        .map(|section| section.ghost_extent(dims))
        .reduce(|a, b| {
            Extent::new(
                [0, 1, 2].map(|axis| a.begin[axis].min(b.begin[axis])),
                [0, 1, 2].map(|axis| a.end[axis].max(b.end[axis])),
            )
        })
}

/// Run this rank's share of the extraction
pub fn run_rank<C, S>(comm: &C, source: &S, config: &RunConfig) -> Result<RankOutcome>
where
    C: Communicator,
    S: VolumeSource + ?Sized,
{
    let rank = comm.rank();
    let dims = source.dims();
    let decomposition = Decomposition::new(dims, &config.sections)?;
    let sections = decomposition.sections_for(rank, comm.size());

    if sections.is_empty() {
        warn!(
            "Rank {} of {} has no section to extract ({} sections in total)",
            rank,
            comm.size(),
            decomposition.len()
        );
    } else {
        debug!(
            "Rank {} extracts sections {}..={}",
            rank,
            sections[0].index,
            sections[sections.len() - 1].index
        );
    }

    let region = sections_extent(sections, dims)
        .map(|extent| source.load_region(extent))
        .transpose()?;

    comm.barrier()?;
    let start = Instant::now();

    let marching_cubes = MarchingCubes::new(config.extraction);
    let mesh = match &region {
        Some(volume) if config.parallel_sections => extract_sections_parallel(&marching_cubes, volume, sections)?,
        Some(volume) => marching_cubes.extract_sections(volume, sections)?,
        None => TriangleMesh::new(),
    };

    let local_stats = ProcessStats::new(rank, sections.len(), mesh.vertex_count(), mesh.face_count(), start.elapsed());
    debug!(
        "Rank {} produced {} vertices and {} triangles in {:.3}s",
        rank, local_stats.vertices, local_stats.triangles, local_stats.wall_time
    );

    let mesh = match config.output_mode {
        OutputMode::PerProcess => Some(mesh),
        OutputMode::Merged => gather_and_merge(comm, &mesh, config.merge_strategy)?,
    };

    let run_stats = gather_stats(comm, &local_stats)?;
    if let Some(stats) = &run_stats {
        info!(
            "Extracted {} sections on {} processes: {} vertices, {} triangles, slowest process {:.3}s",
            stats.totals.sections,
            comm.size(),
            stats.totals.vertices,
            stats.totals.triangles,
            stats.totals.max_wall_time
        );
    }

    Ok(RankOutcome {
        rank,
        mesh,
        local_stats,
        run_stats,
        section_counts: decomposition.counts(),
    })
}

/// Run every rank of an in-process group over the same source
pub fn run_local<S>(source: &S, config: &RunConfig, processes: usize) -> Result<Vec<RankOutcome>>
where
    S: VolumeSource + ?Sized,
{
    let group = LocalGroup::new(processes)?;
    info!("Starting {} local processes", group.size());
    group.run(|comm| run_rank(comm, source, config))
}
