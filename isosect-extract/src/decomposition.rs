//! Splitting a volume into sections and sections into processes

use isosect_core::{Error, Extent, Result, Volume};
use itertools::iproduct;
use log::{debug, warn};
use std::ops::Range;

/// The block of cubes one section is responsible for
///
/// `cubes` holds minimum-corner indices, so the section reads voxels
/// `cubes.begin..=cubes.end` along each axis. Neighboring sections share
/// that last voxel plane but never a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    /// Position in the section list
    pub index: usize,
    /// Position in the section grid
    pub grid_position: [usize; 3],
    pub cubes: Extent,
}

impl Section {
    /// Voxels touched by the section's cubes
    pub fn voxel_extent(&self) -> Extent {
        Extent::new(self.cubes.begin, self.cubes.end.map(|e| e + 1))
    }

    /// Voxels needed to classify the section and take gradients at every corner
    pub fn ghost_extent(&self, dims: [usize; 3]) -> Extent {
        self.voxel_extent().expanded(1, dims)
    }

    pub fn cube_count(&self) -> usize {
        self.cubes.len()
    }

    /// Copy out the samples this section reads, ghost layer included
    pub fn region(&self, volume: &Volume) -> Result<Volume> {
        volume.region(self.ghost_extent(volume.dims()))
    }
}

/// Requested number of sections along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompositionConfig {
    pub sections: [usize; 3],
}

impl DecompositionConfig {
    pub fn new(sections: [usize; 3]) -> Self {
        Self { sections }
    }

    /// Split along z only, as many sections as processes
    pub fn along_z(count: usize) -> Self {
        Self {
            sections: [1, 1, count],
        }
    }
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self { sections: [1, 1, 1] }
    }
}

/// A grid of sections covering every cube of a volume exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    dims: [usize; 3],
    counts: [usize; 3],
    sections: Vec<Section>,
}

impl Decomposition {
    /// Decompose a volume of `dims` voxels into the requested section grid
    ///
    /// Section counts are clamped to the number of cubes along each axis.
    pub fn new(dims: [usize; 3], config: &DecompositionConfig) -> Result<Self> {
        if dims.iter().any(|&d| d < 2) {
            return Err(Error::InvalidData(format!(
                "Volume dimensions {:?} must be at least 2 along every axis",
                dims
            )));
        }

        let mut counts = [1; 3];
        for axis in 0..3 {
            let cubes = dims[axis] - 1;
            let requested = config.sections[axis];
            counts[axis] = requested.clamp(1, cubes);
            if counts[axis] != requested {
                warn!(
                    "Requested {} sections along axis {} but it has {} cubes; using {}",
                    requested, axis, cubes, counts[axis]
                );
            }
        }

        let ranges: Vec<Vec<Range<usize>>> = (0..3)
            .map(|axis| axis_ranges(dims[axis] - 1, counts[axis]))
            .collect();

        let sections: Vec<Section> = iproduct!(0..counts[2], 0..counts[1], 0..counts[0])
            .enumerate()
            .map(|(index, (k, j, i))| Section {
                index,
                grid_position: [i, j, k],
                cubes: Extent::new(
                    [ranges[0][i].start, ranges[1][j].start, ranges[2][k].start],
                    [ranges[0][i].end, ranges[1][j].end, ranges[2][k].end],
                ),
            })
            .collect();

        debug!(
            "Decomposed {:?} voxels into {:?} = {} sections",
            dims,
            counts,
            sections.len()
        );

        Ok(Self {
            dims,
            counts,
            sections,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Effective section count along each axis
    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Contiguous ranges of the section list, one per process
    pub fn assignment(&self, processes: usize) -> Vec<Range<usize>> {
        assign_contiguous(self.sections.len(), processes)
    }

    /// The sections owned by `rank` in a group of `processes`
    pub fn sections_for(&self, rank: usize, processes: usize) -> &[Section] {
        match self.assignment(processes).get(rank) {
            Some(range) => &self.sections[range.clone()],
            None => &[],
        }
    }
}

/// Split `cubes` cube indices into `count` contiguous ranges as evenly as possible
pub fn axis_ranges(cubes: usize, count: usize) -> Vec<Range<usize>> {
    let count = count.max(1);
    (0..count)
        .map(|i| (i * cubes / count)..((i + 1) * cubes / count))
        .collect()
}

/// Split `items` into `processes` contiguous ranges; the first
/// `items % processes` ranges get one extra item
pub fn assign_contiguous(items: usize, processes: usize) -> Vec<Range<usize>> {
    let processes = processes.max(1);
    let base = items / processes;
    let extra = items % processes;

    let mut start = 0;
    (0..processes)
        .map(|p| {
            let len = base + usize::from(p < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}
