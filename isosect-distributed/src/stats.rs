//! Per-process run statistics and their aggregation on the coordinator

use crate::comm::Communicator;
use bytemuck::{Pod, Zeroable};
use isosect_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What one process did during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub rank: usize,
    pub sections: usize,
    pub vertices: usize,
    pub triangles: usize,
    /// Wall time of the extraction, in seconds
    pub wall_time: f64,
}

impl ProcessStats {
    pub fn new(rank: usize, sections: usize, vertices: usize, triangles: usize, elapsed: Duration) -> Self {
        Self {
            rank,
            sections,
            vertices,
            triangles,
            wall_time: elapsed.as_secs_f64(),
        }
    }
}

/// Fixed-size form of [`ProcessStats`] sent to the coordinator
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
struct StatsRecord {
    sections: u64,
    vertices: u64,
    triangles: u64,
    wall_time: f64,
}

impl From<&ProcessStats> for StatsRecord {
    fn from(stats: &ProcessStats) -> Self {
        Self {
            sections: stats.sections as u64,
            vertices: stats.vertices as u64,
            triangles: stats.triangles as u64,
            wall_time: stats.wall_time,
        }
    }
}

/// Sums over all processes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub sections: usize,
    pub vertices: usize,
    pub triangles: usize,
    /// The slowest process's wall time, in seconds
    pub max_wall_time: f64,
}

/// Statistics of every process of a run, in rank order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub processes: Vec<ProcessStats>,
    pub totals: RunTotals,
}

impl RunStats {
    pub fn from_processes(processes: Vec<ProcessStats>) -> Self {
        let totals = processes.iter().fold(RunTotals::default(), |totals, p| RunTotals {
            sections: totals.sections + p.sections,
            vertices: totals.vertices + p.vertices,
            triangles: totals.triangles + p.triangles,
            max_wall_time: totals.max_wall_time.max(p.wall_time),
        });
        Self { processes, totals }
    }

    /// Processes that were assigned no section
    pub fn idle_ranks(&self) -> Vec<usize> {
        self.processes
            .iter()
            .filter(|p| p.sections == 0)
            .map(|p| p.rank)
            .collect()
    }
}

/// Gather every process's statistics to the coordinator
pub fn gather_stats<C: Communicator>(comm: &C, local: &ProcessStats) -> Result<Option<RunStats>> {
    let Some(records) = comm.gather_values(&[StatsRecord::from(local)])? else {
        return Ok(None);
    };

    let processes = records
        .iter()
        .enumerate()
        .map(|(rank, record)| {
            let record = record
                .first()
                .ok_or_else(|| Error::Communication(format!("Rank {} sent no statistics", rank)))?;
            Ok(ProcessStats {
                rank,
                sections: record.sections as usize,
                vertices: record.vertices as usize,
                triangles: record.triangles as usize,
                wall_time: record.wall_time,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(RunStats::from_processes(processes)))
}
