//! JSON run report

use isosect_core::{Error, Result};
use isosect_distributed::{MergeStrategy, OutputMode, RunStats};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration and statistics of one extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub algorithm: String,
    pub version: String,
    pub input: String,
    pub output: String,
    pub iso_level: f32,
    pub volume_dims: [usize; 3],
    /// Effective section counts along each axis
    pub sections: [usize; 3],
    pub section_count: usize,
    pub processes: usize,
    pub output_mode: OutputMode,
    pub merge_strategy: MergeStrategy,
    pub stats: RunStats,
}

impl RunReport {
    pub fn new(input: &Path, output: &Path, iso_level: f32, volume_dims: [usize; 3], sections: [usize; 3]) -> Self {
        Self {
            algorithm: "marching cubes".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            input: input.display().to_string(),
            output: output.display().to_string(),
            iso_level,
            volume_dims,
            sections,
            section_count: sections.iter().product(),
            processes: 1,
            output_mode: OutputMode::default(),
            merge_strategy: MergeStrategy::default(),
            stats: RunStats::default(),
        }
    }

    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_output(mut self, output_mode: OutputMode, merge_strategy: MergeStrategy) -> Self {
        self.output_mode = output_mode;
        self.merge_strategy = merge_strategy;
        self
    }

    pub fn with_stats(mut self, stats: RunStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidData(format!("Failed to serialize run report: {}", e)))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()? + "\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isosect_distributed::ProcessStats;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn report() -> RunReport {
        let stats = RunStats::from_processes(vec![
            ProcessStats::new(0, 1, 120, 236, Duration::from_millis(12)),
            ProcessStats::new(1, 1, 118, 232, Duration::from_millis(15)),
        ]);
        RunReport::new(Path::new("volume.vtk"), Path::new("mesh.ply"), 0.5, [64, 64, 64], [1, 1, 2])
            .with_processes(2)
            .with_output(OutputMode::Merged, MergeStrategy::Concatenate)
            .with_stats(stats)
    }

    #[test]
    fn test_report_json_fields() {
        let value: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();

        assert_eq!(value["algorithm"], "marching cubes");
        assert_eq!(value["section_count"], 2);
        assert_eq!(value["output_mode"], "merged");
        assert_eq!(value["merge_strategy"], "concatenate");
        assert_eq!(value["stats"]["totals"]["triangles"], 468);
        assert_eq!(value["stats"]["processes"][1]["vertices"], 118);
    }

    #[test]
    fn test_report_file_reads_back() {
        let path = std::env::temp_dir().join("isosect_report_test.json");
        report().write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let read: RunReport = serde_json::from_str(&text).unwrap();
        let expected = report();
        assert_eq!(read.input, expected.input);
        assert_eq!(read.sections, expected.sections);
        assert_eq!(read.volume_dims, expected.volume_dims);
        assert_eq!(read.stats.processes.len(), 2);
        assert_relative_eq!(read.stats.totals.max_wall_time, 0.015, epsilon = 1e-12);

        let _ = std::fs::remove_file(&path);
    }
}
