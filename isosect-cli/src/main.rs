//! `isosect`: extract an isosurface from a VTK volume on a group of processes

use anyhow::{bail, Context, Result};
use clap::Parser;
use isosect_distributed::{run_rank, Communicator, LocalGroup, MergeStrategy, OutputMode, RunConfig, RunStats};
use isosect_extract::{init_thread_pool, DecompositionConfig, ExtractionConfig, ThreadPoolConfig};
use isosect_io::{rank_output_path, read_volume, write_mesh_as, MeshFormat, RunReport};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "isosect", version, about = "Distributed marching cubes isosurface extraction")]
struct Cli {
    /// Input volume (legacy VTK structured points)
    #[arg(short, long)]
    input: PathBuf,

    /// Output mesh; .ply writes PLY, .vtk or no extension writes VTK polydata
    #[arg(short, long)]
    output: PathBuf,

    /// Isovalue of the extracted surface
    #[arg(short = 'v', long = "isoval", allow_negative_numbers = true)]
    isoval: f32,

    /// Sections along x
    #[arg(long = "sections-x", visible_alias = "sx", default_value_t = 1)]
    sections_x: usize,

    /// Sections along y
    #[arg(long = "sections-y", visible_alias = "sy", default_value_t = 1)]
    sections_y: usize,

    /// Sections along z [default: number of processes]
    #[arg(long = "sections-z", visible_alias = "sz")]
    sections_z: Option<usize>,

    /// Gather one merged mesh on the coordinator instead of one mesh per process
    #[arg(short = 'm', long = "one-mesh")]
    one_mesh: bool,

    /// Also write the JSON run report to this file
    #[arg(short = 'y', long = "report")]
    report: Option<PathBuf>,

    /// Number of processes in the group
    #[arg(short, long, default_value_t = 1)]
    processes: usize,

    /// Weld duplicated seam vertices when merging
    #[arg(long, requires = "one_mesh")]
    weld: bool,

    /// Extract each process's sections in parallel
    #[arg(long)]
    parallel_sections: bool,

    /// Worker threads for parallel sections [default: all cores]
    #[arg(long, requires = "parallel_sections")]
    threads: Option<usize>,

    /// Normalize vertex normals
    #[arg(long)]
    normalize_normals: bool,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let sections = [
            self.sections_x,
            self.sections_y,
            self.sections_z.unwrap_or(self.processes),
        ];
        if self.processes == 0 {
            bail!("--processes must be at least 1");
        }
        if sections.contains(&0) {
            bail!("Section counts must be at least 1, got {:?}", sections);
        }

        let extraction = ExtractionConfig::new(self.isoval).with_normalized_normals(self.normalize_normals);
        let output_mode = if self.one_mesh {
            OutputMode::Merged
        } else {
            OutputMode::PerProcess
        };
        let merge_strategy = if self.weld {
            MergeStrategy::WeldSeams
        } else {
            MergeStrategy::Concatenate
        };

        Ok(RunConfig::new(extraction, DecompositionConfig::new(sections))
            .with_output_mode(output_mode)
            .with_merge_strategy(merge_strategy)
            .with_parallel_sections(self.parallel_sections))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = cli.run_config()?;
    let format = MeshFormat::from_path(&cli.output)?;

    if cli.parallel_sections {
        let mut pool = ThreadPoolConfig::default();
        if let Some(threads) = cli.threads {
            pool = pool.with_threads(threads);
        }
        init_thread_pool(pool)?;
    }

    let volume = read_volume(&cli.input)
        .with_context(|| format!("Failed to read volume from {}", cli.input.display()))?;
    info!("Read volume {:?} from {}", volume.dims(), cli.input.display());

    let group = LocalGroup::new(cli.processes)?;
    let results = group.run(|comm| {
        let outcome = run_rank(comm, &volume, &config)?;
        if let Some(mesh) = &outcome.mesh {
            let path = match config.output_mode {
                OutputMode::PerProcess => rank_output_path(&cli.output, comm.rank()),
                OutputMode::Merged => cli.output.clone(),
            };
            write_mesh_as(mesh, &path, format)?;
        }
        Ok((outcome.section_counts, outcome.run_stats))
    })?;

    let (section_counts, stats) = results
        .into_iter()
        .find_map(|(counts, stats)| stats.map(|stats| (counts, stats)))
        .unwrap_or_else(|| ([1, 1, 1], RunStats::default()));

    let report = RunReport::new(&cli.input, &cli.output, cli.isoval, volume.dims(), section_counts)
        .with_processes(cli.processes)
        .with_output(config.output_mode, config.merge_strategy)
        .with_stats(stats);

    println!("{}", report.to_json()?);
    if let Some(path) = &cli.report {
        report
            .write(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(())
}
