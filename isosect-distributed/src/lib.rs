//! # isosect distributed
//!
//! Runs section-wise extraction across a group of processes.
//!
//! The collectives are expressed over the [`Communicator`] trait; this crate
//! ships a single-process implementation and an in-process group of threads
//! ([`LocalGroup`]) that stands in for a real message-passing transport.

pub mod comm;
pub mod local;
pub mod wire;
pub mod merge;
pub mod stats;
pub mod run;

// Re-export commonly used items
pub use comm::{Communicator, SoloCommunicator, COORDINATOR};
pub use local::{LocalCommunicator, LocalGroup};
pub use merge::{gather_and_merge, gather_meshes, merge_meshes, weld_seams, MergeStrategy};
pub use run::{run_local, run_rank, OutputMode, RankOutcome, RunConfig, VolumeSource};
pub use stats::{gather_stats, ProcessStats, RunStats, RunTotals};
pub use wire::{decode_mesh, encode_mesh, MeshHeader};
