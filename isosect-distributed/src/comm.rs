//! Process group abstraction
//!
//! The gather/merge protocol only needs a handful of collectives, so it is
//! written against the [`Communicator`] trait rather than a particular
//! transport.

use bytemuck::Pod;
use isosect_core::{Error, Result};

/// Rank of the process that receives gathered data
pub const COORDINATOR: usize = 0;

/// Collective operations over a fixed group of processes
pub trait Communicator {
    /// This process's rank, `0..size()`
    fn rank(&self) -> usize;

    /// Number of processes in the group
    fn size(&self) -> usize;

    /// Block until every process has reached the barrier
    fn barrier(&self) -> Result<()>;

    /// Send a variable-length payload to the coordinator
    ///
    /// The coordinator receives every payload in rank order, its own
    /// included; other ranks receive `None`.
    fn gather_bytes(&self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>>;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Gather a slice of plain values to the coordinator
    fn gather_values<T: Pod>(&self, values: &[T]) -> Result<Option<Vec<Vec<T>>>> {
        let gathered = self.gather_bytes(bytemuck::cast_slice(values).to_vec())?;
        gathered
            .map(|payloads| payloads.iter().map(|bytes| decode_values(bytes)).collect())
            .transpose()
    }
}

/// Reinterpret gathered bytes as values, whatever their alignment
pub fn decode_values<T: Pod>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    if size == 0 || bytes.len() % size != 0 {
        return Err(Error::Communication(format!(
            "Payload of {} bytes is not a whole number of {}-byte values",
            bytes.len(),
            size
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// A group of one process
#[derive(Debug, Clone, Copy, Default)]
pub struct SoloCommunicator;

impl Communicator for SoloCommunicator {
    fn rank(&self) -> usize {
        COORDINATOR
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }

    fn gather_bytes(&self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>> {
        Ok(Some(vec![payload]))
    }
}
