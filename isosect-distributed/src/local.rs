//! In-process process group
//!
//! [`LocalGroup`] runs every rank on its own thread and connects the ranks to
//! the coordinator with crossbeam channels. Each rank has a dedicated channel
//! in each direction, so messages from one rank arrive in the order it sent
//! them and collectives never mix up payloads of consecutive calls.
//!
//! All collectives go through the coordinator, barriers included. When a rank
//! fails its channels close, the coordinator's next receive fails, and the
//! coordinator dropping its own channels releases every other rank with an
//! error instead of leaving it blocked.

use crate::comm::{Communicator, COORDINATOR};
use crossbeam_channel::{self as channel, Receiver, Sender};
use isosect_core::{Error, Result};
use log::debug;
use std::thread;

/// Coordinator end of the channels to every rank
#[derive(Debug)]
struct CoordinatorLinks {
    /// Indexed by rank, `None` at the coordinator's own slot
    from_ranks: Vec<Option<Receiver<Vec<u8>>>>,
    to_ranks: Vec<Option<Sender<Vec<u8>>>>,
}

/// Worker end of the channels to the coordinator
#[derive(Debug)]
struct WorkerLinks {
    to_coordinator: Sender<Vec<u8>>,
    from_coordinator: Receiver<Vec<u8>>,
}

#[derive(Debug)]
enum Links {
    Coordinator(CoordinatorLinks),
    Worker(WorkerLinks),
}

/// One rank's handle on a [`LocalGroup`]
#[derive(Debug)]
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    links: Links,
}

impl LocalCommunicator {
    fn recv_from(&self, links: &CoordinatorLinks, rank: usize) -> Result<Vec<u8>> {
        let receiver = links.from_ranks[rank]
            .as_ref()
            .ok_or_else(|| Error::Communication(format!("No channel from rank {}", rank)))?;
        receiver
            .recv()
            .map_err(|_| Error::Communication(format!("Rank {} left the group", rank)))
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        match &self.links {
            Links::Coordinator(links) => {
                for rank in 1..self.size {
                    self.recv_from(links, rank)?;
                }
                for sender in links.to_ranks.iter().flatten() {
                    sender
                        .send(Vec::new())
                        .map_err(|_| Error::Communication("A rank left the group during a barrier".to_string()))?;
                }
                Ok(())
            }
            Links::Worker(links) => {
                links
                    .to_coordinator
                    .send(Vec::new())
                    .map_err(|_| Error::Communication("Coordinator left the group".to_string()))?;
                links
                    .from_coordinator
                    .recv()
                    .map(|_| ())
                    .map_err(|_| Error::Communication("Coordinator left the group".to_string()))
            }
        }
    }

    fn gather_bytes(&self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>> {
        match &self.links {
            Links::Coordinator(links) => {
                let mut payloads = Vec::with_capacity(self.size);
                payloads.push(payload);
                for rank in 1..self.size {
                    payloads.push(self.recv_from(links, rank)?);
                }
                debug!(
                    "Gathered {} bytes from {} ranks",
                    payloads.iter().map(Vec::len).sum::<usize>(),
                    self.size
                );
                Ok(Some(payloads))
            }
            Links::Worker(links) => {
                links
                    .to_coordinator
                    .send(payload)
                    .map_err(|_| Error::Communication("Coordinator left the group".to_string()))?;
                Ok(None)
            }
        }
    }
}

/// A fixed-size group of ranks running as threads of this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalGroup {
    size: usize,
}

impl LocalGroup {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::Config("A process group needs at least one process".to_string()));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Create the connected communicators, indexed by rank
    pub fn communicators(&self) -> Vec<LocalCommunicator> {
        let mut from_ranks = vec![None];
        let mut to_ranks = vec![None];
        let mut workers = Vec::with_capacity(self.size.saturating_sub(1));

        for rank in 1..self.size {
            let (up_tx, up_rx) = channel::unbounded();
            let (down_tx, down_rx) = channel::unbounded();
            from_ranks.push(Some(up_rx));
            to_ranks.push(Some(down_tx));
            workers.push(LocalCommunicator {
                rank,
                size: self.size,
                links: Links::Worker(WorkerLinks {
                    to_coordinator: up_tx,
                    from_coordinator: down_rx,
                }),
            });
        }

        let coordinator = LocalCommunicator {
            rank: COORDINATOR,
            size: self.size,
            links: Links::Coordinator(CoordinatorLinks { from_ranks, to_ranks }),
        };

        std::iter::once(coordinator).chain(workers).collect()
    }

    /// Run `f` on every rank concurrently and collect the results in rank order
    ///
    /// Fails if any rank fails. A rank's own error takes precedence over the
    /// communication errors its failure causes on the other ranks.
    pub fn run<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(&LocalCommunicator) -> Result<R> + Sync,
        R: Send,
    {
        let f = &f;
        let results: Vec<Result<R>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .communicators()
                .into_iter()
                .map(|comm| {
                    thread::Builder::new()
                        .name(format!("isosect-rank-{}", comm.rank()))
                        .spawn_scoped(scope, move || f(&comm))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::Communication(format!("Rank {} panicked", rank)))),
                    Err(e) => Err(Error::Communication(format!("Failed to start rank {}: {}", rank, e))),
                })
                .collect()
        });

        let mut first_error: Option<Error> = None;
        let mut values = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(e) => {
                    let replaces = match &first_error {
                        None => true,
                        Some(Error::Communication(_)) => !matches!(e, Error::Communication(_)),
                        Some(_) => false,
                    };
                    if replaces {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_group_is_rejected() {
        assert!(LocalGroup::new(0).is_err());
    }

    #[test]
    fn test_ranks_and_sizes() {
        let group = LocalGroup::new(4).unwrap();
        let ranks = group.run(|comm| Ok((comm.rank(), comm.size()))).unwrap();
        assert_eq!(ranks, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn test_gather_in_rank_order() {
        let group = LocalGroup::new(5).unwrap();
        let results = group
            .run(|comm| {
                comm.barrier()?;
                let first = comm.gather_values(&[comm.rank() as u64 * 10])?;
                let second = comm.gather_bytes(vec![comm.rank() as u8; comm.rank()])?;
                comm.barrier()?;
                Ok((first, second))
            })
            .unwrap();

        let (first, second) = &results[0];
        assert_eq!(
            first.as_ref().unwrap(),
            &vec![vec![0u64], vec![10], vec![20], vec![30], vec![40]]
        );
        let lengths: Vec<usize> = second.as_ref().unwrap().iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![0, 1, 2, 3, 4]);
        assert!(results[1..].iter().all(|(a, b)| a.is_none() && b.is_none()));
    }

    #[test]
    fn test_failed_rank_fails_the_group() {
        let group = LocalGroup::new(3).unwrap();
        let result: Result<Vec<()>> = group.run(|comm| {
            if comm.rank() == 2 {
                return Err(Error::InvalidData("bad section".to_string()));
            }
            comm.barrier()?;
            comm.gather_bytes(vec![1, 2, 3])?;
            Ok(())
        });

        match result {
            Err(Error::InvalidData(message)) => assert_eq!(message, "bad section"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_single_rank_group() {
        let group = LocalGroup::new(1).unwrap();
        let gathered = group.run(|comm| comm.gather_values(&[3.5f32])).unwrap();
        assert_eq!(gathered, vec![Some(vec![vec![3.5f32]])]);
    }
}
