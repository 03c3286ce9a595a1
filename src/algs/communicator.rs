//! Thin façade over serial, intra-process (threads) or inter-process (MPI)
//! collective communication.
//!
//! Messages are *contiguous byte slices*; typed helpers live in
//! [`collective`](crate::algs::collective). Every method except `rank`,
//! `size` and `is_no_comm` is **collective**: it blocks until all ranks of
//! the communicator have called it.

use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

/// Collective communication interface (minimal by design).
pub trait Communicator {
    /// Rank of the calling process within the group.
    fn rank(&self) -> usize;
    /// Number of processes in the group.
    fn size(&self) -> usize;
    /// Block until every rank has reached the barrier.
    fn barrier(&self);
    /// Gather `send` from every rank into `recv` in rank order.
    ///
    /// All ranks must pass buffers of the same length, and `recv` must hold
    /// `size() * send.len()` bytes.
    fn allgather(&self, send: &[u8], recv: &mut [u8]);

    /// Variable-length all-gather: returns every rank's buffer, indexed by rank.
    fn allgatherv(&self, send: &[u8]) -> Vec<Vec<u8>> {
        let n = self.size();
        let mut lens_raw = vec![0u8; n * 8];
        self.allgather(&(send.len() as u64).to_le_bytes(), &mut lens_raw);
        let lens: Vec<usize> = lens_raw
            .chunks_exact(8)
            .map(|c| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(c);
                u64::from_le_bytes(raw) as usize
            })
            .collect();
        let width = lens.iter().copied().max().unwrap_or(0);
        if width == 0 {
            return vec![Vec::new(); n];
        }
        let mut padded = vec![0u8; width];
        padded[..send.len()].copy_from_slice(send);
        let mut all = vec![0u8; n * width];
        self.allgather(&padded, &mut all);
        all.chunks_exact(width)
            .zip(lens)
            .map(|(chunk, len)| chunk[..len].to_vec())
            .collect()
    }

    /// True only for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Single-process communicator: rank 0 of 1, collectives are local copies.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn allgather(&self, send: &[u8], recv: &mut [u8]) {
        recv[..send.len()].copy_from_slice(send);
    }
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- ThreadComm: intra-process / one thread per rank ---

/// Shared meeting point of all ranks of one [`ThreadComm`] world.
struct Rendezvous {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<u8>>>,
}

/// In-process communicator: `size` ranks, each driven by its own thread.
///
/// Collectives synchronise on a shared barrier, so every rank of a world must
/// run concurrently (see [`ThreadComm::run`]).
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Rendezvous>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl ThreadComm {
    /// Create `size` connected ranks, indexed by rank.
    ///
    /// # Panics
    /// Panics if `size == 0`.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "a ThreadComm world needs at least one rank");
        let shared = Arc::new(Rendezvous {
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Run `f` on every rank of a fresh `size`-rank world, each on a scoped
    /// thread, and return the results in rank order.
    ///
    /// A panic on any rank is re-raised on the caller once all threads have
    /// finished; ranks still blocked in a collective at that point never finish.
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let comms = Self::world(size);
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let f = &f;
                    scope.spawn(move || f(comm))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn barrier(&self) {
        self.shared.barrier.wait();
    }
    fn allgather(&self, send: &[u8], recv: &mut [u8]) {
        self.shared.slots.lock()[self.rank] = send.to_vec();
        self.shared.barrier.wait();
        {
            let slots = self.shared.slots.lock();
            let width = send.len();
            for (chunk, slot) in recv.chunks_exact_mut(width.max(1)).zip(slots.iter()) {
                chunk[..slot.len()].copy_from_slice(slot);
            }
        }
        // nobody may refill a slot before every rank has read it
        self.shared.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use crate::dist_error::DistError;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::Communicator as _;
    use mpi::traits::CommunicatorCollectives as _;

    /// Communicator over `MPI_COMM_WORLD`. Finalizes MPI when dropped.
    pub struct MpiComm {
        pub world: SimpleCommunicator,
        pub rank: usize,
        pub size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        /// Initialize MPI and wrap the world communicator.
        pub fn new() -> Result<Self, DistError> {
            let universe = mpi::initialize().ok_or_else(|| {
                DistError::RuntimeInit("MPI was already initialized".to_string())
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            log::debug!("MPI initialized: rank {rank} of {size}");
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    impl super::Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
        fn barrier(&self) {
            self.world.barrier();
        }
        fn allgather(&self, send: &[u8], recv: &mut [u8]) {
            self.world.all_gather_into(send, recv);
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_gathers_own_buffer() {
        let comm = NoComm;
        let mut out = [0u8; 3];
        comm.allgather(&[7, 8, 9], &mut out);
        assert_eq!(out, [7, 8, 9]);
        assert!(comm.is_no_comm());
        assert_eq!((comm.rank(), comm.size()), (0, 1));
    }

    #[test]
    fn thread_allgather_three_ranks() {
        let results = ThreadComm::run(3, |comm| {
            let mut out = vec![0u8; 6];
            comm.allgather(&[comm.rank() as u8, 10 + comm.rank() as u8], &mut out);
            out
        });
        for out in results {
            assert_eq!(out, vec![0, 10, 1, 11, 2, 12]);
        }
    }

    #[test]
    fn thread_allgatherv_uneven_lengths() {
        let results = ThreadComm::run(3, |comm| {
            let mine = vec![comm.rank() as u8; comm.rank()];
            comm.allgatherv(&mine)
        });
        for all in results {
            assert_eq!(all, vec![vec![], vec![1], vec![2, 2]]);
        }
    }

    #[test]
    fn repeated_collectives_do_not_mix_rounds() {
        let results = ThreadComm::run(4, |comm| {
            let mut sums = Vec::new();
            for round in 0..20u8 {
                let mut out = vec![0u8; comm.size()];
                comm.allgather(&[round.wrapping_add(comm.rank() as u8)], &mut out);
                sums.push(out.iter().map(|&b| b as u32).sum::<u32>());
            }
            sums
        });
        let expected: Vec<u32> = (0..20u32).map(|r| 4 * r + 6).collect();
        for sums in results {
            assert_eq!(sums, expected);
        }
    }
}
