#![allow(dead_code)]
use std::sync::Arc;

use distvec::algs::communicator::{Communicator, ThreadComm};
use distvec::data::map::{LocalGlobal, Map};

/// Process counts exercised by the multi-rank tests.
pub const RANK_COUNTS: [usize; 4] = [1, 2, 3, 4];

/// Run `f` on a fresh `n`-rank thread world; results indexed by rank.
pub fn on_ranks<R: Send>(n: usize, f: impl Fn(ThreadComm) -> R + Sync) -> Vec<R> {
    ThreadComm::run(n, f)
}

/// Block map over `per_proc * P` elements, base 0.
pub fn block_map<C: Communicator>(comm: &C, per_proc: usize) -> Arc<Map> {
    let n = (comm.size() * per_proc) as u64;
    Arc::new(Map::new(n, 0, comm, LocalGlobal::GloballyDistributed).unwrap())
}

/// Round-robin map with `per_proc` indices per rank.
pub fn cyclic_map<C: Communicator>(comm: &C, per_proc: usize) -> Arc<Map> {
    let (r, p) = (comm.rank(), comm.size());
    let gids: Vec<i64> = (0..per_proc).map(|k| (r + k * p) as i64).collect();
    Arc::new(Map::from_global_indices(None, &gids, 0, comm).unwrap())
}

pub fn assert_close(got: f64, want: f64) {
    let tol = 1e-12 * want.abs().max(1.0);
    assert!((got - want).abs() <= tol, "got {got}, want {want}");
}

/// Plain sequential Euclidean norm.
pub fn norm2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
