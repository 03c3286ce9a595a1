//! Typed collectives on top of the byte-level [`Communicator::allgather`].
//!
//! Reductions are implemented as all-gather followed by a fold in rank
//! order, so every rank computes the bit-identical result and the result
//! only depends on the process count, never on message timing.

use bytemuck::Pod;
use num_traits::Float;

use crate::algs::communicator::Communicator;
use crate::algs::wire::{cast_slice, decode_all};

/// Gather one value from every rank, indexed by rank.
pub fn all_gather_value<T, C>(comm: &C, value: T) -> Vec<T>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    let width = std::mem::size_of::<T>();
    let mut recv = vec![0u8; comm.size() * width];
    comm.allgather(bytemuck::bytes_of(&value), &mut recv);
    decode_all(&recv)
}

/// Gather a variable-length slice from every rank, indexed by rank.
pub fn all_gather_slices<T, C>(comm: &C, local: &[T]) -> Vec<Vec<T>>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    comm.allgatherv(cast_slice(local))
        .iter()
        .map(|raw| decode_all(raw))
        .collect()
}

/// Reduce `value` over all ranks with `fold`, applied in rank order.
pub fn all_reduce<T, C, F>(comm: &C, value: T, fold: F) -> T
where
    T: Pod,
    C: Communicator + ?Sized,
    F: Fn(T, T) -> T,
{
    let all = all_gather_value(comm, value);
    let mut it = all.into_iter();
    // size() >= 1, so there is always a first contribution
    let first = it.next().unwrap_or(value);
    it.fold(first, fold)
}

pub fn all_reduce_sum<T, C>(comm: &C, value: T) -> T
where
    T: Pod + std::ops::Add<Output = T>,
    C: Communicator + ?Sized,
{
    all_reduce(comm, value, |a, b| a + b)
}

/// Maximum over ranks. NaN on any rank yields NaN.
pub fn all_reduce_max<T, C>(comm: &C, value: T) -> T
where
    T: Pod + Float,
    C: Communicator + ?Sized,
{
    all_reduce(comm, value, |a, b| {
        if a.is_nan() || b.is_nan() {
            T::nan()
        } else {
            a.max(b)
        }
    })
}

pub fn all_reduce_min_i64<C>(comm: &C, value: i64) -> i64
where
    C: Communicator + ?Sized,
{
    all_reduce(comm, value, i64::min)
}

pub fn all_reduce_max_i64<C>(comm: &C, value: i64) -> i64
where
    C: Communicator + ?Sized,
{
    all_reduce(comm, value, i64::max)
}

/// Logical AND over ranks.
pub fn all_reduce_and<C>(comm: &C, value: bool) -> bool
where
    C: Communicator + ?Sized,
{
    all_gather_value(comm, value as u8).iter().all(|&b| b != 0)
}

/// True iff every rank passed the same value.
pub fn all_equal<T, C>(comm: &C, value: T) -> bool
where
    T: Pod + PartialEq,
    C: Communicator + ?Sized,
{
    let all = all_gather_value(comm, value);
    all.iter().all(|v| *v == all[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};

    #[test]
    fn serial_reductions_are_identity() {
        let comm = NoComm;
        assert_eq!(all_reduce_sum(&comm, 2.5f64), 2.5);
        assert_eq!(all_reduce_max(&comm, -1.0f32), -1.0);
        assert!(all_reduce_and(&comm, true));
        assert!(all_equal(&comm, 17u64));
    }

    #[test]
    fn sum_and_max_over_four_ranks() {
        let out = ThreadComm::run(4, |comm| {
            let r = comm.rank() as f64;
            (all_reduce_sum(&comm, r), all_reduce_max(&comm, r))
        });
        assert!(out.iter().all(|&(s, m)| s == 6.0 && m == 3.0));
    }

    #[test]
    fn and_fails_if_one_rank_disagrees() {
        let out = ThreadComm::run(3, |comm| all_reduce_and(&comm, comm.rank() != 1));
        assert_eq!(out, vec![false, false, false]);
    }

    #[test]
    fn gather_slices_keeps_rank_order() {
        let out = ThreadComm::run(3, |comm| {
            let mine: Vec<i64> = (0..comm.rank() as i64).collect();
            all_gather_slices(&comm, &mine)
        });
        assert_eq!(out[2], vec![vec![], vec![0], vec![0, 1]]);
    }

    #[test]
    fn max_propagates_nan() {
        let out = ThreadComm::run(2, |comm| {
            let v = if comm.rank() == 0 { f64::NAN } else { 1.0 };
            all_reduce_max(&comm, v)
        });
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
