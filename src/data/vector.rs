//! Vector: dense distributed vector over a [`Map`].
//!
//! Each rank stores only the entries its map owns, in local order.
//! Element-wise kernels run on the rayon pool. Norms and dot products reduce
//! sequentially on each rank and then fold over ranks in rank order, so they
//! are bit-reproducible for a fixed process count.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::algs::collective::{all_gather_slices, all_reduce_and, all_reduce_max, all_reduce_sum};
use crate::algs::communicator::Communicator;
use crate::data::map::{GlobalOrdinal, LocalOrdinal, Map};
use crate::data::scalar::Scalar;
use crate::dist_error::DistError;

/// Seed of [`Vector::randomize`]; mixed with the rank so ranks draw different streams.
pub const DEFAULT_RANDOM_SEED: u64 = 0xD157_5EED;

/// Dense vector whose entries are partitioned according to a shared [`Map`].
///
/// `Clone` performs a deep copy of the local values and shares the map.
#[derive(Clone, Debug, PartialEq)]
pub struct Vector<T: Scalar = f64> {
    map: Arc<Map>,
    values: Vec<T>,
}

impl<T: Scalar> Vector<T> {
    /// Zero-filled vector.
    pub fn new(map: Arc<Map>) -> Self {
        Self::with_zero_out(map, true)
    }

    /// Vector whose contents are unspecified until written when `zero_out` is
    /// false. Memory is always initialised; callers must not rely on its value.
    pub fn with_zero_out(map: Arc<Map>, zero_out: bool) -> Self {
        let n = map.local_num_elements();
        let values = if zero_out {
            vec![T::zero(); n]
        } else {
            let mut v = Vec::with_capacity(n);
            v.resize(n, T::default());
            v
        };
        log::debug!(
            "rank {}: vector with {n} local entries (zero_out = {zero_out})",
            map.rank()
        );
        Vector { map, values }
    }

    /// Wrap existing local values.
    ///
    /// # Errors
    /// `LengthMismatch` if `values.len()` differs from the map's local count.
    pub fn from_values(map: Arc<Map>, values: Vec<T>) -> Result<Self, DistError> {
        if values.len() != map.local_num_elements() {
            return Err(DistError::LengthMismatch {
                expected: map.local_num_elements(),
                got: values.len(),
            });
        }
        Ok(Vector { map, values })
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    pub fn local_length(&self) -> usize {
        self.values.len()
    }

    pub fn global_length(&self) -> u64 {
        self.map.global_num_elements()
    }

    pub fn local_values(&self) -> &[T] {
        &self.values
    }

    pub fn local_values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    /// Set every local entry to `value`.
    pub fn put_scalar(&mut self, value: T) {
        self.values.par_iter_mut().for_each(|v| *v = value);
    }

    /// Fill with pseudo-random values in `[-1, 1)` from the default seed.
    pub fn randomize(&mut self) {
        self.randomize_with_seed(DEFAULT_RANDOM_SEED);
    }

    /// Fill with pseudo-random values in `[-1, 1)`.
    ///
    /// The stream depends on `seed` and on the rank, so a given seed and
    /// process count always produce the same global vector.
    pub fn randomize_with_seed(&mut self, seed: u64) {
        let mixed = seed ^ (self.map.rank() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = SmallRng::seed_from_u64(mixed);
        let (lo, hi) = (-T::one(), T::one());
        for v in &mut self.values {
            *v = rng.gen_range(lo..hi);
        }
    }

    pub fn local_value(&self, lid: LocalOrdinal) -> Result<T, DistError> {
        self.values
            .get(lid)
            .copied()
            .ok_or(DistError::LocalIndexOutOfRange {
                index: lid,
                len: self.values.len(),
            })
    }

    pub fn global_value(&self, gid: GlobalOrdinal) -> Result<T, DistError> {
        let lid = self.owned_lid(gid)?;
        Ok(self.values[lid])
    }

    pub fn replace_local_value(&mut self, lid: LocalOrdinal, value: T) -> Result<(), DistError> {
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(lid)
            .ok_or(DistError::LocalIndexOutOfRange { index: lid, len })?;
        *slot = value;
        Ok(())
    }

    /// Overwrite the entry for `gid`, which this rank must own.
    pub fn replace_global_value(&mut self, gid: GlobalOrdinal, value: T) -> Result<(), DistError> {
        let lid = self.owned_lid(gid)?;
        self.values[lid] = value;
        Ok(())
    }

    /// Add `value` to the entry for `gid`, which this rank must own.
    pub fn sum_into_global_value(&mut self, gid: GlobalOrdinal, value: T) -> Result<(), DistError> {
        let lid = self.owned_lid(gid)?;
        self.values[lid] = self.values[lid] + value;
        Ok(())
    }

    fn owned_lid(&self, gid: GlobalOrdinal) -> Result<LocalOrdinal, DistError> {
        self.map
            .local_index(gid)
            .ok_or(DistError::GlobalIndexNotOwned(gid))
    }

    /// `self = alpha * self`
    pub fn scale(&mut self, alpha: T) {
        self.values.par_iter_mut().for_each(|v| *v = alpha * *v);
    }

    /// `self = beta * self + alpha * a`
    ///
    /// Legal whenever the maps are compatible, even if not the same. With
    /// `beta == 0` the previous contents of `self` are ignored.
    ///
    /// # Errors
    /// `IncompatibleVectors` if the local or global lengths differ.
    pub fn update(&mut self, alpha: T, a: &Vector<T>, beta: T) -> Result<(), DistError> {
        self.check_compatible(a)?;
        let it = self.values.par_iter_mut().zip(a.values.par_iter());
        if beta == T::zero() {
            it.for_each(|(s, &x)| *s = alpha * x);
        } else {
            it.for_each(|(s, &x)| *s = beta * *s + alpha * x);
        }
        Ok(())
    }

    /// `self = gamma * self + alpha * a + beta * b`
    ///
    /// With `gamma == 0` the previous contents of `self` are ignored.
    ///
    /// # Errors
    /// `IncompatibleVectors` if either operand's lengths differ from `self`.
    pub fn update2(
        &mut self,
        alpha: T,
        a: &Vector<T>,
        beta: T,
        b: &Vector<T>,
        gamma: T,
    ) -> Result<(), DistError> {
        self.check_compatible(a)?;
        self.check_compatible(b)?;
        let it = self
            .values
            .par_iter_mut()
            .zip(a.values.par_iter())
            .zip(b.values.par_iter());
        if gamma == T::zero() {
            it.for_each(|((s, &x), &y)| *s = alpha * x + beta * y);
        } else {
            it.for_each(|((s, &x), &y)| *s = gamma * *s + alpha * x + beta * y);
        }
        Ok(())
    }

    fn check_compatible(&self, other: &Vector<T>) -> Result<(), DistError> {
        if self.values.len() != other.values.len()
            || self.global_length() != other.global_length()
        {
            return Err(DistError::IncompatibleVectors {
                local: self.values.len(),
                other_local: other.values.len(),
                global: self.global_length(),
                other_global: other.global_length(),
            });
        }
        Ok(())
    }

    /// Collective dot product.
    ///
    /// # Errors
    /// `IncompatibleVectors` on the mismatching rank(s), `PeerFailed` on the others.
    pub fn dot<C>(&self, other: &Vector<T>, comm: &C) -> Result<T, DistError>
    where
        C: Communicator + ?Sized,
    {
        let local_check = self.check_compatible(other);
        if !all_reduce_and(comm, local_check.is_ok()) {
            local_check?;
            return Err(DistError::PeerFailed("incompatible vectors in dot".to_string()));
        }
        let local = self
            .values
            .iter()
            .zip(&other.values)
            .fold(T::zero(), |acc, (&x, &y)| acc + x * y);
        Ok(all_reduce_sum(comm, local))
    }

    /// Collective sum of absolute values.
    pub fn norm1<C>(&self, comm: &C) -> T
    where
        C: Communicator + ?Sized,
    {
        let local = self.values.iter().fold(T::zero(), |acc, &v| acc + v.abs());
        all_reduce_sum(comm, local)
    }

    /// Collective Euclidean norm.
    pub fn norm2<C>(&self, comm: &C) -> T
    where
        C: Communicator + ?Sized,
    {
        let local = self.values.iter().fold(T::zero(), |acc, &v| acc + v * v);
        all_reduce_sum(comm, local).sqrt()
    }

    /// Collective maximum absolute value; `0` for an empty vector.
    pub fn norm_inf<C>(&self, comm: &C) -> T
    where
        C: Communicator + ?Sized,
    {
        let local = self.values.iter().fold(T::zero(), |acc, &v| {
            if acc.is_nan() || v.is_nan() {
                T::nan()
            } else {
                acc.max(v.abs())
            }
        });
        all_reduce_max(comm, local)
    }

    /// Collective arithmetic mean; NaN for an empty vector.
    pub fn mean_value<C>(&self, comm: &C) -> T
    where
        C: Communicator + ?Sized,
    {
        let local = self.values.iter().fold(T::zero(), |acc, &v| acc + v);
        let sum = all_reduce_sum(comm, local);
        match <T as num_traits::NumCast>::from(self.global_length()) {
            Some(n) if n > T::zero() => sum / n,
            _ => T::nan(),
        }
    }

    /// Collective: the whole vector on every rank, indexed by `gid - min_all_global_index`.
    ///
    /// Entries no rank owns stay zero. An index listed more than once takes
    /// the value of its first occurrence on the lowest rank, the owner
    /// [`Directory`](crate::data::directory::Directory) reports.
    pub fn gather_global<C>(&self, comm: &C) -> Vec<T>
    where
        C: Communicator + ?Sized,
    {
        let gids: Vec<GlobalOrdinal> = self.map.global_indices().collect();
        let all_gids = all_gather_slices(comm, &gids);
        let all_vals = all_gather_slices(comm, &self.values);
        let lo = self.map.min_all_global_index();
        let span = (self.map.max_all_global_index() - lo + 1).max(0) as usize;
        let mut out = vec![T::zero(); span];
        let mut filled = vec![false; span];
        for (g, v) in all_gids.iter().zip(&all_vals) {
            for (&gid, &val) in g.iter().zip(v) {
                let at = (gid - lo) as usize;
                if !filled[at] {
                    out[at] = val;
                    filled[at] = true;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use crate::data::directory::Directory;
    use crate::data::map::LocalGlobal;

    fn serial_map(n: u64) -> Arc<Map> {
        Arc::new(Map::new(n, 0, &NoComm, LocalGlobal::GloballyDistributed).unwrap())
    }

    #[test]
    fn clone_is_deep() {
        let mut x = Vector::<f64>::new(serial_map(3));
        let y = x.clone();
        x.put_scalar(2.0);
        assert_eq!(y.local_values(), &[0.0, 0.0, 0.0]);
        assert!(Arc::ptr_eq(x.map(), y.map()));
    }

    #[test]
    fn zero_beta_ignores_nan_contents() {
        let map = serial_map(2);
        let mut x = Vector::from_values(map.clone(), vec![f64::NAN, 1.0]).unwrap();
        let a = Vector::from_values(map, vec![1.0, 2.0]).unwrap();
        x.update(3.0, &a, 0.0).unwrap();
        assert_eq!(x.local_values(), &[3.0, 6.0]);
    }

    #[test]
    fn randomize_stays_in_range_and_is_reproducible() {
        let mut a = Vector::<f32>::new(serial_map(64));
        let mut b = Vector::<f32>::new(serial_map(64));
        a.randomize_with_seed(9);
        b.randomize_with_seed(9);
        assert_eq!(a, b);
        assert!(a.local_values().iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn norms_of_known_vector() {
        let x = Vector::from_values(serial_map(2), vec![3.0, -4.0]).unwrap();
        assert_eq!(x.norm1(&NoComm), 7.0);
        assert_eq!(x.norm2(&NoComm), 5.0);
        assert_eq!(x.norm_inf(&NoComm), 4.0);
        assert_eq!(x.mean_value(&NoComm), -0.5);
    }

    #[test]
    fn length_mismatch_is_reported() {
        let err = Vector::from_values(serial_map(2), vec![1.0f64]).unwrap_err();
        assert_eq!(err, DistError::LengthMismatch { expected: 2, got: 1 });
    }

    #[test]
    fn gather_of_overlapping_lists_agrees_with_directory_owner() {
        let out = ThreadComm::run(2, |comm| {
            let (gids, vals) = if comm.rank() == 0 {
                (vec![4i64, 2], vec![10.0, 20.0])
            } else {
                (vec![2i64, 5], vec![30.0, 40.0])
            };
            let map = Arc::new(Map::from_global_indices(None, &gids, 0, &comm).unwrap());
            let v = Vector::<f64>::from_values(Arc::clone(&map), vals).unwrap();
            let owner = Directory::new(&map, &comm).owner(2);
            (v.gather_global(&comm), owner)
        });
        for (gathered, owner) in out {
            assert_eq!(gathered, vec![20.0, 0.0, 10.0, 40.0]);
            assert_eq!(owner, Some((0, 1)));
        }
    }
}
