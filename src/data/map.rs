//! Map: distribution of global indices over the ranks of a communicator.
//!
//! A `Map` records which global indices every rank owns and how they are
//! numbered locally. Maps are immutable once built; share them through
//! `Arc<Map>`. Every constructor is **collective**: all ranks of the
//! communicator must call it with consistent arguments.
//!
//! Two layouts are stored:
//! - *contiguous*: rank `k` owns the half-open block `[starts[k], starts[k+1])`,
//!   so the owner of any index is known locally;
//! - *listed*: the rank owns an explicit list of indices.
//!
//! A listed map whose lists happen to tile `[index_base, index_base + n)` in
//! rank order is stored (and reported) as contiguous.

use std::collections::HashMap;
use std::fmt;

use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};

use crate::algs::collective::{
    all_equal, all_gather_value, all_reduce_and, all_reduce_max_i64, all_reduce_min_i64,
    all_reduce_sum,
};
use crate::algs::communicator::Communicator;
use crate::algs::wire::WireBlock;
use crate::data::directory::Directory;
use crate::dist_error::DistError;

/// Global index type.
pub type GlobalOrdinal = i64;
/// Local index type.
pub type LocalOrdinal = usize;

/// Whether a contiguous map is split across ranks or copied onto every rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalGlobal {
    /// Every rank owns all elements.
    LocallyReplicated,
    /// Elements are block-partitioned over the ranks.
    #[default]
    GloballyDistributed,
}

#[derive(Clone, Debug, PartialEq)]
enum Layout {
    Contiguous {
        first: GlobalOrdinal,
        len: usize,
        /// Block start of every rank plus the end sentinel; empty when replicated.
        starts: Vec<GlobalOrdinal>,
    },
    Listed {
        gids: Vec<GlobalOrdinal>,
        lookup: HashMap<GlobalOrdinal, LocalOrdinal>,
    },
}

/// Immutable assignment of global indices to ranks.
///
/// # Invariants
///
/// - Contiguous layouts satisfy `first == starts[rank]` and
///   `first + len == starts[rank + 1]` when distributed.
/// - Listed layouts map every listed index to its first local position.
/// - Every owned index lies in `[min_all_global_index, max_all_global_index]`
///   and is at least `index_base`.
#[derive(Clone, Debug, PartialEq)]
pub struct Map {
    global_num_elements: u64,
    index_base: GlobalOrdinal,
    rank: usize,
    num_procs: usize,
    distributed: bool,
    min_all_gid: GlobalOrdinal,
    max_all_gid: GlobalOrdinal,
    layout: Layout,
}

/// Block start of every rank (plus end sentinel) for an even split of
/// `n` elements: the first `n % p` ranks own one extra element.
pub(crate) fn block_starts(n: u64, p: usize, index_base: GlobalOrdinal) -> Vec<GlobalOrdinal> {
    let p64 = p as u64;
    let (q, r) = (n / p64, n % p64);
    (0..=p64)
        .map(|k| index_base + (k * q + k.min(r)) as GlobalOrdinal)
        .collect()
}

fn check_index_base<C>(comm: &C, index_base: GlobalOrdinal) -> Result<(), DistError>
where
    C: Communicator + ?Sized,
{
    if all_equal(comm, index_base) {
        Ok(())
    } else {
        Err(DistError::InconsistentIndexBase { local: index_base })
    }
}

/// Validate an optional declared global count against the actual sum of local counts.
fn check_declared_count<C>(comm: &C, declared: Option<u64>, actual: u64) -> Result<(), DistError>
where
    C: Communicator + ?Sized,
{
    let wire = declared.unwrap_or(u64::MAX);
    if !all_equal(comm, wire) {
        return Err(DistError::InconsistentGlobalCount { local: wire });
    }
    match declared {
        Some(declared) if declared != actual => {
            Err(DistError::GlobalCountMismatch { declared, actual })
        }
        _ => Ok(()),
    }
}

impl Map {
    /// Build a contiguous map over `num_global` elements starting at `index_base`.
    ///
    /// With `GloballyDistributed`, rank `k` of `P` owns `n / P` elements, plus
    /// one more if `k < n % P`, in rank order. With `LocallyReplicated`, every
    /// rank owns all elements.
    ///
    /// # Errors
    /// `InconsistentGlobalCount` / `InconsistentIndexBase` if the ranks disagree
    /// on the arguments.
    ///
    /// # Example
    /// ```rust
    /// # fn try_main() -> Result<(), distvec::dist_error::DistError> {
    /// use distvec::algs::communicator::NoComm;
    /// use distvec::data::map::{LocalGlobal, Map};
    /// let map = Map::new(5, 0, &NoComm, LocalGlobal::GloballyDistributed)?;
    /// assert!(map.is_contiguous());
    /// assert_eq!(map.global_indices().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<C>(
        num_global: u64,
        index_base: GlobalOrdinal,
        comm: &C,
        lg: LocalGlobal,
    ) -> Result<Self, DistError>
    where
        C: Communicator + ?Sized,
    {
        if !all_equal(comm, num_global) {
            return Err(DistError::InconsistentGlobalCount { local: num_global });
        }
        check_index_base(comm, index_base)?;

        let (rank, p) = (comm.rank(), comm.size());
        let (layout, distributed) = match lg {
            LocalGlobal::LocallyReplicated => (
                Layout::Contiguous {
                    first: index_base,
                    len: num_global as usize,
                    starts: Vec::new(),
                },
                false,
            ),
            LocalGlobal::GloballyDistributed => {
                let starts = block_starts(num_global, p, index_base);
                let first = starts[rank];
                let len = (starts[rank + 1] - first) as usize;
                (Layout::Contiguous { first, len, starts }, p > 1)
            }
        };
        let map = Map {
            global_num_elements: num_global,
            index_base,
            rank,
            num_procs: p,
            distributed,
            min_all_gid: index_base,
            max_all_gid: index_base + num_global as GlobalOrdinal - 1,
            layout,
        };
        log::debug!("built {map}");
        map.checked()
    }

    /// Build a contiguous map where every rank chooses its own local count.
    ///
    /// `num_global = None` means "the sum of all local counts".
    ///
    /// # Errors
    /// `GlobalCountMismatch` if a declared global count differs from the sum.
    pub fn with_local_count<C>(
        num_global: Option<u64>,
        num_local: usize,
        index_base: GlobalOrdinal,
        comm: &C,
    ) -> Result<Self, DistError>
    where
        C: Communicator + ?Sized,
    {
        check_index_base(comm, index_base)?;
        let counts = all_gather_value(comm, num_local as u64);
        let actual: u64 = counts.iter().sum();
        check_declared_count(comm, num_global, actual)?;

        let mut starts = Vec::with_capacity(counts.len() + 1);
        let mut next = index_base;
        starts.push(next);
        for c in &counts {
            next += *c as GlobalOrdinal;
            starts.push(next);
        }
        let rank = comm.rank();
        let map = Map {
            global_num_elements: actual,
            index_base,
            rank,
            num_procs: comm.size(),
            distributed: comm.size() > 1,
            min_all_gid: index_base,
            max_all_gid: index_base + actual as GlobalOrdinal - 1,
            layout: Layout::Contiguous {
                first: starts[rank],
                len: num_local,
                starts,
            },
        };
        log::debug!("built {map}");
        map.checked()
    }

    /// Build a map from the list of global indices this rank owns.
    ///
    /// Lists may overlap between ranks; the global count is then the sum of
    /// the local counts, as for disjoint lists.
    ///
    /// # Errors
    /// - `IndexBelowBase` on the rank that passed an index smaller than
    ///   `index_base`; every other rank gets `PeerFailed`.
    /// - `GlobalCountMismatch` if a declared global count differs from the sum.
    pub fn from_global_indices<C>(
        num_global: Option<u64>,
        gids: &[GlobalOrdinal],
        index_base: GlobalOrdinal,
        comm: &C,
    ) -> Result<Self, DistError>
    where
        C: Communicator + ?Sized,
    {
        check_index_base(comm, index_base)?;
        let below = gids.iter().copied().find(|&g| g < index_base);
        if !all_reduce_and(comm, below.is_none()) {
            return Err(match below {
                Some(index) => DistError::IndexBelowBase {
                    index,
                    base: index_base,
                },
                None => DistError::PeerFailed("a global index below the index base".to_string()),
            });
        }
        let actual = all_reduce_sum(comm, gids.len() as u64);
        check_declared_count(comm, num_global, actual)?;

        let (rank, p) = (comm.rank(), comm.size());
        let local_min = gids.iter().copied().min().unwrap_or(GlobalOrdinal::MAX);
        let local_max = gids.iter().copied().max().unwrap_or(GlobalOrdinal::MIN);
        let (min_all_gid, max_all_gid) = if actual == 0 {
            (index_base, index_base - 1)
        } else {
            (
                all_reduce_min_i64(comm, local_min),
                all_reduce_max_i64(comm, local_max),
            )
        };

        let is_run = gids.iter().tuple_windows().all(|(a, b)| *b == *a + 1);
        let first = gids.first().copied().unwrap_or(index_base);
        let blocks = all_gather_value(comm, WireBlock::new(first, gids.len(), is_run));
        let starts = contiguous_starts(&blocks, index_base);

        let layout = match starts {
            Some(starts) => Layout::Contiguous {
                first: starts[rank],
                len: gids.len(),
                starts,
            },
            None => {
                let mut lookup = HashMap::with_capacity(gids.len());
                for (lid, &gid) in gids.iter().enumerate() {
                    lookup.entry(gid).or_insert(lid);
                }
                if lookup.len() != gids.len() {
                    log::warn!(
                        "rank {rank}: index list repeats {} global indices",
                        gids.len() - lookup.len()
                    );
                }
                Layout::Listed {
                    gids: gids.to_vec(),
                    lookup,
                }
            }
        };
        let map = Map {
            global_num_elements: actual,
            index_base,
            rank,
            num_procs: p,
            distributed: p > 1,
            min_all_gid,
            max_all_gid,
            layout,
        };
        log::debug!("built {map}");
        map.checked()
    }

    fn checked(self) -> Result<Self, DistError> {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.validate_invariants()?;
        Ok(self)
    }

    /// Verify the structural invariants listed on [`Map`].
    pub fn validate_invariants(&self) -> Result<(), DistError> {
        match &self.layout {
            Layout::Contiguous { first, len, starts } => {
                if !starts.is_empty() {
                    if starts.len() != self.num_procs + 1 {
                        return Err(DistError::Logic(format!(
                            "expected {} block starts, found {}",
                            self.num_procs + 1,
                            starts.len()
                        )));
                    }
                    if starts[self.rank] != *first
                        || starts[self.rank + 1] != *first + *len as GlobalOrdinal
                    {
                        return Err(DistError::Logic(format!(
                            "rank {} block [{first}, +{len}) disagrees with block starts",
                            self.rank
                        )));
                    }
                }
            }
            Layout::Listed { gids, lookup } => {
                for (&gid, &lid) in lookup {
                    if gids.get(lid) != Some(&gid) {
                        return Err(DistError::Logic(format!(
                            "lookup maps {gid} to local {lid}, which holds {:?}",
                            gids.get(lid)
                        )));
                    }
                }
            }
        }
        for gid in self.global_indices() {
            if gid < self.index_base {
                return Err(DistError::IndexBelowBase {
                    index: gid,
                    base: self.index_base,
                });
            }
            if gid < self.min_all_gid || gid > self.max_all_gid {
                return Err(DistError::Logic(format!(
                    "index {gid} outside [{}, {}]",
                    self.min_all_gid, self.max_all_gid
                )));
            }
        }
        Ok(())
    }

    pub fn global_num_elements(&self) -> u64 {
        self.global_num_elements
    }

    pub fn local_num_elements(&self) -> usize {
        match &self.layout {
            Layout::Contiguous { len, .. } => *len,
            Layout::Listed { gids, .. } => gids.len(),
        }
    }

    pub fn index_base(&self) -> GlobalOrdinal {
        self.index_base
    }

    /// Rank of the process this map instance lives on.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn num_procs(&self) -> usize {
        self.num_procs
    }

    /// True if every rank owns one unbroken block and the blocks follow rank order.
    pub fn is_contiguous(&self) -> bool {
        matches!(self.layout, Layout::Contiguous { .. })
    }

    /// True if more than one rank participates and elements are not replicated.
    pub fn is_distributed(&self) -> bool {
        self.distributed
    }

    /// Smallest global index owned by this rank.
    pub fn min_global_index(&self) -> Option<GlobalOrdinal> {
        match &self.layout {
            Layout::Contiguous { first, len, .. } => (*len > 0).then_some(*first),
            Layout::Listed { gids, .. } => gids.iter().copied().min(),
        }
    }

    /// Largest global index owned by this rank.
    pub fn max_global_index(&self) -> Option<GlobalOrdinal> {
        match &self.layout {
            Layout::Contiguous { first, len, .. } => {
                (*len > 0).then(|| *first + *len as GlobalOrdinal - 1)
            }
            Layout::Listed { gids, .. } => gids.iter().copied().max(),
        }
    }

    pub fn min_all_global_index(&self) -> GlobalOrdinal {
        self.min_all_gid
    }

    pub fn max_all_global_index(&self) -> GlobalOrdinal {
        self.max_all_gid
    }

    /// Local position of `gid`, if this rank owns it.
    pub fn local_index(&self, gid: GlobalOrdinal) -> Option<LocalOrdinal> {
        match &self.layout {
            Layout::Contiguous { first, len, .. } => {
                (gid >= *first && gid < *first + *len as GlobalOrdinal)
                    .then(|| (gid - *first) as LocalOrdinal)
            }
            Layout::Listed { lookup, .. } => lookup.get(&gid).copied(),
        }
    }

    /// Global index stored at local position `lid`.
    pub fn global_index(&self, lid: LocalOrdinal) -> Option<GlobalOrdinal> {
        match &self.layout {
            Layout::Contiguous { first, len, .. } => {
                (lid < *len).then(|| *first + lid as GlobalOrdinal)
            }
            Layout::Listed { gids, .. } => gids.get(lid).copied(),
        }
    }

    pub fn is_node_global_element(&self, gid: GlobalOrdinal) -> bool {
        self.local_index(gid).is_some()
    }

    pub fn is_node_local_element(&self, lid: LocalOrdinal) -> bool {
        lid < self.local_num_elements()
    }

    /// Owned global indices in local order.
    pub fn global_indices(&self) -> impl Iterator<Item = GlobalOrdinal> + '_ {
        match &self.layout {
            Layout::Contiguous { first, len, .. } => {
                Either::Left(*first..*first + *len as GlobalOrdinal)
            }
            Layout::Listed { gids, .. } => Either::Right(gids.iter().copied()),
        }
    }

    /// Owner `(rank, local index)` of `gid`, answered without communication.
    ///
    /// Only contiguous maps can answer; listed maps return `None`.
    pub(crate) fn contiguous_owner(&self, gid: GlobalOrdinal) -> Option<(usize, LocalOrdinal)> {
        let Layout::Contiguous { starts, .. } = &self.layout else {
            return None;
        };
        if starts.is_empty() {
            return self.local_index(gid).map(|lid| (self.rank, lid));
        }
        let end = *starts.last()?;
        if gid < starts[0] || gid >= end {
            return None;
        }
        let owner = starts.partition_point(|&s| s <= gid) - 1;
        Some((owner, (gid - starts[owner]) as LocalOrdinal))
    }

    /// Collective: same global count and same local count on every rank.
    ///
    /// Vectors over compatible maps may be combined element-wise even when
    /// the index assignment differs.
    pub fn is_compatible<C>(&self, other: &Map, comm: &C) -> bool
    where
        C: Communicator + ?Sized,
    {
        if self.global_num_elements != other.global_num_elements {
            return false;
        }
        all_reduce_and(
            comm,
            self.local_num_elements() == other.local_num_elements(),
        )
    }

    /// Collective: identical distributions (every rank owns the same indices
    /// in the same local order).
    pub fn is_same_as<C>(&self, other: &Map, comm: &C) -> bool
    where
        C: Communicator + ?Sized,
    {
        // globally uniform properties: every rank returns early together
        if self.index_base != other.index_base
            || self.global_num_elements != other.global_num_elements
            || self.min_all_gid != other.min_all_gid
            || self.max_all_gid != other.max_all_gid
            || self.distributed != other.distributed
            || self.is_contiguous() != other.is_contiguous()
        {
            return false;
        }
        let local_same = self.local_num_elements() == other.local_num_elements()
            && match (&self.layout, &other.layout) {
                (
                    Layout::Contiguous { first: a, .. },
                    Layout::Contiguous { first: b, .. },
                ) => a == b,
                _ => self.global_indices().eq(other.global_indices()),
            };
        all_reduce_and(comm, local_same)
    }

    /// Collective: owner `(rank, local index)` of every index in `gids`.
    ///
    /// # Errors
    /// `GlobalIndexNotFound` for the first index no rank owns.
    pub fn remote_index_list<C>(
        &self,
        gids: &[GlobalOrdinal],
        comm: &C,
    ) -> Result<Vec<(usize, LocalOrdinal)>, DistError>
    where
        C: Communicator + ?Sized,
    {
        Directory::new(self, comm).lookup(gids)
    }
}

/// Block starts if `blocks` (one per rank) tile `[index_base, ..)` in rank order.
fn contiguous_starts(blocks: &[WireBlock], index_base: GlobalOrdinal) -> Option<Vec<GlobalOrdinal>> {
    let mut starts = Vec::with_capacity(blocks.len() + 1);
    let mut next = index_base;
    for b in blocks {
        if !b.is_empty() && (!b.is_run() || b.first() != next) {
            return None;
        }
        starts.push(next);
        next += b.len() as GlobalOrdinal;
    }
    starts.push(next);
    Some(starts)
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Map(global={}, local={}, base={}, rank {}/{}, {}, {})",
            self.global_num_elements,
            self.local_num_elements(),
            self.index_base,
            self.rank,
            self.num_procs,
            if self.is_contiguous() {
                "contiguous"
            } else {
                "listed"
            },
            if self.distributed {
                "distributed"
            } else {
                "local"
            },
        )
    }
}
