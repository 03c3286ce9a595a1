//! Directory: find the owning rank of arbitrary global indices.
//!
//! Contiguous maps answer arithmetically from their block starts. Listed
//! maps gather every rank's index list once (collective) and answer from a
//! hash table; an index listed by several ranks belongs to the lowest rank.

use std::collections::HashMap;

use crate::algs::collective::all_gather_slices;
use crate::algs::communicator::Communicator;
use crate::data::map::{GlobalOrdinal, LocalOrdinal, Map};
use crate::dist_error::DistError;

pub struct Directory<'a> {
    map: &'a Map,
    table: Option<HashMap<GlobalOrdinal, (usize, LocalOrdinal)>>,
}

impl<'a> Directory<'a> {
    /// Collective for listed maps; communication-free for contiguous ones.
    pub fn new<C>(map: &'a Map, comm: &C) -> Self
    where
        C: Communicator + ?Sized,
    {
        if map.is_contiguous() {
            return Directory { map, table: None };
        }
        let mine: Vec<GlobalOrdinal> = map.global_indices().collect();
        let lists = all_gather_slices(comm, &mine);
        let mut table = HashMap::with_capacity(map.global_num_elements() as usize);
        for (rank, list) in lists.iter().enumerate() {
            for (lid, &gid) in list.iter().enumerate() {
                table.entry(gid).or_insert((rank, lid));
            }
        }
        log::debug!(
            "rank {}: directory over {} distinct indices",
            map.rank(),
            table.len()
        );
        Directory {
            map,
            table: Some(table),
        }
    }

    pub fn owner(&self, gid: GlobalOrdinal) -> Option<(usize, LocalOrdinal)> {
        match &self.table {
            Some(table) => table.get(&gid).copied(),
            None => self.map.contiguous_owner(gid),
        }
    }

    /// Owners of all `gids`, in input order.
    pub fn lookup(&self, gids: &[GlobalOrdinal]) -> Result<Vec<(usize, LocalOrdinal)>, DistError> {
        gids.iter()
            .map(|&g| self.owner(g).ok_or(DistError::GlobalIndexNotFound(g)))
            .collect()
    }
}
