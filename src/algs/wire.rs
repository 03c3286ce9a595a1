//! Fixed, little-endian wire records for map construction collectives.

use bytemuck::{Pod, Zeroable};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a received byte buffer into owned values.
///
/// Receive buffers carry no alignment guarantee, so every record is read
/// unaligned. Trailing bytes that do not form a full record are ignored.
pub fn decode_all<T: Pod>(raw: &[u8]) -> Vec<T> {
    raw.chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// One rank's owned block as seen by the contiguity check.
///
/// `run_le` is 1 when the rank's index list is a consecutive ascending run.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireBlock {
    pub first_le: i64,
    pub len_le: u64,
    pub run_le: u64,
}

impl WireBlock {
    pub fn new(first: i64, len: usize, run: bool) -> Self {
        Self {
            first_le: first.to_le(),
            len_le: (len as u64).to_le(),
            run_le: (run as u64).to_le(),
        }
    }
    pub fn first(&self) -> i64 {
        i64::from_le(self.first_le)
    }
    pub fn len(&self) -> usize {
        u64::from_le(self.len_le) as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn is_run(&self) -> bool {
        u64::from_le(self.run_le) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_unaligned_records() {
        let blocks = [WireBlock::new(-3, 4, true), WireBlock::new(9, 0, false)];
        let mut raw = vec![0u8];
        raw.extend_from_slice(cast_slice(&blocks));
        let back: Vec<WireBlock> = decode_all(&raw[1..]);
        assert_eq!(back, blocks);
        assert_eq!(back[0].first(), -3);
        assert!(back[1].is_empty() && !back[1].is_run());
    }
}
