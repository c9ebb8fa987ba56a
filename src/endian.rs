//! Endianness and pointer-base inference: scans the image as both
//! little- and big-endian pointer streams and votes in two parallel
//! tries, then keeps whichever interpretation produced the heavier
//! vote.

use crate::arch::{Architecture, Endianness};
use crate::buffer::read_ptr;
use crate::progress::ProgressSink;
use crate::trie::AddrTrieNode;

const PHASE_LABEL: &str = "Guessing endianness";

/// Register a fresh address into both tries roughly every this many
/// scanned offsets, to keep them within the soft memory cap.
const FILTER_INTERVAL: usize = 0x10000;

/// Outcome of a full endianness scan.
#[derive(Debug, Clone, Copy)]
pub struct EndianVerdict {
    pub endian: Endianness,
    pub ptr_base: u64,
    pub mask: u64,
    /// Set when the LE and BE vote totals tied; the verdict still
    /// names a winner (`Le`, by convention) but callers should treat
    /// it as inconclusive.
    pub tied: bool,
}

/// Scans `data` under `arch`, building independent vote tries for the
/// little-endian and big-endian interpretation of every unaligned
/// pointer-sized window, and returns whichever side scored higher.
pub fn detect(data: &[u8], arch: Architecture, progress: &dyn ProgressSink) -> EndianVerdict {
    let ptr_size = arch.pointer_size();
    let pointer_bits = (ptr_size * 8) as u64;

    let content_size = data.len();
    let nbits = if content_size > 0 {
        (content_size as f64).log2().floor() as u32 + 1
    } else {
        1
    };
    let high_mask = if nbits >= 1 {
        u64::MAX << (nbits - 1)
    } else {
        u64::MAX
    };

    let mut tree_le = AddrTrieNode::new();
    let mut tree_be = AddrTrieNode::new();

    if content_size < ptr_size {
        return EndianVerdict {
            endian: Endianness::Le,
            ptr_base: 0,
            mask: 0,
            tied: true,
        };
    }

    let scan_len = (content_size - ptr_size) as u64;
    for offset in 0..=(content_size - ptr_size) {
        if offset as u64 % ((scan_len / 100).max(10)) == 0 {
            progress.update(PHASE_LABEL, offset as u64, scan_len);
        }

        let le = read_ptr(data, offset, arch, Endianness::Le);
        let be = read_ptr(data, offset, arch, Endianness::Be);

        if le != 0 && le % 4 == 0 {
            tree_le.insert(le & high_mask);
        }
        if be != 0 && be % 4 == 0 {
            tree_be.insert(be & high_mask);
        }

        if offset % FILTER_INTERVAL == 0 {
            let max_le = tree_le.max_vote();
            tree_le.filter(max_le / 2);
            let max_be = tree_be.max_vote();
            tree_be.filter(max_be / 2);
        }
    }
    progress.finish(PHASE_LABEL);

    let max_le = tree_le.max_vote();
    let max_be = tree_be.max_vote();

    let skip_levels = 8 - ptr_size;
    let take_levels = ptr_size / 2;
    let high_half_shift = pointer_bits / 2;

    let tied = max_le == max_be;
    let endian = if max_be > max_le {
        Endianness::Be
    } else {
        Endianness::Le
    };

    let winner = if endian == Endianness::Be { &tree_be } else { &tree_le };
    let path = winner.best_path(skip_levels, take_levels);
    let ptr_base = path << high_half_shift;
    let mask = 0xffffu64 << (pointer_bits - 16);

    EndianVerdict {
        endian,
        ptr_base,
        mask,
        tied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;

    #[test]
    fn detects_little_endian_pointer_stream() {
        let mut data = vec![0u8; 256];
        for i in 0..40usize {
            let value: u32 = 0x0001_0000 + (i as u32) * 4;
            data[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        let verdict = detect(&data, Architecture::Arch32, &NullProgress);
        assert_eq!(verdict.endian, Endianness::Le);
        assert!(!verdict.tied);
    }

    #[test]
    fn detects_big_endian_pointer_stream() {
        let mut data = vec![0u8; 256];
        for i in 0..40usize {
            let value: u32 = 0x0001_0000 + (i as u32) * 4;
            data[i * 4..i * 4 + 4].copy_from_slice(&value.to_be_bytes());
        }
        let verdict = detect(&data, Architecture::Arch32, &NullProgress);
        assert_eq!(verdict.endian, Endianness::Be);
    }

    #[test]
    fn empty_scan_ties_and_defaults_to_le() {
        let data = vec![0u8; 2];
        let verdict = detect(&data, Architecture::Arch32, &NullProgress);
        assert_eq!(verdict.endian, Endianness::Le);
        assert!(verdict.tied);
    }
}
