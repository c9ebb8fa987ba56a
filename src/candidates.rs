//! Base-address candidate generation: pairs every 4-byte-stride value
//! in the image against a chosen set of anchor POIs (strings, or
//! functions when no strings exist) and votes plausible deltas into an
//! address trie.

use crate::arch::{Architecture, Endianness};
use crate::buffer::read_ptr;
use crate::memregion::{RegionKind, RegionMap};
use crate::poi::{PoiKind, PoiList};
use crate::progress::ProgressSink;
use crate::trie::AddrTrieNode;

const PHASE_LABEL: &str = "Analyzing";

pub const DEFAULT_MEM_ALIGN: u64 = 0x1000;
/// Soft cap on the candidate trie's `memsize()`, matching the
/// original's `MAX_MEM_AMOUNT`.
pub const MAX_MEM_AMOUNT: u64 = 4_000_000_000;
const MIN_WORKING_SET: usize = 30;

#[derive(Debug, Clone, Copy)]
pub struct BaseAddressCandidate {
    pub address: u64,
    pub votes: i64,
    pub nb_pointers: i64,
}

fn is_ascii_ptr(value: u64, arch: Architecture) -> bool {
    let mut v = value;
    for _ in 0..arch.pointer_size() {
        let byte = v & 0xff;
        if !(0x20..=0x7f).contains(&byte) {
            return false;
        }
        v >>= 8;
    }
    true
}

/// Which POI kind anchors candidate generation: strings if any were
/// found, functions otherwise.
pub fn pairing_kind(strings: &PoiList) -> PoiKind {
    if strings.count() > 0 {
        PoiKind::String
    } else {
        PoiKind::Function
    }
}

/// Builds and votes the candidate delta trie, applying the soft
/// memory cap after each anchor POI's inner scan, then returns the
/// working set: enough top-voted candidates to cover at least
/// [`MIN_WORKING_SET`] entries (all of them, in deep mode), sorted by
/// descending vote count.
pub fn compute(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    anchors: &PoiList,
    kind: PoiKind,
    mem_align: u64,
    ptr_aligned: bool,
    deep_mode: bool,
    progress: &dyn ProgressSink,
) -> Vec<BaseAddressCandidate> {
    let ptr_size = arch.pointer_size();
    let align_mask = mem_align.wrapping_sub(1);
    let max_address = arch.all_ones();
    let content_size = data.len() as u64;

    let total_anchors = anchors.by_kind(kind).count() as u64;
    let mut tree = AddrTrieNode::new();

    for (anchor_idx, poi) in anchors.by_kind(kind).enumerate() {
        progress.update(PHASE_LABEL, anchor_idx as u64, total_anchors);
        let mut cursor = 0usize;
        while cursor + ptr_size <= data.len() {
            let v = read_ptr(data, cursor, arch, endian);

            if (v & align_mask) == (poi.offset & align_mask)
                && !is_ascii_ptr(v, arch)
                && (!ptr_aligned || v % ptr_size as u64 == 0)
                && v >= poi.offset
            {
                let delta = v - poi.offset;
                let freespace = (max_address - delta).wrapping_add(1);
                if freespace >= content_size {
                    tree.insert(delta);
                }
            }

            cursor += ptr_size;
        }

        if tree.memsize() > MAX_MEM_AMOUNT {
            let max_votes = tree.max_vote();
            tree.filter(max_votes / 2);
        }
    }
    progress.finish(PHASE_LABEL);

    let mut all = Vec::new();
    tree.browse(&mut |addr, votes| all.push((addr, votes)));

    let max_votes = all.iter().map(|&(_, v)| v).max().unwrap_or(0);
    let survivors: Vec<(u64, i64)> = all
        .into_iter()
        .filter(|&(_, v)| (max_votes > 1 && v > 1) || max_votes == 1)
        .collect();

    let mut working_set = if deep_mode {
        survivors
    } else {
        let mut threshold = 0i64;
        for i in (0..=max_votes).rev() {
            let count = survivors.iter().filter(|&&(_, v)| v >= i).count();
            if count >= MIN_WORKING_SET {
                threshold = i;
                break;
            }
        }
        survivors
            .into_iter()
            .filter(|&(_, v)| v >= threshold)
            .collect()
    };

    working_set.sort_by(|a, b| b.1.cmp(&a.1));
    working_set
        .into_iter()
        .map(|(address, votes)| BaseAddressCandidate {
            address,
            votes,
            nb_pointers: 0,
        })
        .collect()
}

/// Finds the widest common high-bit mask under which every value of
/// an `Array` POI plausibly targets the code region, and records the
/// masked-off low parts as `Function` POIs. Used in place of a string
/// anchor when the image carries no text strings at all.
pub fn index_functions(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    regions: &RegionMap,
    arrays: &PoiList,
    poi_list: &mut PoiList,
) {
    let ptr_size = arch.pointer_size();
    let max_code_addr = regions.max_code_end();
    if max_code_addr == 0 {
        return;
    }
    let z = (max_code_addr as f64).log2().floor() as i32;

    for array in arrays.by_kind(PoiKind::Array) {
        if array.count <= 0 {
            continue;
        }
        let count = array.count as usize;
        if (array.offset as usize) + count * ptr_size > data.len() {
            continue;
        }

        let mut best_mask: Option<u64> = None;
        let mut i = 31i32;
        while i > z - 1 {
            let ba_mask = u64::MAX << i;
            let first = read_ptr(data, array.offset as usize, arch, endian);
            if regions.type_at(first & !ba_mask) != RegionKind::Code {
                break;
            }
            let ptr_h = first & ba_mask;

            let mut matched = 1usize;
            for j in 1..count {
                let offset = array.offset as usize + j * ptr_size;
                let value = read_ptr(data, offset, arch, endian);
                if (value & ba_mask) != ptr_h || regions.type_at(value & !ba_mask) != RegionKind::Code {
                    break;
                }
                matched += 1;
            }

            if matched == count {
                best_mask = Some(ba_mask);
                i -= 1;
            } else {
                break;
            }
        }

        if let Some(ba_mask) = best_mask {
            for j in 0..count {
                let offset = array.offset as usize + j * ptr_size;
                let value = read_ptr(data, offset, arch, endian);
                poi_list.add_unique((value & !ba_mask) as u64, -1, PoiKind::Function);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;

    fn le32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    #[test]
    fn votes_align_on_string_anchor_delta() {
        let base: u32 = 0x1000_0000;
        let mut data = vec![0u8; 256];
        data[64..64 + 11].copy_from_slice(b"hello world");

        let str_offset = 64u32;
        let value = base + str_offset;
        data[0..4].copy_from_slice(&le32(value));
        data[128..132].copy_from_slice(&le32(value));

        let mut strings = PoiList::new();
        strings.add(64, 11, PoiKind::String);

        let candidates = compute(
            &data,
            Architecture::Arch32,
            Endianness::Le,
            &strings,
            PoiKind::String,
            DEFAULT_MEM_ALIGN,
            false,
            true,
            &NullProgress,
        );
        assert!(candidates.iter().any(|c| c.address == base as u64));
    }

    #[test]
    fn deep_mode_keeps_all_survivors() {
        let data = vec![0u8; 512];
        let strings = PoiList::new();
        let candidates = compute(
            &data,
            Architecture::Arch32,
            Endianness::Le,
            &strings,
            PoiKind::String,
            DEFAULT_MEM_ALIGN,
            false,
            true,
            &NullProgress,
        );
        assert!(candidates.is_empty());
    }
}
