//! Array-of-values POI indexer: runs of pointer-sized slots whose
//! successive values stay within a small delta of each other.

use crate::arch::{Architecture, Endianness};
use crate::buffer::read_ptr;
use crate::poi::{PoiKind, PoiList};

/// Maximum delta between successive values for them to stay in the
/// same run.
const MAX_STEP: u64 = 0x1000;
const MIN_RUN_LEN: i64 = 8;

/// Walks `data` in pointer-size strides, grouping consecutive nonzero,
/// non-all-ones values whose absolute difference never exceeds
/// [`MAX_STEP`] into `Array` POIs.
pub fn index_arrays(data: &[u8], arch: Architecture, endian: Endianness, poi_list: &mut PoiList) {
    let ptr_size = arch.pointer_size();
    if data.len() < ptr_size {
        return;
    }
    let all_ones = arch.all_ones();

    let mut in_array = false;
    let mut run_start = 0usize;
    let mut count: i64 = 0;
    let mut prev = 0u64;

    let mut cursor = 0usize;
    while cursor <= data.len() - ptr_size {
        let value = read_ptr(data, cursor, arch, endian);

        if !in_array {
            if value != 0 && value != all_ones {
                run_start = cursor;
                in_array = true;
                count = 0;
            }
        } else if value.abs_diff(prev) > MAX_STEP {
            in_array = false;
            if count > MIN_RUN_LEN {
                poi_list.add(run_start as u64, count, PoiKind::Array);
            }
            count = 0;
        } else {
            count += 1;
        }

        prev = value;
        cursor += ptr_size;
    }

    if in_array && count > MIN_RUN_LEN {
        poi_list.add(run_start as u64, count, PoiKind::Array);
    }
}
