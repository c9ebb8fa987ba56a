//! String POI indexer: runs of printable bytes of at least
//! [`STR_MIN_SIZE`] bytes.

use crate::poi::{PoiKind, PoiList};

pub const STR_MIN_SIZE: usize = 8;

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte) || byte == b'\t'
}

/// Scans `data` for runs of printable bytes and records each run of at
/// least `min_size` bytes as a `String` POI.
pub fn index_strings(data: &[u8], min_size: usize, poi_list: &mut PoiList) {
    let mut run_start = 0usize;
    let mut in_run = false;
    let mut count = 0usize;

    for (cursor, &byte) in data.iter().enumerate() {
        if !in_run {
            if is_printable(byte) {
                in_run = true;
                run_start = cursor;
                count = 1;
            }
        } else if is_printable(byte) {
            count += 1;
        } else {
            in_run = false;
            if count >= min_size {
                poi_list.add(run_start as u64, count as i64, PoiKind::String);
            }
        }
    }
    if in_run && count >= min_size {
        poi_list.add(run_start as u64, count as i64, PoiKind::String);
    }
}
