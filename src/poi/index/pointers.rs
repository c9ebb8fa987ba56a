//! Pointer POI indexer: classifies pointer-sized values as generic,
//! function, or symbol-biased function pointers.

use crate::arch::{Architecture, Endianness};
use crate::buffer::read_ptr;
use crate::memregion::{RegionKind, RegionMap};
use crate::poi::{PoiKind, PoiList};

/// Walks `data` in pointer-size strides and records a pointer POI for
/// every value that plausibly targets code or initialized data within
/// the image, under the given `base_address`.
///
/// `known_functions` holds firmware-relative offsets read from an
/// optional symbols file (see [`crate::symbols`]); a value landing on
/// one of them is unconditionally classified as `FunctionPointer`,
/// overriding the region-based classification.
pub fn index_pointers(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    regions: &RegionMap,
    base_address: u64,
    known_functions: &[u64],
    poi_list: &mut PoiList,
) {
    let ptr_size = arch.pointer_size();
    if data.len() < ptr_size {
        return;
    }

    let mut cursor = 0usize;
    while cursor <= data.len() - ptr_size {
        let value = read_ptr(data, cursor, arch, endian);

        if !known_functions.is_empty() {
            if let Some(offset) = value.checked_sub(base_address) {
                if known_functions.contains(&offset) {
                    poi_list.add(cursor as u64, 1, PoiKind::FunctionPointer);
                }
            }
        } else if value >= base_address && value < base_address + data.len() as u64 && value != 0
        {
            let target = value - base_address;
            let kind = regions.type_at(target);
            match kind {
                RegionKind::Code => {
                    poi_list.add(cursor as u64, 1, PoiKind::FunctionPointer);
                }
                RegionKind::InitData => {
                    poi_list.add(cursor as u64, 1, PoiKind::GenericPointer);
                }
                RegionKind::Unknown | RegionKind::UninitData => {}
            }
        }

        cursor += ptr_size;
    }
}
