//! One indexer per POI kind, plus a convenience driver that runs them
//! in the dependency order each one needs (pointers before pointer
//! arrays and structure arrays; strings before structure arrays).

pub mod arrays;
pub mod pointer_arrays;
pub mod pointers;
pub mod strings;
pub mod structures;

use crate::arch::{Architecture, Endianness};
use crate::memregion::RegionMap;
use crate::poi::PoiList;
use crate::progress::ProgressSink;

/// Output of a full indexing pass, kept as separate lists the way the
/// rest of the pipeline (candidate generation, UDS location) expects
/// them.
#[derive(Debug, Default)]
pub struct PoiIndexes {
    pub strings: PoiList,
    pub arrays: PoiList,
    pub pointers: PoiList,
    pub pointer_arrays: PoiList,
    pub structures: PoiList,
}

/// Runs every indexer over `data` against `base_address`, in the order
/// each one's inputs become available.
#[allow(clippy::too_many_arguments)]
pub fn run_all(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    regions: &RegionMap,
    base_address: u64,
    known_functions: &[u64],
    include_strings: bool,
    progress: &dyn ProgressSink,
) -> PoiIndexes {
    let mut out = PoiIndexes::default();

    if include_strings {
        strings::index_strings(data, strings::STR_MIN_SIZE, &mut out.strings);
        progress.finish("Indexing strings");
    }
    arrays::index_arrays(data, arch, endian, &mut out.arrays);
    progress.finish("Indexing arrays");
    pointers::index_pointers(
        data,
        arch,
        endian,
        regions,
        base_address,
        known_functions,
        &mut out.pointers,
    );
    progress.finish("Indexing pointers");
    pointer_arrays::index_pointer_arrays(&out.pointers, arch, &mut out.pointer_arrays);
    progress.finish("Indexing pointer arrays");
    structures::index_structure_arrays(
        data,
        arch,
        endian,
        &out.pointers,
        &out.strings,
        base_address,
        &mut out.structures,
    );
    progress.finish("Searching structures");

    out
}
