//! Pointer-array POI indexer: runs of pointer POIs that are exactly
//! pointer-size apart and share a classification.

use crate::arch::Architecture;
use crate::poi::{Poi, PoiKind, PoiList};

const MIN_RUN_LEN: i64 = 4;

/// Walks `pointers` (assumed already in ascending offset order) and
/// records an `ArrayPointer` POI for every run of more than
/// [`MIN_RUN_LEN`] consecutive, same-kind pointers.
pub fn index_pointer_arrays(pointers: &PoiList, arch: Architecture, array_list: &mut PoiList) {
    let ptr_size = arch.pointer_size() as u64;
    let mut iter = pointers.iter();

    let Some(first) = iter.next() else {
        return;
    };

    let mut run_start: &Poi = first;
    let mut run_kind = first.kind;
    let mut last_offset = first.offset;
    let mut count: i64 = 1;

    for pointer in iter {
        if pointer.offset == last_offset + ptr_size && pointer.kind == run_kind {
            count += 1;
            last_offset = pointer.offset;
        } else {
            if count > MIN_RUN_LEN {
                array_list.add(run_start.offset, count, PoiKind::ArrayPointer);
            }
            run_start = pointer;
            run_kind = pointer.kind;
            last_offset = pointer.offset;
            count = 1;
        }
    }
    if count > MIN_RUN_LEN {
        array_list.add(run_start.offset, count, PoiKind::ArrayPointer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_contiguous_same_kind_run() {
        let mut pointers = PoiList::new();
        for i in 0..6u64 {
            pointers.add(i * 4, 1, PoiKind::GenericPointer);
        }
        let mut arrays = PoiList::new();
        index_pointer_arrays(&pointers, Architecture::Arch32, &mut arrays);
        assert_eq!(arrays.count(), 1);
        let poi = arrays.iter().next().unwrap();
        assert_eq!(poi.offset, 0);
        assert_eq!(poi.count, 6);
    }

    #[test]
    fn kind_change_breaks_run() {
        let mut pointers = PoiList::new();
        for i in 0..3u64 {
            pointers.add(i * 4, 1, PoiKind::GenericPointer);
        }
        pointers.add(12, 1, PoiKind::FunctionPointer);
        for i in 4..9u64 {
            pointers.add(i * 4, 1, PoiKind::FunctionPointer);
        }
        let mut arrays = PoiList::new();
        index_pointer_arrays(&pointers, Architecture::Arch32, &mut arrays);
        assert_eq!(arrays.count(), 1);
        assert_eq!(arrays.iter().next().unwrap().offset, 12);
    }

    #[test]
    fn short_run_is_dropped() {
        let mut pointers = PoiList::new();
        for i in 0..3u64 {
            pointers.add(i * 4, 1, PoiKind::GenericPointer);
        }
        let mut arrays = PoiList::new();
        index_pointer_arrays(&pointers, Architecture::Arch32, &mut arrays);
        assert_eq!(arrays.count(), 0);
    }
}
