//! UDS diagnostic database location: scans structure-array POIs for
//! the byte column carrying the longest run of distinct, valid UDS
//! Request-IDs, then reports the absolute address of the row where
//! that run starts.

use crate::arch::Architecture;
use crate::poi::index::structures::display_declaration;
use crate::poi::{PoiKind, PoiList};

/// Single-byte UDS Request-IDs this tool recognizes, taken from the
/// ISO 14229 service and sub-function identifiers the original tool
/// hardcodes.
const VALID_RIDS: [u8; 26] = [
    0x10, 0x11, 0x14, 0x19, 0x27, 0x28, 0x29, 0x3E, 0x83, 0x84, 0x85, 0x86, 0x87, 0x22, 0x23, 0x24,
    0x2A, 0x2C, 0x2E, 0x2F, 0x31, 0x34, 0x35, 0x36, 0x37, 0x38,
];

fn is_valid_uds_rid(value: u8) -> bool {
    VALID_RIDS.contains(&value)
}

/// Best UDS run found across every structure array, plus a rendering
/// of the structure it was found in.
#[derive(Debug, Clone)]
pub struct UdsLocation {
    pub address: u64,
    pub rid_count: i64,
    pub declaration: String,
}

struct BestRun {
    count: i64,
    struct_offset: u64,
    column: u64,
    start_row: i64,
    row_size: u64,
    declaration: String,
}

/// Walks every `StructurePointer` POI's byte columns looking for the
/// longest run of rows whose byte at that column is a valid, non-
/// repeating UDS RID, and returns the absolute address of the row
/// where the best run found starts.
pub fn locate(
    data: &[u8],
    structures: &PoiList,
    arch: Architecture,
    base_address: u64,
) -> Option<UdsLocation> {
    let ptr_size = arch.pointer_size() as u64;
    let mut best: Option<BestRun> = None;

    for poi in structures.iter() {
        if poi.kind != PoiKind::StructurePointer {
            continue;
        }
        let row_size = poi.nb_members as u64 * ptr_size;
        if row_size == 0 || poi.count <= 0 {
            continue;
        }

        for column in 0..row_size {
            let mut seen = [false; 256];
            let mut in_seq = false;
            let mut run_count = 0i64;
            let mut start_row = 0i64;

            let mut flush = |run_count: i64, start_row: i64, best: &mut Option<BestRun>| {
                if run_count > best.as_ref().map(|b| b.count).unwrap_or(0) {
                    *best = Some(BestRun {
                        count: run_count,
                        struct_offset: poi.offset,
                        column,
                        start_row,
                        row_size,
                        declaration: display_declaration(
                            poi.signature.as_deref().unwrap_or(&[]),
                            arch,
                        ),
                    });
                }
            };

            for row in 0..poi.count {
                let byte_offset = poi.offset + row as u64 * row_size + column;
                let Some(&byte) = data.get(byte_offset as usize) else {
                    break;
                };

                if is_valid_uds_rid(byte) {
                    if !in_seq {
                        seen = [false; 256];
                        in_seq = true;
                        start_row = row;
                        seen[byte as usize] = true;
                        run_count = 1;
                    } else if !seen[byte as usize] {
                        seen[byte as usize] = true;
                        run_count += 1;
                    } else {
                        flush(run_count, start_row, &mut best);
                        in_seq = false;
                        run_count = 0;
                    }
                } else if in_seq {
                    flush(run_count, start_row, &mut best);
                    in_seq = false;
                    run_count = 0;
                }
            }

            if in_seq {
                flush(run_count, start_row, &mut best);
            }
        }
    }

    best.map(|b| UdsLocation {
        address: base_address + b.struct_offset + b.column + b.start_row as u64 * b.row_size,
        rid_count: b.count,
        declaration: b.declaration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poi::Poi;

    fn structure_poi(offset: u64, count: i64, nb_members: usize) -> Poi {
        let mut poi = Poi::new(offset, count, PoiKind::Unknown);
        poi.kind = PoiKind::StructurePointer;
        poi.nb_members = nb_members;
        poi.signature = Some(vec![PoiKind::Unknown; nb_members]);
        poi
    }

    #[test]
    fn finds_longest_run_of_distinct_rids() {
        let nb_members = 3;
        let ptr_size = Architecture::Arch32.pointer_size() as u64;
        let row_size = nb_members as u64 * ptr_size;
        let rows = 8usize;
        let mut data = vec![0u8; row_size as usize * rows];

        let column = 4u64;
        let rids = [0x10u8, 0x11, 0x27, 0x3E, 0x22, 0x2A, 0x2F, 0x31];
        for (row, &rid) in rids.iter().enumerate() {
            let idx = row as u64 * row_size + column;
            data[idx as usize] = rid;
        }

        let mut structures = PoiList::new();
        structures.append(structure_poi(0, rows as i64, nb_members));

        let result = locate(&data, &structures, Architecture::Arch32, 0x1000).unwrap();
        assert_eq!(result.rid_count, rows as i64);
        assert_eq!(result.address, 0x1000 + column);
    }

    #[test]
    fn repeated_rid_breaks_the_run() {
        let nb_members = 2;
        let ptr_size = Architecture::Arch32.pointer_size() as u64;
        let row_size = nb_members as u64 * ptr_size;
        let mut data = vec![0u8; row_size as usize * 4];

        data[0] = 0x10;
        data[row_size as usize] = 0x10;
        data[row_size as usize * 2] = 0x11;
        data[row_size as usize * 3] = 0x14;

        let mut structures = PoiList::new();
        structures.append(structure_poi(0, 4, nb_members));

        let result = locate(&data, &structures, Architecture::Arch32, 0).unwrap();
        assert_eq!(result.rid_count, 2);
        assert_eq!(result.address, row_size * 2);
    }

    #[test]
    fn no_structures_yields_no_location() {
        let data = vec![0u8; 64];
        let structures = PoiList::new();
        assert!(locate(&data, &structures, Architecture::Arch32, 0).is_none());
    }
}
