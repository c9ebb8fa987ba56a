//! Structure-array POI indexer: finds repeating pointer-headed records
//! and builds a per-member signature for each one found.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::arch::{Architecture, Endianness};
use crate::buffer::read_ptr;
use crate::poi::{PoiKind, PoiList};

pub const MAX_STRUCT_MEMBERS: usize = 12;
const MIN_STRUCT_COUNT: i64 = 3;
const MIN_STRUCT_MEMBERS: usize = 2;

/// Walks `pointers` looking, for each pointer POI, for the structure
/// width (in units of `nb_members * pointer_size`) under which the
/// longest run of same-kind pointer heads repeats. Emits a
/// `StructurePointer` POI (with its member signature) for the best
/// width found at each surviving offset, and skips past the claimed
/// span so arrays are not rediscovered member-by-member.
pub fn index_structure_arrays(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    pointers: &PoiList,
    strings: &PoiList,
    base_address: u64,
    struct_list: &mut PoiList,
) {
    let ptr_size = arch.pointer_size() as u64;
    let by_offset: HashMap<u64, PoiKind> = pointers.iter().map(|p| (p.offset, p.kind)).collect();

    let mut min_offset = 0u64;
    let read_limit = (data.len() as u64).saturating_sub(ptr_size);

    for poi in pointers.iter() {
        if poi.offset < min_offset {
            continue;
        }

        let mut best_count = -1i64;
        let mut best_members = 0usize;

        for nb_members in (MIN_STRUCT_MEMBERS..=MAX_STRUCT_MEMBERS).rev() {
            let width = nb_members as u64 * ptr_size;
            let mut count = 0i64;
            loop {
                let cursor = poi.offset + count as u64 * width;
                if cursor > read_limit {
                    break;
                }
                match by_offset.get(&cursor) {
                    Some(&kind) if kind == poi.kind => count += 1,
                    _ => break,
                }
            }
            if count > best_count {
                best_count = count;
                best_members = nb_members;
            }
        }

        if best_count > MIN_STRUCT_COUNT && best_members >= MIN_STRUCT_MEMBERS {
            let signature = create_signature(
                data,
                arch,
                endian,
                pointers,
                strings,
                base_address,
                poi.offset,
                best_members,
            );
            struct_list.add_structure_array(poi.offset, best_count, signature);
            min_offset = poi.offset + best_count as u64 * best_members as u64 * ptr_size;
        }
    }
}

/// Classifies each of `nb_members` slots starting at `offset` as a
/// pointer-to-pointer, pointer-to-string, a matching known pointer
/// kind, a versatile value (0 or all-ones), or unknown.
fn create_signature(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    pointers: &PoiList,
    strings: &PoiList,
    base_address: u64,
    offset: u64,
    nb_members: usize,
) -> Vec<PoiKind> {
    let ptr_size = arch.pointer_size() as u64;
    let all_ones = arch.all_ones();
    let mut signature = Vec::with_capacity(nb_members);

    for i in 0..nb_members as u64 {
        let member_offset = offset + i * ptr_size;
        let value = read_ptr(data, member_offset as usize, arch, endian);

        let mut kind = None;
        for item in pointers.iter() {
            if item.offset + base_address == value {
                if item.kind.is_pointer() {
                    kind = Some(PoiKind::PointerPointer);
                    break;
                }
            } else if item.offset == member_offset {
                kind = Some(item.kind);
                break;
            }
        }

        if kind.is_none() {
            for item in strings.iter() {
                if item.offset + base_address == value {
                    kind = Some(item.kind);
                    break;
                }
            }
        }

        let kind = kind.unwrap_or_else(|| {
            if value == 0 || value == all_ones {
                PoiKind::NullptrOrValue
            } else {
                PoiKind::Unknown
            }
        });
        signature.push(kind);
    }

    signature
}

/// Renders a C-like struct declaration for a structure signature,
/// matching the shape the original tool prints when locating a UDS
/// database.
pub fn display_declaration(signature: &[PoiKind], arch: Architecture) -> String {
    let value_type = match arch {
        Architecture::Arch32 => "uint32_t",
        Architecture::Arch64 => "uint64_t",
    };
    let mut out = String::from("struct {\n");
    for (i, kind) in signature.iter().enumerate() {
        let line = match kind {
            PoiKind::String | PoiKind::StringPointer => format!("\tchar *psz_field_{i};\n"),
            PoiKind::PointerPointer | PoiKind::StructurePointer | PoiKind::GenericPointer => {
                format!("\tvoid *p_field_{i};\n")
            }
            PoiKind::FunctionPointer => format!("\tcode *p_field_{i};\n"),
            PoiKind::DataPointer => format!("\tdata *p_field_{i};\n"),
            PoiKind::UninitDataPointer => format!("\tvar *p_field_{i};\n"),
            _ => format!("\t{value_type} dw_{i};\n"),
        };
        let _ = write!(out, "{line}");
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_repeating_two_member_structure() {
        let mut pointers = PoiList::new();
        let stride = Architecture::Arch32.pointer_size() as u64 * 2;
        for i in 0..6u64 {
            pointers.add(i * stride, 1, PoiKind::GenericPointer);
        }
        let data = vec![0u8; (stride * 6 + 8) as usize];
        let strings = PoiList::new();
        let mut out = PoiList::new();
        index_structure_arrays(
            &data,
            Architecture::Arch32,
            Endianness::Le,
            &pointers,
            &strings,
            0,
            &mut out,
        );
        assert_eq!(out.count(), 1);
        let poi = out.iter().next().unwrap();
        assert_eq!(poi.nb_members, 2);
        assert_eq!(poi.offset, 0);
    }

    #[test]
    fn short_chain_is_not_emitted() {
        let mut pointers = PoiList::new();
        pointers.add(0, 1, PoiKind::GenericPointer);
        pointers.add(8, 1, PoiKind::GenericPointer);
        let data = vec![0u8; 32];
        let strings = PoiList::new();
        let mut out = PoiList::new();
        index_structure_arrays(
            &data,
            Architecture::Arch32,
            Endianness::Le,
            &pointers,
            &strings,
            0,
            &mut out,
        );
        assert_eq!(out.count(), 0);
    }

    #[test]
    fn declaration_uses_value_type_for_unknown_members() {
        let decl = display_declaration(&[PoiKind::Unknown, PoiKind::Unknown], Architecture::Arch32);
        assert!(decl.contains("uint32_t dw_0;"));
        assert!(decl.contains("uint32_t dw_1;"));
    }
}
