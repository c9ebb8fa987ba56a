//! Points of interest: a classified offset or span inside the firmware
//! image, plus the ordered collection that holds them.

pub mod index;

/// The closed set of POI classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoiKind {
    Unknown,
    String,
    Array,
    Function,
    GenericPointer,
    DataPointer,
    UninitDataPointer,
    FunctionPointer,
    ArrayPointer,
    StringPointer,
    PointerPointer,
    StructurePointer,
    /// Declared by the data model alongside `StructurePointer`; no
    /// indexer in this tool (or in the original) ever emits it.
    StructArrayPointer,
    NullptrOrValue,
}

impl PoiKind {
    /// Pointer-ish kinds, used by the pointer-array indexer's
    /// "share the same type" rule and by structure signature
    /// classification.
    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            PoiKind::GenericPointer
                | PoiKind::DataPointer
                | PoiKind::UninitDataPointer
                | PoiKind::FunctionPointer
                | PoiKind::ArrayPointer
                | PoiKind::StringPointer
                | PoiKind::PointerPointer
                | PoiKind::StructurePointer
                | PoiKind::StructArrayPointer
        )
    }
}

/// One point of interest. `signature` and `nb_members` are populated
/// only for `StructurePointer` entries.
#[derive(Debug, Clone)]
pub struct Poi {
    pub offset: u64,
    pub count: i64,
    pub kind: PoiKind,
    pub signature: Option<Vec<PoiKind>>,
    pub nb_members: usize,
}

impl Poi {
    pub fn new(offset: u64, count: i64, kind: PoiKind) -> Self {
        Poi {
            offset,
            count,
            kind,
            signature: None,
            nb_members: 0,
        }
    }

    fn structure_array(offset: u64, count: i64, signature: Vec<PoiKind>) -> Self {
        let nb_members = signature.len();
        Poi {
            offset,
            count,
            kind: PoiKind::StructurePointer,
            signature: Some(signature),
            nb_members,
        }
    }
}

/// An ordered collection of points of interest. Backed by a `Vec`
/// rather than the original's hand-rolled singly linked list — the
/// ordering and append/insert contracts are the same, a growable
/// vector is just the idiomatic way to express them in Rust.
#[derive(Debug, Default, Clone)]
pub struct PoiList {
    items: Vec<Poi>,
}

impl PoiList {
    pub fn new() -> Self {
        PoiList { items: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Poi> {
        self.items.iter()
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Unconditional append.
    pub fn append(&mut self, poi: Poi) {
        self.items.push(poi);
    }

    /// Unconditional append of a plain `(offset, count, kind)` POI.
    pub fn add(&mut self, offset: u64, count: i64, kind: PoiKind) {
        self.append(Poi::new(offset, count, kind));
    }

    /// Appends unless an entry with the same offset already exists.
    pub fn add_unique(&mut self, offset: u64, count: i64, kind: PoiKind) {
        if !self.items.iter().any(|p| p.offset == offset) {
            self.add(offset, count, kind);
        }
    }

    /// Inserts keeping the list sorted by strictly increasing offset;
    /// an existing entry at the same offset is left untouched.
    pub fn add_unique_sorted(&mut self, poi: Poi) {
        match self.items.binary_search_by_key(&poi.offset, |p| p.offset) {
            Ok(_) => {}
            Err(pos) => self.items.insert(pos, poi),
        }
    }

    /// Appends a structure-array POI carrying its own signature,
    /// unless an entry already occupies this offset.
    pub fn add_structure_array(
        &mut self,
        offset: u64,
        count: i64,
        signature: Vec<PoiKind>,
    ) -> bool {
        if self.items.iter().any(|p| p.offset == offset) {
            return false;
        }
        self.append(Poi::structure_array(offset, count, signature));
        true
    }

    /// Whether `address` (relative to `base + offset`) falls inside a
    /// known `String` POI's single offset or an `Array` POI's span.
    /// Mirrors the original's `is_in_poi`, used by the refiner's
    /// valid-array test.
    pub fn contains_address(&self, arch: crate::arch::Architecture, address: u64, offset: u64) -> bool {
        let ptr_size = arch.pointer_size() as u64;
        self.items.iter().any(|poi| match poi.kind {
            PoiKind::String => address == poi.offset + offset,
            PoiKind::Array => {
                address >= poi.offset + offset
                    && address < poi.offset + offset + poi.count as u64 * ptr_size
            }
            _ => false,
        })
    }

    pub fn by_kind(&self, kind: PoiKind) -> impl Iterator<Item = &Poi> {
        self.items.iter().filter(move |p| p.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_count() {
        let mut list = PoiList::new();
        for i in 0..5 {
            list.add(i, 1, PoiKind::String);
        }
        assert_eq!(list.count(), 5);
    }

    #[test]
    fn add_unique_sorted_stays_strictly_increasing() {
        let mut list = PoiList::new();
        for offset in [10u64, 2, 7, 2, 100] {
            list.add_unique_sorted(Poi::new(offset, 1, PoiKind::Array));
        }
        let offsets: Vec<u64> = list.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![2, 7, 10, 100]);
    }

    #[test]
    fn add_unique_skips_existing_offset() {
        let mut list = PoiList::new();
        list.add_unique(5, 1, PoiKind::String);
        list.add_unique(5, 99, PoiKind::Array);
        assert_eq!(list.count(), 1);
        assert_eq!(list.iter().next().unwrap().kind, PoiKind::String);
    }

    #[test]
    fn structure_array_signature_len_matches_nb_members() {
        let mut list = PoiList::new();
        let sig = vec![PoiKind::Unknown, PoiKind::StringPointer, PoiKind::NullptrOrValue];
        list.add_structure_array(0x100, 4, sig.clone());
        let poi = list.iter().next().unwrap();
        assert_eq!(poi.nb_members, sig.len());
        assert_eq!(poi.signature.as_ref().unwrap().len(), sig.len());
    }
}
