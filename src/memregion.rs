//! Shannon-entropy based memory classification: splits an image into
//! fixed-size windows, classifies each by normalized entropy, and
//! coalesces adjacent windows of the same kind into regions.

/// Window size used for entropy sampling.
pub const WINDOW_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Unknown,
    Code,
    InitData,
    UninitData,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    pub offset: usize,
    pub size: usize,
    pub entropy: f64,
    pub kind: RegionKind,
}

/// Entropy bands for one target profile, in the `[min, max)` form used
/// by the original's `arch_info_t` table. Only one profile, `"default"`,
/// is defined today, but the table shape leaves room for more without
/// touching the classifier itself.
#[derive(Debug, Clone, Copy)]
pub struct EntropyProfile {
    pub name: &'static str,
    pub uninit_data: (f64, f64),
    pub init_data: (f64, f64),
    pub code: (f64, f64),
}

pub const DEFAULT_PROFILE: EntropyProfile = EntropyProfile {
    name: "default",
    uninit_data: (0.00, 0.05),
    init_data: (0.05, 0.60),
    code: (0.60, 0.90),
};

fn classify(entropy: f64, profile: &EntropyProfile) -> RegionKind {
    let in_band = |band: (f64, f64)| entropy >= band.0 && entropy < band.1;
    if in_band(profile.uninit_data) {
        RegionKind::UninitData
    } else if in_band(profile.init_data) {
        RegionKind::InitData
    } else if in_band(profile.code) {
        RegionKind::Code
    } else {
        RegionKind::Unknown
    }
}

/// Normalized Shannon entropy of `data`, in `[0, 1]`.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut histogram = [0u32; 256];
    for &byte in data {
        histogram[byte as usize] += 1;
    }
    let len = data.len() as f64;
    let h: f64 = histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum();
    h / 8.0
}

/// A flat, ascending-offset list of memory regions tiling a prefix of
/// the image.
#[derive(Debug, Default)]
pub struct RegionMap {
    regions: Vec<MemoryRegion>,
}

impl RegionMap {
    /// Classifies `data` into windows of `WINDOW_SIZE` bytes (a
    /// trailing short window if `data.len()` isn't a multiple of it),
    /// merging adjacent windows of the same kind into one region with
    /// entropy recomputed over the whole span.
    pub fn classify(data: &[u8], profile: &EntropyProfile) -> RegionMap {
        let mut regions = Vec::new();
        let mut run_start = 0usize;
        let mut run_kind: Option<RegionKind> = None;

        let mut offset = 0usize;
        while offset < data.len() {
            let end = (offset + WINDOW_SIZE).min(data.len());
            let window = &data[offset..end];
            let kind = classify(shannon_entropy(window), profile);

            match run_kind {
                None => {
                    run_start = offset;
                    run_kind = Some(kind);
                }
                Some(prev) if prev != kind => {
                    regions.push(finalize_region(data, run_start, offset, prev));
                    run_start = offset;
                    run_kind = Some(kind);
                }
                _ => {}
            }

            offset = end;
        }

        if let Some(kind) = run_kind {
            regions.push(finalize_region(data, run_start, data.len(), kind));
        }

        RegionMap { regions }
    }

    /// Returns the kind of the region containing `offset`, or
    /// `RegionKind::Unknown` if no region covers it.
    pub fn type_at(&self, offset: u64) -> RegionKind {
        self.regions
            .iter()
            .find(|r| offset >= r.offset as u64 && offset < (r.offset + r.size) as u64)
            .map(|r| r.kind)
            .unwrap_or(RegionKind::Unknown)
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Largest address covered by any `Code` region, used by the
    /// no-strings function-indexing fallback.
    pub fn max_code_end(&self) -> u64 {
        self.regions
            .iter()
            .filter(|r| r.kind == RegionKind::Code)
            .map(|r| (r.offset + r.size) as u64)
            .max()
            .unwrap_or(0)
    }
}

fn finalize_region(data: &[u8], start: usize, end: usize, kind: RegionKind) -> MemoryRegion {
    MemoryRegion {
        offset: start,
        size: end - start,
        entropy: shannon_entropy(&data[start..end]),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_tile_without_gaps() {
        let mut data = vec![0u8; WINDOW_SIZE * 3];
        for (i, b) in data.iter_mut().enumerate().skip(WINDOW_SIZE) {
            *b = (i % 256) as u8;
        }
        let map = RegionMap::classify(&data, &DEFAULT_PROFILE);
        let mut cursor = 0usize;
        for region in map.regions() {
            assert_eq!(region.offset, cursor);
            cursor += region.size;
        }
        assert!(cursor <= data.len());
    }

    #[test]
    fn all_zero_window_is_uninit_data() {
        let data = vec![0u8; WINDOW_SIZE];
        let map = RegionMap::classify(&data, &DEFAULT_PROFILE);
        assert_eq!(map.regions().len(), 1);
        assert_eq!(map.regions()[0].kind, RegionKind::UninitData);
    }

    #[test]
    fn trailing_short_window_is_its_own_region() {
        // High-entropy full window followed by an all-zero tail: the two
        // windows land in different bands, so they can't be coalesced and
        // the trailing 10-byte window must surface as its own region.
        let mut data = vec![0u8; WINDOW_SIZE + 10];
        for (i, byte) in data[..WINDOW_SIZE].iter_mut().enumerate() {
            *byte = (i % 256) as u8;
        }
        let map = RegionMap::classify(&data, &DEFAULT_PROFILE);
        let last = map.regions().last().unwrap();
        assert_eq!(last.size, 10);
        assert_eq!(last.kind, RegionKind::UninitData);
    }

    #[test]
    fn type_at_unknown_outside_any_region() {
        let data = vec![0u8; WINDOW_SIZE];
        let map = RegionMap::classify(&data, &DEFAULT_PROFILE);
        assert_eq!(map.type_at(WINDOW_SIZE as u64 + 1), RegionKind::Unknown);
    }
}
