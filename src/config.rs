//! Ambient configuration for one analysis run. Filled in by the CLI's
//! `Cli::into_config`, or constructed directly (with `Default`) by a
//! library caller that wants the same inference pipeline without a
//! terminal.

use crate::arch::{Architecture, Endianness};
use crate::candidates::DEFAULT_MEM_ALIGN;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub architecture: Architecture,
    /// `Endianness::Unknown` means "detect it"; any other value forces
    /// it and skips `endian::detect`.
    pub endian: Endianness,
    pub mem_align: u64,
    /// Worker thread count for the refinement phase; 0 lets `rayon`
    /// pick based on the online CPU count.
    pub threads: usize,
    pub deep_mode: bool,
    /// Skips base-address search and runs the UDS locator directly
    /// under this base when set.
    pub base_address: Option<u64>,
    pub known_functions: Vec<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            architecture: Architecture::Arch32,
            endian: Endianness::Unknown,
            mem_align: DEFAULT_MEM_ALIGN,
            threads: 0,
            deep_mode: false,
            base_address: None,
            known_functions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_detects_endianness_and_32_bit() {
        let config = AnalysisConfig::default();
        assert_eq!(config.architecture, Architecture::Arch32);
        assert_eq!(config.endian, Endianness::Unknown);
        assert_eq!(config.mem_align, DEFAULT_MEM_ALIGN);
        assert!(config.base_address.is_none());
    }
}
