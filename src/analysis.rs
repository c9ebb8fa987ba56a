//! Top-level control flow: one `Analysis` context owns the firmware
//! bytes and configuration for a single run and threads them through
//! region classification, endianness detection, POI indexing, and
//! either base-address search or UDS location.

use crate::arch::Endianness;
use crate::candidates::{self, BaseAddressCandidate};
use crate::config::AnalysisConfig;
use crate::endian;
use crate::error::BinbloomError;
use crate::memregion::{RegionMap, DEFAULT_PROFILE};
use crate::poi::index::{self, PoiIndexes};
use crate::poi::{PoiKind, PoiList};
use crate::progress::ProgressSink;
use crate::refine;
use crate::uds::{self, UdsLocation};

/// Outcome of a full run: the endianness used (forced or detected),
/// the base address (found or given), and, when a base address was
/// available, the UDS database location.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub endian: Endianness,
    pub endian_tied: bool,
    pub base_address: Option<u64>,
    pub confident: bool,
    pub uds: Option<UdsLocation>,
}

pub struct Analysis<'a> {
    data: &'a [u8],
    config: AnalysisConfig,
}

impl<'a> Analysis<'a> {
    /// Adopts `data` for one run under `config`. Fails only if the
    /// image is too small to hold a single pointer.
    pub fn new(data: &'a [u8], config: AnalysisConfig) -> Result<Self, BinbloomError> {
        let needed = config.architecture.pointer_size();
        if data.len() < needed {
            return Err(BinbloomError::FileTooSmall {
                needed,
                found: data.len(),
            });
        }
        Ok(Analysis { data, config })
    }

    pub fn run(&self, progress: &(dyn ProgressSink + Sync)) -> Result<Verdict, BinbloomError> {
        let arch = self.config.architecture;
        let regions = RegionMap::classify(self.data, &DEFAULT_PROFILE);

        let (endian, endian_tied) = if self.config.endian == Endianness::Unknown {
            let verdict = endian::detect(self.data, arch, progress);
            if verdict.tied {
                log::info!("endianness verdict tied; defaulting to {:?}", verdict.endian);
            } else {
                log::info!("endianness is {:?}", verdict.endian);
            }
            (verdict.endian, verdict.tied)
        } else {
            (self.config.endian, false)
        };

        let base_for_indexing = self.config.base_address.unwrap_or(0);
        let indexes: PoiIndexes = index::run_all(
            self.data,
            arch,
            endian,
            &regions,
            base_for_indexing,
            &self.config.known_functions,
            true,
            progress,
        );

        if indexes.strings.count() == 0 && indexes.arrays.count() == 0 {
            log::warn!("no strings or arrays found; inference will rely on pointer density alone");
        }

        match self.config.base_address {
            Some(base) => {
                let found = uds::locate(self.data, &indexes.structures, arch, base);
                if found.is_none() {
                    log::info!("no UDS-shaped structure found under base 0x{base:x}");
                }
                Ok(Verdict {
                    endian,
                    endian_tied,
                    base_address: Some(base),
                    confident: true,
                    uds: found,
                })
            }
            None => self.search_base_address(arch, endian, endian_tied, &regions, &indexes, progress),
        }
    }

    fn search_base_address(
        &self,
        arch: crate::arch::Architecture,
        endian: Endianness,
        endian_tied: bool,
        regions: &RegionMap,
        indexes: &PoiIndexes,
        progress: &(dyn ProgressSink + Sync),
    ) -> Result<Verdict, BinbloomError> {
        let kind = candidates::pairing_kind(&indexes.strings);

        let mut function_pois = PoiList::new();
        for &addr in &self.config.known_functions {
            function_pois.add_unique(addr, 1, PoiKind::Function);
        }
        if kind == PoiKind::Function && function_pois.count() == 0 {
            candidates::index_functions(self.data, arch, endian, regions, &indexes.arrays, &mut function_pois);
        }

        let anchors = if kind == PoiKind::String {
            &indexes.strings
        } else {
            &function_pois
        };

        let candidate_list: Vec<BaseAddressCandidate> = candidates::compute(
            self.data,
            arch,
            endian,
            anchors,
            kind,
            self.config.mem_align,
            false,
            self.config.deep_mode,
            progress,
        );

        if candidate_list.is_empty() {
            log::warn!("no base-address candidates found");
            return Ok(Verdict {
                endian,
                endian_tied,
                base_address: None,
                confident: false,
                uds: None,
            });
        }

        let run_refine = || {
            refine::refine(
                self.data,
                arch,
                endian,
                &indexes.arrays,
                regions,
                &candidate_list,
                progress,
            )
        };

        let result = if self.config.threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
            {
                Ok(pool) => pool.install(run_refine),
                Err(err) => {
                    log::warn!(
                        "failed to start {} worker threads ({err}); falling back to a single-threaded pool",
                        self.config.threads
                    );
                    match rayon::ThreadPoolBuilder::new().num_threads(1).build() {
                        Ok(pool) => pool.install(run_refine),
                        Err(_) => return Err(BinbloomError::ThreadPoolUnavailable),
                    }
                }
            }
        } else {
            run_refine()
        };

        log::info!(
            "base address found: 0x{:08x} (confident: {})",
            result.winner.address,
            result.confident
        );

        Ok(Verdict {
            endian,
            endian_tied,
            base_address: Some(result.winner.address),
            confident: result.confident,
            uds: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Architecture;
    use crate::progress::NullProgress;

    #[test]
    fn rejects_image_smaller_than_a_pointer() {
        let data = [0u8; 2];
        let config = AnalysisConfig {
            architecture: Architecture::Arch32,
            ..AnalysisConfig::default()
        };
        let result = Analysis::new(&data, config);
        assert!(matches!(result, Err(BinbloomError::FileTooSmall { .. })));
    }

    #[test]
    fn forced_endianness_skips_detection() {
        let data = vec![0u8; 256];
        let config = AnalysisConfig {
            architecture: Architecture::Arch32,
            endian: Endianness::Be,
            ..AnalysisConfig::default()
        };
        let analysis = Analysis::new(&data, config).unwrap();
        let verdict = analysis.run(&NullProgress).unwrap();
        assert_eq!(verdict.endian, Endianness::Be);
        assert!(!verdict.endian_tied);
    }

    #[test]
    fn base_address_override_runs_uds_locator_only() {
        let data = vec![0u8; 256];
        let config = AnalysisConfig {
            architecture: Architecture::Arch32,
            endian: Endianness::Le,
            base_address: Some(0x8000),
            ..AnalysisConfig::default()
        };
        let analysis = Analysis::new(&data, config).unwrap();
        let verdict = analysis.run(&NullProgress).unwrap();
        assert_eq!(verdict.base_address, Some(0x8000));
        assert!(verdict.uds.is_none());
    }
}
