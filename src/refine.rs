//! Parallel candidate refinement: scores every surviving base-address
//! candidate by how well it explains the image's arrays and pointer
//! density, fanning out across `rayon`'s global pool.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::arch::{Architecture, Endianness};
use crate::buffer::read_ptr;
use crate::candidates::BaseAddressCandidate;
use crate::poi::index::pointers::index_pointers;
use crate::poi::{PoiKind, PoiList};
use crate::memregion::RegionMap;
use crate::progress::ProgressSink;

const MIN_VALID_ARRAY_LEN: i64 = 10;
const PHASE_LABEL: &str = "Refining";

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreEntry {
    pub base_address: u64,
    pub votes: i64,
    pub score: i64,
    pub has_valid_array: bool,
}

/// Verdict of the refinement pass: either a single candidate uniquely
/// explained an array of pointers (confident), or the highest-scoring
/// candidate is reported, flagged as confident only when it also holds
/// the most votes.
#[derive(Debug, Clone)]
pub struct RefineResult {
    pub winner: BaseAddressCandidate,
    pub confident: bool,
    pub scores: Vec<ScoreEntry>,
}

/// Scores each of `candidates` against `data`, sharding the work
/// across `rayon`'s pool in disjoint index ranges so no two workers
/// touch the same score-table slot.
#[allow(clippy::too_many_arguments)]
pub fn refine(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    arrays: &PoiList,
    regions: &RegionMap,
    candidates: &[BaseAddressCandidate],
    progress: &(dyn ProgressSink + Sync),
) -> RefineResult {
    if candidates.is_empty() {
        return RefineResult {
            winner: BaseAddressCandidate {
                address: 0,
                votes: 0,
                nb_pointers: 0,
            },
            confident: false,
            scores: Vec::new(),
        };
    }

    let mut scores = vec![ScoreEntry::default(); candidates.len()];
    let processed = AtomicU64::new(0);

    let chunk_size = 1.max(candidates.len() / rayon::current_num_threads().max(1));
    scores
        .par_chunks_mut(chunk_size)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let base = chunk_idx * chunk_size;
            for (i, slot) in chunk.iter_mut().enumerate() {
                let idx = base + i;
                if idx >= candidates.len() {
                    break;
                }
                let candidate = &candidates[idx];
                *slot = score_one(data, arch, endian, arrays, regions, candidate);
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                progress.update(PHASE_LABEL, done, candidates.len() as u64);
            }
        });
    progress.finish(PHASE_LABEL);

    pick_winner(candidates, scores)
}

fn score_one(
    data: &[u8],
    arch: Architecture,
    endian: Endianness,
    arrays: &PoiList,
    regions: &RegionMap,
    candidate: &BaseAddressCandidate,
) -> ScoreEntry {
    let delta = candidate.address;
    let ptr_size = arch.pointer_size();

    let mut array_score: i64 = 1;
    let mut has_valid_array = false;

    for array in arrays.by_kind(PoiKind::Array) {
        let mut unique_targets = std::collections::HashSet::new();
        for j in 0..array.count.max(0) as usize {
            let offset = array.offset as usize + j * ptr_size;
            if offset + ptr_size > data.len() {
                break;
            }
            let v = read_ptr(data, offset, arch, endian);
            let hits_known_offset = arrays.iter().any(|zap| {
                matches!(zap.kind, PoiKind::String | PoiKind::Array) && v == zap.offset + delta
            });
            if hits_known_offset {
                unique_targets.insert(v);
            }
        }

        let unique = unique_targets.len() as i64;
        if unique >= array.count / 3 && array.count >= MIN_VALID_ARRAY_LEN {
            has_valid_array = true;
        }
        array_score += unique;
    }

    let mut pointers = PoiList::new();
    index_pointers(data, arch, endian, regions, delta, &[], &mut pointers);
    let pointer_count = pointers.count() as i64;

    ScoreEntry {
        base_address: delta,
        votes: candidate.votes,
        score: pointer_count * candidate.votes * array_score,
        has_valid_array,
    }
}

fn pick_winner(candidates: &[BaseAddressCandidate], scores: Vec<ScoreEntry>) -> RefineResult {
    let valid_array_winners: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.has_valid_array)
        .map(|(i, _)| i)
        .collect();

    let winner_idx = if valid_array_winners.len() == 1 {
        valid_array_winners[0]
    } else {
        scores
            .iter()
            .enumerate()
            .max_by_key(|(_, s)| s.score)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };

    let top_votes_idx = candidates
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| c.votes)
        .map(|(i, _)| i)
        .unwrap_or(0);

    RefineResult {
        winner: candidates[winner_idx],
        confident: valid_array_winners.len() == 1 || winner_idx == top_votes_idx,
        scores,
    }
}
