//! Studio affinity.

use core_library::AnimeListEntry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Scored entries a studio needs before it is reported.
pub const MIN_SCORED_ENTRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioAffinity {
    pub studio_id: u64,
    pub name: String,
    /// Entries listing this studio, scored or not.
    pub anime_count: u32,
    pub total_scored_count: u32,
    /// Mean of the scored entries.
    pub average_score: f64,
}

#[derive(Default)]
struct StudioTally {
    name: String,
    anime_count: u32,
    scored_count: u32,
    score_sum: u32,
}

/// Studios with at least [`MIN_SCORED_ENTRIES`] scored entries, best
/// average first, more entries first on ties.
///
/// An entry produced by several studios counts toward each of them.
pub fn studio_affinity(entries: &[AnimeListEntry]) -> Vec<StudioAffinity> {
    let mut tallies: HashMap<u64, StudioTally> = HashMap::new();

    for entry in entries {
        for studio in entry.studios() {
            let tally = tallies.entry(studio.id).or_insert_with(|| StudioTally {
                name: studio.name.clone(),
                ..StudioTally::default()
            });
            tally.anime_count += 1;
            if entry.is_scored() {
                tally.scored_count += 1;
                tally.score_sum += u32::from(entry.score);
            }
        }
    }

    let mut affinities: Vec<StudioAffinity> = tallies
        .into_iter()
        .filter(|(_, tally)| tally.scored_count >= MIN_SCORED_ENTRIES)
        .map(|(studio_id, tally)| StudioAffinity {
            studio_id,
            name: tally.name,
            anime_count: tally.anime_count,
            total_scored_count: tally.scored_count,
            average_score: f64::from(tally.score_sum) / f64::from(tally.scored_count),
        })
        .collect();

    affinities.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.anime_count.cmp(&a.anime_count))
            .then_with(|| a.studio_id.cmp(&b.studio_id))
    });

    affinities
}
