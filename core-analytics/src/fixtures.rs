//! Entry builders shared by the unit tests.

use core_library::{
    AnimeId, AnimeListEntry, ExtendedDetails, Genre, ListStatus, RelatedAnime, RelationType,
    Season, StartSeason, Studio,
};

pub fn entry(id: AnimeId, status: ListStatus, score: u8) -> AnimeListEntry {
    AnimeListEntry::new(id, format!("Anime {}", id), status)
        .with_score(score)
        .with_extended(ExtendedDetails::default())
}

fn details(entry: &mut AnimeListEntry) -> &mut ExtendedDetails {
    entry.extended.get_or_insert_with(ExtendedDetails::default)
}

pub fn titled(mut entry: AnimeListEntry, title: &str) -> AnimeListEntry {
    entry.title = title.to_string();
    entry
}

pub fn with_studio(mut entry: AnimeListEntry, id: u64, name: &str) -> AnimeListEntry {
    details(&mut entry).studios.push(Studio {
        id,
        name: name.to_string(),
    });
    entry
}

pub fn with_genre(mut entry: AnimeListEntry, id: u64, name: &str) -> AnimeListEntry {
    details(&mut entry).genres.push(Genre {
        id,
        name: name.to_string(),
    });
    entry
}

pub fn with_season(mut entry: AnimeListEntry, year: i32, season: Season) -> AnimeListEntry {
    details(&mut entry).start_season = Some(StartSeason::new(year, season));
    entry
}

pub fn with_mean(mut entry: AnimeListEntry, mean: f64) -> AnimeListEntry {
    details(&mut entry).community_mean_score = Some(mean);
    entry
}

pub fn related_to(mut entry: AnimeListEntry, target_id: AnimeId) -> AnimeListEntry {
    details(&mut entry).related_anime.push(RelatedAnime {
        target_id,
        relation_type: RelationType::Sequel,
    });
    entry
}
