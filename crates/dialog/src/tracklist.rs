//! Ordered song picks collected while the event wizard sits on the picking step.

use std::{collections::HashMap, fmt::Write as _};

use shared::domain::{Song, SongId, TracklistEntry};

use crate::session::Scratch;

pub const TRACKLIST_KEY: &str = "tracklist";

/// Appends a pick. Duplicates are kept.
pub fn pick(scratch: &mut Scratch, song_id: SongId) {
    scratch.push_i64(TRACKLIST_KEY, song_id.0);
}

pub fn picks(scratch: &Scratch) -> Vec<SongId> {
    scratch
        .get_i64_list(TRACKLIST_KEY)
        .into_iter()
        .map(SongId)
        .collect()
}

/// Freezes the picks into entries whose position is the pick index.
pub fn finalize(scratch: &Scratch) -> Vec<TracklistEntry> {
    entries(&picks(scratch))
}

pub fn entries(song_ids: &[SongId]) -> Vec<TracklistEntry> {
    song_ids
        .iter()
        .zip(0u32..)
        .map(|(&song_id, position)| TracklistEntry { song_id, position })
        .collect()
}

/// Numbered listing of the picks. Ids with no known song show the raw id.
pub fn describe(song_ids: &[SongId], songs: &[Song]) -> String {
    if song_ids.is_empty() {
        return "Tracklist is empty".to_string();
    }
    let titles: HashMap<SongId, &str> = songs
        .iter()
        .map(|song| (song.id, song.title.as_str()))
        .collect();
    let mut text = String::from("Tracklist:");
    for (n, song_id) in song_ids.iter().enumerate() {
        match titles.get(song_id) {
            Some(title) => {
                let _ = write!(text, "\n{}. {title}", n + 1);
            }
            None => {
                let _ = write!(text, "\n{}. song #{song_id}", n + 1);
            }
        }
    }
    text
}
