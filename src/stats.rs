use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use serde::{Deserialize, Serialize};

use crate::types::{Artist, GenreRecord, PlayHistoryItem, Track};

struct GenreAccum {
    name: String,
    from_tracks: HashSet<String>,
    from_artists: HashSet<String>,
}

/// Computes ranked genres from the combined track and artist streams.
///
/// `artists` are the ranked top artists; `additional_artists` are the full
/// records of artists referenced by tracks but absent from the top list.
/// For every genre tag on any artist in the union, `artist_count` is the
/// number of distinct artists carrying the tag and `track_count` the number
/// of distinct tracks whose artists carry it. Tracks weigh heavier than
/// catalog presence: `score = 1.5 * track_count + artist_count`.
///
/// Ordering is score descending, then track count, then artist count, with
/// remaining ties kept in first-seen input order so the result is stable
/// run-to-run. Pure function: no network, inputs untouched.
pub fn calculate_top_genres(
    tracks: &[Track],
    artists: &[Artist],
    additional_artists: &[Artist],
) -> Vec<GenreRecord> {
    let all_artists: Vec<&Artist> = artists.iter().chain(additional_artists.iter()).collect();
    let artist_map: HashMap<&str, &Artist> =
        all_artists.iter().map(|a| (a.id.as_str(), *a)).collect();

    let mut accums: Vec<GenreAccum> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for artist in &all_artists {
        for genre in &artist.genres {
            let slot = *index.entry(genre.clone()).or_insert_with(|| {
                accums.push(GenreAccum {
                    name: genre.clone(),
                    from_tracks: HashSet::new(),
                    from_artists: HashSet::new(),
                });
                accums.len() - 1
            });
            accums[slot].from_artists.insert(artist.id.clone());
        }
    }

    // associate tracks with genres through their resolved artists
    for track in tracks {
        for track_artist in &track.artists {
            if let Some(full) = artist_map.get(track_artist.id.as_str()) {
                for genre in &full.genres {
                    if let Some(&slot) = index.get(genre) {
                        accums[slot].from_tracks.insert(track.id.clone());
                    }
                }
            }
        }
    }

    let mut records: Vec<GenreRecord> = accums
        .into_iter()
        .map(|accum| {
            let track_count = accum.from_tracks.len();
            let artist_count = accum.from_artists.len();
            GenreRecord {
                name: accum.name,
                track_count,
                artist_count,
                score: track_count as f64 * 1.5 + artist_count as f64,
            }
        })
        .collect();

    // stable sort keeps first-seen order as the final tiebreak
    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.track_count.cmp(&a.track_count))
            .then_with(|| b.artist_count.cmp(&a.artist_count))
    });

    records
}

/// Collects ids of artists referenced by tracks but missing from the given
/// artist list, de-duplicated and in first-seen order.
pub fn missing_artist_ids(tracks: &[Track], artists: &[Artist]) -> Vec<String> {
    let known: HashSet<&str> = artists.iter().map(|a| a.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut missing = Vec::new();

    for track in tracks {
        for artist in &track.artists {
            if artist.id.is_empty() || known.contains(artist.id.as_str()) {
                continue;
            }
            if seen.insert(artist.id.clone()) {
                missing.push(artist.id.clone());
            }
        }
    }

    missing
}

/// Play-count aggregate of one artist or album in the listening history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCount {
    pub id: String,
    pub name: String,
    pub play_count: u32,
    pub last_played: String,
}

/// Distinct artists and albums of a recently-played window, ranked by play
/// count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentSummary {
    pub artists: Vec<PlayCount>,
    pub albums: Vec<PlayCount>,
}

/// Folds a playback history into per-artist and per-album play counts.
///
/// Order of equal counts follows first appearance in the history, which is
/// newest-first as delivered by the remote.
pub fn summarize_recently_played(items: &[PlayHistoryItem]) -> RecentSummary {
    let mut artists: Vec<PlayCount> = Vec::new();
    let mut artist_index: HashMap<String, usize> = HashMap::new();
    let mut albums: Vec<PlayCount> = Vec::new();
    let mut album_index: HashMap<String, usize> = HashMap::new();

    for item in items {
        for artist in &item.track.artists {
            bump(
                &mut artists,
                &mut artist_index,
                &artist.id,
                &artist.name,
                &item.played_at,
            );
        }
        if let Some(album) = &item.track.album {
            bump(
                &mut albums,
                &mut album_index,
                &album.id,
                &album.name,
                &item.played_at,
            );
        }
    }

    artists.sort_by(|a, b| b.play_count.cmp(&a.play_count));
    albums.sort_by(|a, b| b.play_count.cmp(&a.play_count));

    RecentSummary { artists, albums }
}

fn bump(
    counts: &mut Vec<PlayCount>,
    index: &mut HashMap<String, usize>,
    id: &str,
    name: &str,
    played_at: &str,
) {
    if id.is_empty() {
        return;
    }
    match index.get(id) {
        Some(&slot) => {
            let entry = &mut counts[slot];
            entry.play_count += 1;
            if played_at > entry.last_played.as_str() {
                entry.last_played = played_at.to_string();
            }
        }
        None => {
            index.insert(id.to_string(), counts.len());
            counts.push(PlayCount {
                id: id.to_string(),
                name: name.to_string(),
                play_count: 1,
                last_played: played_at.to_string(),
            });
        }
    }
}
