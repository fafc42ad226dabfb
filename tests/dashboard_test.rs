use std::sync::Arc;

use chrono::Utc;
use spotistats::dashboard::Dashboard;
use spotistats::management::{CacheManager, MemoryStorage, TokenManager};
use spotistats::spotify::SpotifyApi;
use spotistats::types::{TimeRange, Token};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn track_json(id: &str, artist_id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("{}_name", id),
        "duration_ms": 180000,
        "artists": [{ "id": artist_id, "name": format!("{}_name", artist_id) }],
        "album": { "id": "al1", "name": "al1_name" }
    })
}

fn artist_json(id: &str, genres: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("{}_name", id),
        "genres": genres
    })
}

async fn dashboard_for(server: &MockServer) -> Dashboard {
    let store = Arc::new(MemoryStorage::new());
    let tokens = TokenManager::new(store.clone());
    tokens
        .install(Token {
            access_token: "test-access".to_string(),
            refresh_token: "test-refresh".to_string(),
            expires_at: Utc::now().timestamp_millis() + 3600 * 1000,
        })
        .await;
    Dashboard::new(tokens, CacheManager::new(store))
        .with_api(SpotifyApi::with_base_url(server.uri()))
}

#[tokio::test]
async fn test_top_tracks_page_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/top/tracks"))
        .and(query_param("time_range", "long_term"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [track_json("t1", "a1")],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await;

    let first = dash.top_tracks(TimeRange::LongTerm, 50, 0).await.unwrap();
    let second = dash.top_tracks(TimeRange::LongTerm, 50, 0).await.unwrap();

    // the mock expectation enforces a single remote call
    assert_eq!(first.items.len(), 1);
    assert_eq!(second.items[0].id, "t1");
}

#[tokio::test]
async fn test_disabled_cache_always_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/top/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [track_json("t1", "a1")],
            "total": 1
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await.with_cache_enabled(false);

    let first = dash.top_tracks(TimeRange::LongTerm, 50, 0).await.unwrap();
    let second = dash.top_tracks(TimeRange::LongTerm, 50, 0).await.unwrap();

    // cache off: same result, one more round trip
    assert_eq!(first.items[0].id, second.items[0].id);
}

#[tokio::test]
async fn test_load_more_completes_on_short_page() {
    let server = MockServer::start().await;
    let items: Vec<serde_json::Value> =
        (0..30).map(|i| track_json(&format!("t{}", i), "a1")).collect();
    Mock::given(method("GET"))
        .and(path("/me/top/tracks"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": items,
            "total": 30
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await;

    let loaded = dash.load_more_top_tracks().await.unwrap();
    assert_eq!(loaded.len(), 30);

    let progress = dash.top_tracks_progress();
    assert_eq!(progress.offset, 30);
    assert!(progress.complete);

    // once complete, further loads return the accumulated list without
    // touching the remote (the expect(1) above would trip otherwise)
    let again = dash.load_more_top_tracks().await.unwrap();
    assert_eq!(again.len(), 30);
}

#[tokio::test]
async fn test_set_range_discards_progress() {
    let server = MockServer::start().await;
    let items: Vec<serde_json::Value> =
        (0..10).map(|i| track_json(&format!("t{}", i), "a1")).collect();
    Mock::given(method("GET"))
        .and(path("/me/top/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": items,
            "total": 10
        })))
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await;
    dash.load_more_top_tracks().await.unwrap();
    assert!(dash.top_tracks_progress().complete);

    // progress belongs to the range it was made under
    dash.set_range(TimeRange::ShortTerm);
    let progress = dash.top_tracks_progress();
    assert_eq!(progress.offset, 0);
    assert!(!progress.complete);

    // selecting the same range again is a no-op
    dash.set_range(TimeRange::ShortTerm);
    assert_eq!(dash.range(), TimeRange::ShortTerm);
}

#[tokio::test]
async fn test_top_genres_end_to_end() {
    let server = MockServer::start().await;

    // two tracks by known top artists, one by an artist outside the top list
    Mock::given(method("GET"))
        .and(path("/me/top/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                track_json("t1", "A"),
                track_json("t2", "B"),
                track_json("t3", "C"),
            ],
            "total": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/top/artists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                artist_json("A", &["rock"]),
                artist_json("B", &["rock", "pop"]),
            ],
            "total": 2
        })))
        .expect(1)
        .mount(&server)
        .await;
    // the supplementary lookup resolves the missing artist C
    Mock::given(method("GET"))
        .and(path("/artists"))
        .and(query_param("ids", "C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "artists": [artist_json("C", &["jazz"])]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await;
    let genres = dash.top_genres().await.unwrap();

    assert_eq!(genres.len(), 3);

    // rock: tracks t1+t2, artists A+B -> 1.5*2 + 2 = 5.0
    assert_eq!(genres[0].name, "rock");
    assert_eq!(genres[0].track_count, 2);
    assert_eq!(genres[0].artist_count, 2);
    assert_eq!(genres[0].score, 5.0);

    // pop and jazz tie at 2.5; pop was seen first (top artists before the
    // supplementary lookup)
    assert_eq!(genres[1].name, "pop");
    assert_eq!(genres[1].score, 2.5);
    assert_eq!(genres[2].name, "jazz");
    assert_eq!(genres[2].score, 2.5);
}

#[tokio::test]
async fn test_user_stats_aggregates_probes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": "p1", "name": "P1", "public": true, "collaborative": false },
                { "id": "p2", "name": "P2", "public": false, "collaborative": true },
                { "id": "p3", "name": "P3", "public": true, "collaborative": false },
            ],
            "total": 7
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [],
            "total": 123
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/albums"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [],
            "total": 45
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/following"))
        .and(query_param("type", "artist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "artists": { "items": [], "total": 9 }
        })))
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await;
    let stats = dash.user_stats().await.unwrap();

    assert_eq!(stats.playlists, 7);
    assert_eq!(stats.public_playlists, 2);
    assert_eq!(stats.collaborative_playlists, 1);
    assert_eq!(stats.saved_tracks, 123);
    assert_eq!(stats.saved_albums, 45);
    assert_eq!(stats.followed_artists, 9);
}

#[tokio::test]
async fn test_recently_played_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/recently-played"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "played_at": "2024-03-03T10:00:00Z", "track": track_json("t1", "A") },
                { "played_at": "2024-03-03T09:00:00Z", "track": track_json("t2", "A") },
                { "played_at": "2024-03-03T08:00:00Z", "track": track_json("t3", "B") },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await;

    let summary = dash.recently_played_summary(50).await.unwrap();
    assert_eq!(summary.artists[0].id, "A");
    assert_eq!(summary.artists[0].play_count, 2);
    assert_eq!(summary.artists[0].last_played, "2024-03-03T10:00:00Z");

    // the page behind the summary is cached; a second read stays local
    let page = dash.recently_played(50).await.unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn test_saved_tracks_served_through_incremental_sync() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {
                    "added_at": "2024-03-02T00:00:00Z",
                    "track": track_json("t1", "A")
                }
            ],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dash = dashboard_for(&server).await;

    let first = dash.saved_tracks(false).await.unwrap();
    assert_eq!(first.items.len(), 1);

    // second read is a fresh cache hit, no remote call
    let second = dash.saved_tracks(false).await.unwrap();
    assert_eq!(second.items[0].track.id, "t1");
}
