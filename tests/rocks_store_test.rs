//! RocksDB round store: conditional writes and persistence across reopen

use fairround::{
    games::Outcome,
    rounds::{RoundKey, Settlement},
    Game, GameKnobs, Play, RocksRoundStore, Round, RoundRepository, RoundStatus,
};
use tempfile::TempDir;
use uuid::Uuid;

fn lottery() -> Game {
    Game {
        id: "lottery".to_string(),
        name: "Lottery".to_string(),
        round_duration_secs: 300,
        min_bet: 1,
        max_bet: 100,
        knobs: GameKnobs::Lottery { pool: 49, picks: 6 },
    }
}

fn play(bucket_start: u64, choice: &str, amount: u64, offset_ms: u64) -> Play {
    Play {
        play_id: Uuid::new_v4(),
        game_id: "lottery".to_string(),
        bucket_start,
        user_id: format!("user-{}", offset_ms),
        bet_amount: amount,
        choice: choice.to_string(),
        timestamp_ms: bucket_start * 1000 + offset_ms,
    }
}

fn settlement(at_ms: u64) -> Settlement {
    Settlement {
        seed_revealed: "cd".repeat(32),
        outcome: Outcome {
            draws: vec![3, 1, 4, 1, 5, 9],
            winning: ["4", "2", "7", "3", "8", "13"].iter().map(|s| s.to_string()).collect(),
        },
        settled_at_ms: at_ms,
    }
}

#[tokio::test]
async fn test_round_lifecycle_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = RocksRoundStore::open(dir.path()).unwrap();
    let round = Round::pending(&lottery(), 600, "ab".repeat(32), 600_000);
    let key = round.key();

    assert!(store.insert_round_if_absent(&round).await.unwrap());
    assert!(!store.insert_round_if_absent(&round).await.unwrap());

    assert!(store.increment_totals(&play(600, "7", 10, 1)).await.unwrap());
    assert!(store.increment_totals(&play(600, "7", 15, 2)).await.unwrap());
    assert!(store.increment_totals(&play(600, "13", 5, 3)).await.unwrap());

    let pending = store.find_round(&key).await.unwrap().unwrap();
    assert_eq!(pending.totals.get("7"), Some(&25));
    assert_eq!(pending.totals.get("13"), Some(&5));

    assert!(store.try_settle(&key, &settlement(900_000)).await.unwrap());
    assert!(!store.try_settle(&key, &settlement(999_000)).await.unwrap());
    assert!(!store.increment_totals(&play(600, "7", 50, 4)).await.unwrap());

    let settled = store.find_round(&key).await.unwrap().unwrap();
    assert_eq!(settled.status, RoundStatus::Settled);
    assert_eq!(settled.total_wagered(), 30);
    assert_eq!(settled.settled_at_ms, Some(900_000));
    assert!(store.pending_rounds(None).await.unwrap().is_empty());

    let plays = store.plays_for_round(&key).await.unwrap();
    let amounts: Vec<u64> = plays.iter().map(|p| p.bet_amount).collect();
    assert_eq!(amounts, vec![10, 15, 5]);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = RocksRoundStore::open(dir.path()).unwrap();
        for bucket in [0, 300, 600, 900] {
            let round = Round::pending(&lottery(), bucket, "ab".repeat(32), bucket * 1000);
            store.insert_round_if_absent(&round).await.unwrap();
            store.increment_totals(&play(bucket, "1", 2, 0)).await.unwrap();
        }
        for bucket in [0, 300, 600] {
            store
                .try_settle(&RoundKey::new("lottery", bucket), &settlement(bucket * 1000 + 300_000))
                .await
                .unwrap();
        }
    }

    let store = RocksRoundStore::open(dir.path()).unwrap();
    let history = store.settled_rounds("lottery", 10).await.unwrap();
    let buckets: Vec<u64> = history.iter().map(|r| r.bucket_start).collect();
    assert_eq!(buckets, vec![600, 300, 0]);
    assert!(history.iter().all(|r| r.totals.get("1") == Some(&2)));

    assert_eq!(store.settled_rounds("lottery", 2).await.unwrap().len(), 2);
    assert!(store.settled_rounds("dice", 10).await.unwrap().is_empty());
    assert_eq!(
        store.pending_rounds(Some("lottery")).await.unwrap(),
        vec![RoundKey::new("lottery", 900)]
    );

    // Counters keep accumulating after reopen.
    store.increment_totals(&play(900, "1", 3, 5)).await.unwrap();
    let open = store.find_round(&RoundKey::new("lottery", 900)).await.unwrap().unwrap();
    assert_eq!(open.totals.get("1"), Some(&5));
}

#[tokio::test]
async fn test_game_prefixes_do_not_collide() {
    let dir = TempDir::new().unwrap();
    let store = RocksRoundStore::open(dir.path()).unwrap();

    let mut short = lottery();
    short.id = "lot".to_string();
    for game in [&lottery(), &short] {
        let round = Round::pending(game, 300, "ab".repeat(32), 0);
        store.insert_round_if_absent(&round).await.unwrap();
        store
            .try_settle(&round.key(), &settlement(700_000))
            .await
            .unwrap();
    }

    assert_eq!(store.settled_rounds("lot", 10).await.unwrap().len(), 1);
    assert_eq!(store.settled_rounds("lottery", 10).await.unwrap().len(), 1);
}
