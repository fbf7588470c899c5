//! Progress recording after sessions end

mod common;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use common::{run_session, seeded_config, starter_catalog, Move};
use whosthat_core::catalog::CategoryId;
use whosthat_core::store::HIGH_SCORE_KEY;
use whosthat_core::{
    AnswerMode, GameMessage, JsonFileStore, MemoryStore, NotifyLevel, Outcome, ProgressStore,
    SessionConfig,
};

fn free_text(rounds: u32) -> SessionConfig {
    SessionConfig::new([CategoryId(1)])
        .with_answer_mode(AnswerMode::FreeText)
        .with_round_count(rounds)
}

fn progress_update(messages: &[GameMessage]) -> Option<(u32, bool, Vec<String>)> {
    messages.iter().find_map(|m| match m {
        GameMessage::ProgressUpdated {
            high_score,
            new_high_score,
            newly_unlocked,
        } => Some((*high_score, *new_high_score, newly_unlocked.clone())),
        _ => None,
    })
}

#[tokio::test(start_paused = true)]
async fn test_session_unlocks_identified_names() {
    let store = ProgressStore::new(MemoryStore::new());
    let run = run_session(
        starter_catalog(),
        seeded_config(),
        free_text(2),
        vec![Move::Correct, Move::Wrong],
        Some(store.clone()),
    )
    .await;

    let result = run.finished();
    assert_eq!(result.score, 1);
    assert_eq!(result.identified.len(), 1);

    let (high_score, new_high_score, newly_unlocked) = progress_update(&run.messages).unwrap();
    assert_eq!(high_score, 1);
    assert!(new_high_score);
    assert_eq!(newly_unlocked, result.identified);

    assert_eq!(store.high_score().await.unwrap(), 1);
    let unlocked = store.unlocked().await.unwrap();
    assert!(unlocked.contains(&result.identified[0]));
}

#[tokio::test(start_paused = true)]
async fn test_lower_score_keeps_high_score() {
    let store = ProgressStore::new(MemoryStore::new().with_value(HIGH_SCORE_KEY, "9"));
    let run = run_session(
        starter_catalog(),
        seeded_config(),
        free_text(2),
        vec![Move::Correct, Move::Correct],
        Some(store.clone()),
    )
    .await;

    let (high_score, new_high_score, _) = progress_update(&run.messages).unwrap();
    assert_eq!(high_score, 9);
    assert!(!new_high_score);
    assert!(!run.messages.iter().any(|m| matches!(
        m,
        GameMessage::Notify {
            level: NotifyLevel::Success,
            ..
        }
    )));
    assert_eq!(store.high_score().await.unwrap(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_session_still_records() {
    let store = ProgressStore::new(MemoryStore::new());
    let run = run_session(
        starter_catalog(),
        seeded_config(),
        free_text(3),
        vec![Move::Correct, Move::Quit],
        Some(store.clone()),
    )
    .await;

    assert_eq!(run.finished().outcome, Outcome::Abandoned);
    assert_eq!(store.high_score().await.unwrap(), 1);
    assert_eq!(store.unlocked().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_store_is_not_fatal() {
    let run = run_session(
        starter_catalog(),
        seeded_config(),
        free_text(1),
        vec![Move::Correct],
        Some(ProgressStore::new(MemoryStore::disabled())),
    )
    .await;

    assert_eq!(run.finished().outcome, Outcome::Completed);
    assert_eq!(run.finished().score, 1);
    assert!(progress_update(&run.messages).is_none());
    assert!(run.messages.iter().any(|m| matches!(
        m,
        GameMessage::Notify {
            level: NotifyLevel::Warning,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_progress_survives_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("progress.json");

    let first = run_session(
        starter_catalog(),
        seeded_config(),
        free_text(2),
        vec![Move::Correct, Move::Correct],
        Some(ProgressStore::new(JsonFileStore::new(&path))),
    )
    .await;
    assert_eq!(first.finished().score, 2);

    let reopened = ProgressStore::new(JsonFileStore::new(&path));
    assert_eq!(reopened.high_score().await.unwrap(), 2);
    assert_eq!(reopened.unlocked().await.unwrap().len(), 2);
}
