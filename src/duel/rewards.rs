//! End-of-duel reward settlement.

use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::store::{current_day_window, DocumentStore, DAILY_DUEL_XP_CAP};
use crate::telemetry::ActionRecorder;

/// Announced outcome of a settled duel. `persisted` is false when the
/// balance write failed; the announcement still carries the in-memory
/// numbers (accepted best-effort limitation, flagged in the logs).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct Settlement {
    pub winner_id: String,
    pub loser_id: String,
    pub loser_level: u32,
    pub xp_gained: i64,
    pub bounty: i64,
    pub persisted: bool,
}

/// Settle a finished duel. Records are read fresh rather than reusing any
/// snapshot taken at duel start; the winner's XP is capped by the daily
/// remainder while the bounty is credited unconditionally.
pub async fn settle_duel(
    store: &DocumentStore,
    recorder: &ActionRecorder,
    winner_id: &str,
    loser_id: &str,
) -> Settlement {
    let window = current_day_window();
    let loser_level = store
        .find_progress(loser_id)
        .await
        .map_or(0, |p| p.level);

    let (xp_gained, bounty, persisted) = match store
        .credit_duel_rewards(winner_id, loser_level, window)
        .await
    {
        Ok(credit) => (credit.xp_gained, credit.bounty, true),
        Err(e) => {
            log::error!("settlement persistence failed for {winner_id}: {e}");
            (
                (i64::from(loser_level) * 10).min(DAILY_DUEL_XP_CAP),
                i64::from(loser_level) * 100,
                false,
            )
        }
    };
    store
        .bump_opponent_counters(winner_id, loser_id, window)
        .await;

    // Best-effort quest notifications; both participants fought a duel.
    recorder.record(winner_id, "duel", 1);
    recorder.record(loser_id, "duel", 1);

    Settlement {
        winner_id: winner_id.to_string(),
        loser_id: loser_id.to_string(),
        loser_level,
        xp_gained,
        bounty,
        persisted,
    }
}
