//! In-memory document store for persisted player records.
//!
//! Mirrors document-store semantics: find/upsert by user id, with
//! read-modify-write sequences held under one lock so settlement writes
//! cannot lose updates to concurrent duels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rocket::futures::lock::Mutex;
use rocket::response::status::{BadRequest, Created, NotFound};
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::boosts::TeamBoosts;
use crate::status_messages::{new_status, Status};

pub const DAY_WINDOW_MS: i64 = 86_400_000;
pub const DAILY_DUEL_XP_CAP: i64 = 100;
pub const DAILY_SAME_OPPONENT_CAP: u32 = 3;

/// Integer day bucket; daily counters reset lazily when the stored window
/// differs from the current one.
pub fn current_day_window() -> i64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    now_ms / DAY_WINDOW_MS
}

/// One owned copy-stack of a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct OwnedCard {
    pub count: u32,
    pub xp: i64,
    pub level: u32,
    /// Manual override; when set it replaces any computed team boost for
    /// this card, verbatim.
    pub boost_override: Option<TeamBoosts>,
}

/// One owned weapon instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct OwnedWeapon {
    pub level: u32,
    pub equipped_to: Option<String>,
}

/// Persisted progression record, keyed by player id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct PlayerProgress {
    pub user_id: String,
    pub cards: HashMap<String, OwnedCard>,
    pub weapons: HashMap<String, OwnedWeapon>,
    /// Ordered team, at most three card ids.
    pub team: Vec<String>,
    pub level: u32,
    pub xp: i64,
    /// Non-player entities cannot be challenged.
    #[serde(default)]
    pub bot: bool,
}

impl PlayerProgress {
    /// The at-most-one owned weapon equipped to the given card.
    pub fn weapon_equipped_to(&self, card_id: &str) -> Option<(&str, u32)> {
        self.weapons
            .iter()
            .find(|(_, w)| w.equipped_to.as_deref() == Some(card_id))
            .map(|(id, w)| (id.as_str(), w.level))
    }
}

/// Persisted economy record with day-window scoped counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct PlayerBalance {
    pub user_id: String,
    pub currency: i64,
    pub day_window: i64,
    pub gambles_today: u32,
    pub duel_xp_today: i64,
    pub duel_opponents_today: HashMap<String, u32>,
}

impl PlayerBalance {
    pub fn new(user_id: &str) -> Self {
        PlayerBalance {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Lazy daily reset: zero all window-scoped counters whenever the stored
    /// window differs from `window`. Every consumer must call this before
    /// reading or writing the counters.
    pub fn roll_window(&mut self, window: i64) {
        if self.day_window != window {
            self.day_window = window;
            self.gambles_today = 0;
            self.duel_xp_today = 0;
            self.duel_opponents_today.clear();
        }
    }
}

/// Result of a settlement write, reported even when persistence fails.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct RewardCredit {
    pub xp_gained: i64,
    pub bounty: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    progress: Arc<Mutex<HashMap<String, PlayerProgress>>>,
    balances: Arc<Mutex<HashMap<String, PlayerBalance>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        DocumentStore::default()
    }

    pub async fn find_progress(&self, user_id: &str) -> Option<PlayerProgress> {
        self.progress.lock().await.get(user_id).cloned()
    }

    pub async fn upsert_progress(&self, record: PlayerProgress) {
        self.progress
            .lock()
            .await
            .insert(record.user_id.clone(), record);
    }

    pub async fn find_balance(&self, user_id: &str) -> Option<PlayerBalance> {
        self.balances.lock().await.get(user_id).cloned()
    }

    /// Duels fought against `opponent_id` inside the current window.
    /// A stale stored window reads as zero without writing the reset back.
    pub async fn duels_against_today(
        &self,
        user_id: &str,
        opponent_id: &str,
        window: i64,
    ) -> u32 {
        match self.balances.lock().await.get(user_id) {
            Some(bal) if bal.day_window == window => bal
                .duel_opponents_today
                .get(opponent_id)
                .copied()
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Credit the winner: XP capped by the daily remainder, bounty uncapped.
    /// Runs as one read-modify-write under the balance lock.
    pub async fn credit_duel_rewards(
        &self,
        winner_id: &str,
        loser_level: u32,
        window: i64,
    ) -> Result<RewardCredit, String> {
        let bounty = i64::from(loser_level) * 100;
        // Verify the progress record before touching the balance so a
        // failed credit leaves nothing half-written.
        let mut progress = self.progress.lock().await;
        let record = progress
            .get_mut(winner_id)
            .ok_or_else(|| format!("Progress record for {winner_id} missing"))?;
        let mut balances = self.balances.lock().await;
        let balance = balances
            .entry(winner_id.to_string())
            .or_insert_with(|| PlayerBalance::new(winner_id));
        balance.roll_window(window);
        let remaining = (DAILY_DUEL_XP_CAP - balance.duel_xp_today).max(0);
        let xp_gained = (i64::from(loser_level) * 10).min(remaining);
        balance.duel_xp_today += xp_gained;
        balance.currency += bounty;
        record.xp += xp_gained;
        Ok(RewardCredit { xp_gained, bounty })
    }

    /// Increment both players' per-opponent daily counters.
    pub async fn bump_opponent_counters(&self, a: &str, b: &str, window: i64) {
        let mut balances = self.balances.lock().await;
        for (user, opponent) in [(a, b), (b, a)] {
            let balance = balances
                .entry(user.to_string())
                .or_insert_with(|| PlayerBalance::new(user));
            balance.roll_window(window);
            *balance
                .duel_opponents_today
                .entry(opponent.to_string())
                .or_insert(0) += 1;
        }
    }
}

/// Persisted progression for one player.
#[openapi]
#[get("/player/<user_id>/progress")]
pub async fn get_player_progress(
    user_id: &str,
    store: &State<DocumentStore>,
) -> Result<Json<PlayerProgress>, NotFound<Json<Status>>> {
    match store.find_progress(user_id).await {
        Some(record) => Ok(Json(record)),
        None => Err(NotFound(new_status(format!(
            "No progress record for {user_id}"
        )))),
    }
}

/// Persisted balance for one player. Counters are reported against the
/// current day window (stale windows read as reset).
#[openapi]
#[get("/player/<user_id>/balance")]
pub async fn get_player_balance(
    user_id: &str,
    store: &State<DocumentStore>,
) -> Result<Json<PlayerBalance>, NotFound<Json<Status>>> {
    match store.find_balance(user_id).await {
        Some(mut balance) => {
            balance.roll_window(current_day_window());
            Ok(Json(balance))
        }
        None => Err(NotFound(new_status(format!(
            "No balance record for {user_id}"
        )))),
    }
}

/// Test endpoint: seed or replace a player record.
#[openapi]
#[post("/tests/players", format = "json", data = "<record>")]
pub async fn seed_test_player(
    record: Json<PlayerProgress>,
    store: &State<DocumentStore>,
) -> Result<Created<Json<Status>>, BadRequest<Json<Status>>> {
    let record = record.0;
    if record.team.len() > 3 {
        return Err(BadRequest(new_status(
            "A team holds at most three cards".to_string(),
        )));
    }
    let location = format!("/player/{}/progress", record.user_id);
    store.upsert_progress(record).await;
    Ok(Created::new(location).body(new_status("seeded")))
}
