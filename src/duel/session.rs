//! Duel session lifecycle and registry.
//!
//! The registry is injected managed state owning every pending invite and
//! live session; nothing here is process-global. Timeout callbacks are keyed
//! to a session's step sequence and become no-ops when the step they were
//! armed for has already been resolved.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand_pcg::Lcg64Xsh32;
use rocket::futures::lock::Mutex;
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::boosts::{team_boosts, TeamBoosts};
use crate::catalog::Catalog;
use crate::stats::{scale_unit, CombatUnit};
use crate::store::{OwnedCard, PlayerProgress};

pub type SharedRegistry = Arc<Mutex<DuelRegistry>>;

pub const DEFAULT_INVITE_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_PROMPT_WAIT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Side {
    Challenger,
    Opponent,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Challenger => Side::Opponent,
            Side::Opponent => Side::Challenger,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum AttackKind {
    Normal,
    Special,
}

impl AttackKind {
    pub fn parse(raw: &str) -> Option<AttackKind> {
        match raw {
            "normal" => Some(AttackKind::Normal),
            "special" => Some(AttackKind::Special),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttackKind::Normal => "normal",
            AttackKind::Special => "special",
        }
    }
}

/// Which player input the session is currently suspended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "phase_type")]
pub enum DuelPhase {
    AwaitCharacter,
    AwaitAttackType { attacker: usize },
    AwaitTarget { attacker: usize, kind: AttackKind },
}

/// One side's roster snapshot plus the owned-card map it was built from
/// (needed for the support-KO boost recomputation).
#[derive(Debug, Clone)]
pub struct SideState {
    pub user_id: String,
    pub units: Vec<CombatUnit>,
    pub boosts: TeamBoosts,
    pub owned: HashMap<String, OwnedCard>,
    /// Display pointer to the currently active unit.
    pub life_index: usize,
}

impl SideState {
    pub fn defeated(&self) -> bool {
        self.units.iter().all(|u| !u.alive())
    }

    pub fn strongest_power(&self) -> i64 {
        self.units.iter().map(|u| u.power).max().unwrap_or(0)
    }

    /// Advance the life index past dead units; past-the-end means defeated.
    fn refresh_life_index(&mut self) {
        if self
            .units
            .get(self.life_index)
            .is_some_and(CombatUnit::alive)
        {
            return;
        }
        self.life_index = self
            .units
            .iter()
            .position(CombatUnit::alive)
            .unwrap_or(self.units.len());
    }
}

/// Ephemeral in-memory duel state. Created on challenge-accept, destroyed on
/// duel end; no crash recovery.
#[derive(Debug, Clone)]
pub struct DuelSession {
    pub id: String,
    /// Routing info for the surrounding chat UI.
    pub channel: String,
    pub challenger: SideState,
    pub opponent: SideState,
    pub current_turn: Side,
    pub phase: DuelPhase,
    /// Bumped on every transition; deferred timeouts must match it to act.
    pub step_seq: u64,
}

impl DuelSession {
    pub fn side(&self, side: Side) -> &SideState {
        match side {
            Side::Challenger => &self.challenger,
            Side::Opponent => &self.opponent,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideState {
        match side {
            Side::Challenger => &mut self.challenger,
            Side::Opponent => &mut self.opponent,
        }
    }

    /// Acting and defending sides, borrowed together.
    pub fn sides_mut(&mut self, acting: Side) -> (&mut SideState, &mut SideState) {
        match acting {
            Side::Challenger => (&mut self.challenger, &mut self.opponent),
            Side::Opponent => (&mut self.opponent, &mut self.challenger),
        }
    }

    pub fn acting(&self) -> &SideState {
        self.side(self.current_turn)
    }

    pub fn participant_side(&self, user_id: &str) -> Option<Side> {
        if self.challenger.user_id == user_id {
            Some(Side::Challenger)
        } else if self.opponent.user_id == user_id {
            Some(Side::Opponent)
        } else {
            None
        }
    }

    pub fn advance_step(&mut self) -> u64 {
        self.step_seq += 1;
        self.step_seq
    }

    /// Turn bookkeeping for the acting side: clear last turn's exhaustion,
    /// then promote pending exhaustion (special used last turn means this
    /// turn is skipped). Also refreshes both life indices.
    pub fn turn_start(&mut self) {
        let acting = self.side_mut(self.current_turn);
        for unit in &mut acting.units {
            unit.exhausted_this_turn = false;
            if unit.exhausted_pending_next_turn {
                unit.exhausted_this_turn = true;
                unit.exhausted_pending_next_turn = false;
            }
        }
        self.challenger.refresh_life_index();
        self.opponent.refresh_life_index();
    }

    /// Units the acting player may pick: alive and not exhausted.
    pub fn selectable_characters(&self) -> Vec<usize> {
        self.acting()
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.alive() && !u.exhausted_this_turn)
            .map(|(i, _)| i)
            .collect()
    }

    /// If every acting unit is exhausted the turn passes automatically.
    /// Bounded: exhaustion lasts one turn, so at most one pass per side.
    pub fn skip_unactionable_turns(&mut self) {
        for _ in 0..2 {
            if !self.selectable_characters().is_empty() {
                return;
            }
            self.current_turn = self.current_turn.other();
            self.turn_start();
        }
    }
}

/// Challenge awaiting accept/decline, keyed by challenger id.
#[derive(Debug, Clone)]
pub struct PendingInvite {
    pub challenger: String,
    pub opponent: String,
    pub channel: String,
    /// Identity token for the expiry callback.
    pub token: u64,
}

/// Outcome of a prompt-timeout firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptExpiry {
    /// The prompt was still current; the turn was forfeited and a new
    /// prompt (with this step sequence) is live.
    Forfeited { next_seq: u64 },
    /// The step was already resolved by a player action.
    Stale,
    /// The session no longer exists.
    Gone,
}

#[derive(Debug, Default)]
pub struct DuelRegistry {
    invites: HashMap<String, PendingInvite>,
    sessions: HashMap<String, DuelSession>,
    next_session_id: u64,
    next_token: u64,
    pub invite_wait: Duration,
    pub prompt_wait: Duration,
}

impl DuelRegistry {
    pub fn new() -> Self {
        Self::with_waits(DEFAULT_INVITE_WAIT, DEFAULT_PROMPT_WAIT)
    }

    pub fn with_waits(invite_wait: Duration, prompt_wait: Duration) -> Self {
        DuelRegistry {
            invite_wait,
            prompt_wait,
            ..Default::default()
        }
    }

    /// Linear scan over live sessions and pending invites; a player may be
    /// party to at most one of either.
    pub fn participant_busy(&self, user_id: &str) -> bool {
        self.sessions
            .values()
            .any(|s| s.participant_side(user_id).is_some())
            || self
                .invites
                .values()
                .any(|i| i.challenger == user_id || i.opponent == user_id)
    }

    pub fn create_invite(&mut self, challenger: &str, opponent: &str, channel: &str) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.invites.insert(
            challenger.to_string(),
            PendingInvite {
                challenger: challenger.to_string(),
                opponent: opponent.to_string(),
                channel: channel.to_string(),
                token,
            },
        );
        token
    }

    pub fn invite(&self, challenger: &str) -> Option<&PendingInvite> {
        self.invites.get(challenger)
    }

    /// Consume the invite, but only for the invited opponent.
    pub fn take_invite_for(&mut self, challenger: &str, actor: &str) -> Option<PendingInvite> {
        if self.invites.get(challenger)?.opponent != actor {
            return None;
        }
        self.invites.remove(challenger)
    }

    /// Expire an unanswered invite; stale tokens are a no-op.
    pub fn expire_invite(&mut self, challenger: &str, token: u64) -> bool {
        if self.invites.get(challenger).is_some_and(|i| i.token == token) {
            self.invites.remove(challenger);
            true
        } else {
            false
        }
    }

    pub fn session(&self, id: &str) -> Option<&DuelSession> {
        self.sessions.get(id)
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut DuelSession> {
        self.sessions.get_mut(id)
    }

    pub fn remove_session(&mut self, id: &str) -> Option<DuelSession> {
        self.sessions.remove(id)
    }

    /// Create a live session from two built rosters. First mover is the
    /// side with the strongest single unit; ties favor the challenger.
    pub fn create_session(
        &mut self,
        channel: &str,
        challenger: SideState,
        opponent: SideState,
    ) -> String {
        self.next_session_id += 1;
        let id = format!("duel-{}", self.next_session_id);
        let first = if challenger.strongest_power() >= opponent.strongest_power() {
            Side::Challenger
        } else {
            Side::Opponent
        };
        let mut session = DuelSession {
            id: id.clone(),
            channel: channel.to_string(),
            challenger,
            opponent,
            current_turn: first,
            phase: DuelPhase::AwaitCharacter,
            step_seq: 0,
        };
        session.turn_start();
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Handle a prompt deadline elapsing: forfeit the acting player's turn
    /// if (and only if) the step the deadline was armed for is still live.
    pub fn expire_prompt(&mut self, session_id: &str, seq: u64) -> PromptExpiry {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return PromptExpiry::Gone;
        };
        if session.step_seq != seq {
            return PromptExpiry::Stale;
        }
        session.current_turn = session.current_turn.other();
        session.phase = DuelPhase::AwaitCharacter;
        session.turn_start();
        session.skip_unactionable_turns();
        PromptExpiry::Forfeited {
            next_seq: session.advance_step(),
        }
    }
}

/// Build one side's roster snapshot: team boosts are rolled exactly once
/// here and carried through the session.
pub fn build_side(
    rng: &mut Lcg64Xsh32,
    progress: &PlayerProgress,
    catalog: &Catalog,
) -> Result<SideState, String> {
    if progress.team.is_empty() {
        return Err(format!("{} has no team", progress.user_id));
    }
    if progress.team.len() > 3 {
        return Err(format!("{} has an oversized team", progress.user_id));
    }
    let boosts = team_boosts(rng, &progress.team, &progress.cards, catalog)?;
    let mut units = Vec::with_capacity(progress.team.len());
    for card_id in &progress.team {
        let card = catalog
            .card(card_id)
            .ok_or_else(|| format!("Card {card_id} not found in catalog"))?;
        let level = progress.cards.get(card_id).map_or(0, |o| o.level);
        let weapon = progress
            .weapon_equipped_to(card_id)
            .and_then(|(weapon_id, weapon_level)| {
                catalog.weapon(weapon_id).map(|w| (w, weapon_level))
            });
        units.push(scale_unit(card, level, weapon, &boosts));
    }
    Ok(SideState {
        user_id: progress.user_id.clone(),
        units,
        boosts,
        owned: progress.cards.clone(),
        life_index: 0,
    })
}

/// Arm the invite-expiry deadline. Firing after an accept/decline is a
/// no-op thanks to the token check.
pub fn schedule_invite_timeout(registry: SharedRegistry, challenger: String, token: u64) {
    rocket::tokio::spawn(async move {
        let wait = { registry.lock().await.invite_wait };
        rocket::tokio::time::sleep(wait).await;
        let expired = registry.lock().await.expire_invite(&challenger, token);
        if expired {
            log::info!("duel invite from {challenger} expired unanswered");
        }
    });
}

/// Arm the prompt deadline for step `seq`. The task keeps watching across
/// consecutive timeout-forfeited turns; a player action makes it stale and
/// the action handler arms a fresh task for the new step.
pub fn schedule_prompt_timeout(registry: SharedRegistry, session_id: String, mut seq: u64) {
    rocket::tokio::spawn(async move {
        loop {
            let wait = { registry.lock().await.prompt_wait };
            rocket::tokio::time::sleep(wait).await;
            match registry.lock().await.expire_prompt(&session_id, seq) {
                PromptExpiry::Forfeited { next_seq } => {
                    log::info!("prompt timed out in {session_id}; turn forfeited");
                    seq = next_seq;
                }
                PromptExpiry::Stale | PromptExpiry::Gone => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample::sample_catalog;
    use rand::SeedableRng;

    fn rng() -> Lcg64Xsh32 {
        Lcg64Xsh32::from_seed([3u8; 16])
    }

    fn progress(user: &str, team: &[&str]) -> PlayerProgress {
        let mut p = PlayerProgress {
            user_id: user.to_string(),
            team: team.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        for id in team {
            p.cards.insert(id.to_string(), OwnedCard::default());
        }
        p
    }

    fn two_sided_registry() -> (DuelRegistry, String) {
        let catalog = sample_catalog();
        let mut rng = rng();
        let a = build_side(&mut rng, &progress("alice", &["squire1"]), &catalog).unwrap();
        let b = build_side(&mut rng, &progress("bob", &["squire1"]), &catalog).unwrap();
        let mut registry = DuelRegistry::new();
        let id = registry.create_session("chan", a, b);
        (registry, id)
    }

    #[test]
    fn tie_on_strongest_power_favors_the_challenger() {
        let (registry, id) = two_sided_registry();
        let session = registry.session(&id).unwrap();
        assert_eq!(session.current_turn, Side::Challenger);
    }

    #[test]
    fn stronger_opponent_moves_first() {
        let catalog = sample_catalog();
        let mut rng = rng();
        let a = build_side(&mut rng, &progress("alice", &["squire1"]), &catalog).unwrap();
        let b = build_side(&mut rng, &progress("bob", &["knight1"]), &catalog).unwrap();
        let mut registry = DuelRegistry::new();
        let id = registry.create_session("chan", a, b);
        assert_eq!(registry.session(&id).unwrap().current_turn, Side::Opponent);
    }

    #[test]
    fn build_side_rejects_unknown_cards_and_empty_teams() {
        let catalog = sample_catalog();
        let mut rng = rng();
        assert!(build_side(&mut rng, &progress("alice", &["ghost1"]), &catalog).is_err());
        assert!(build_side(&mut rng, &progress("alice", &[]), &catalog).is_err());
    }

    #[test]
    fn stale_prompt_timeout_is_a_noop() {
        let (mut registry, id) = two_sided_registry();
        let live_seq = registry.session(&id).unwrap().step_seq;
        let turn_before = registry.session(&id).unwrap().current_turn;
        assert_eq!(registry.expire_prompt(&id, live_seq + 7), PromptExpiry::Stale);
        assert_eq!(registry.session(&id).unwrap().current_turn, turn_before);
        assert_eq!(
            registry.expire_prompt("duel-404", 0),
            PromptExpiry::Gone
        );
    }

    #[test]
    fn current_prompt_timeout_forfeits_the_turn() {
        let (mut registry, id) = two_sided_registry();
        let seq = registry.session(&id).unwrap().step_seq;
        match registry.expire_prompt(&id, seq) {
            PromptExpiry::Forfeited { next_seq } => assert_eq!(next_seq, seq + 1),
            other => panic!("expected forfeit, got {other:?}"),
        }
        let session = registry.session(&id).unwrap();
        assert_eq!(session.current_turn, Side::Opponent);
        assert_eq!(session.phase, DuelPhase::AwaitCharacter);
        // No damage was dealt.
        assert!(session.challenger.units.iter().all(|u| u.current_health == u.max_health));
    }

    #[test]
    fn exhaustion_is_promoted_with_a_one_turn_delay() {
        let (mut registry, id) = two_sided_registry();
        let session = registry.session_mut(&id).unwrap();
        session.challenger.units[0].exhausted_pending_next_turn = true;

        // Opponent's turn start leaves the challenger's flags untouched.
        session.current_turn = Side::Opponent;
        session.turn_start();
        assert!(!session.challenger.units[0].exhausted_this_turn);
        assert!(session.challenger.units[0].exhausted_pending_next_turn);

        // Challenger's own turn start promotes the pending flag.
        session.current_turn = Side::Challenger;
        session.turn_start();
        assert!(session.challenger.units[0].exhausted_this_turn);
        assert!(!session.challenger.units[0].exhausted_pending_next_turn);
        assert!(session.selectable_characters().is_empty());

        // And it is gone the turn after.
        session.turn_start();
        assert!(!session.challenger.units[0].exhausted_this_turn);
    }

    #[test]
    fn busy_scan_covers_sessions_and_invites() {
        let (mut registry, _) = two_sided_registry();
        assert!(registry.participant_busy("alice"));
        assert!(registry.participant_busy("bob"));
        assert!(!registry.participant_busy("carol"));
        registry.create_invite("carol", "dave", "chan");
        assert!(registry.participant_busy("carol"));
        assert!(registry.participant_busy("dave"));
    }

    #[test]
    fn invite_tokens_guard_expiry() {
        let mut registry = DuelRegistry::new();
        let token = registry.create_invite("alice", "bob", "chan");
        assert!(!registry.expire_invite("alice", token + 1));
        assert!(registry.invite("alice").is_some());
        assert!(registry.expire_invite("alice", token));
        assert!(registry.invite("alice").is_none());
    }

    #[test]
    fn only_the_invited_opponent_can_take_an_invite() {
        let mut registry = DuelRegistry::new();
        registry.create_invite("alice", "bob", "chan");
        assert!(registry.take_invite_for("alice", "mallory").is_none());
        assert!(registry.take_invite_for("alice", "bob").is_some());
        assert!(registry.invite("alice").is_none());
    }
}
