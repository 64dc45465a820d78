//! Duel command entrypoint, interaction dispatch and presentation views.
//!
//! The surrounding chat layer posts challenge requests to `/duel` and routes
//! button-style events to `/interaction` with namespaced opaque ids
//! (`duel_accept:<challenger>`, `duel_selectchar:<session>:<idx>`, ...).
//! Stale or unauthorized interactions are acknowledged-false notices and
//! never alter session state.

pub mod resolve;
pub mod rewards;
pub mod session;

use either::{Either, Left, Right};
use rand::SeedableRng;
use rand_pcg::Lcg64Xsh32;
use rocket::response::status::{BadRequest, NotFound};
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::State;
use rocket_okapi::{openapi, JsonSchema};

use crate::boosts::{team_boosts_detailed, CardBoostDetail, TeamBoosts};
use crate::catalog::{Catalog, StatRange};
use crate::status_messages::{new_status, Status};
use crate::store::{current_day_window, DocumentStore, DAILY_SAME_OPPONENT_CAP};
use crate::telemetry::ActionRecorder;
use crate::SharedRng;

use resolve::{resolve_attack, AttackOutcome, ResolutionReport};
use rewards::{settle_duel, Settlement};
use session::{
    build_side, schedule_invite_timeout, schedule_prompt_timeout, AttackKind, DuelPhase,
    DuelSession, SharedRegistry,
};

// ---- Presentation views (structured state only, no markup) ----

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct SpecialView {
    pub name: String,
    pub range: StatRange,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct UnitView {
    pub index: usize,
    pub card_id: String,
    pub name: String,
    pub level: u32,
    pub power: i64,
    pub attack_range: StatRange,
    pub special: Option<SpecialView>,
    pub current_health: i64,
    pub max_health: i64,
    pub alive: bool,
    pub exhausted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct SideView {
    pub user_id: String,
    pub boosts: TeamBoosts,
    pub active_index: usize,
    pub units: Vec<UnitView>,
}

/// The input the session is waiting for, with the legal options.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "prompt_type")]
pub enum PromptView {
    SelectCharacter {
        options: Vec<usize>,
    },
    SelectAttackType {
        attacker: usize,
        special_available: bool,
    },
    SelectTarget {
        attacker: usize,
        kind: AttackKind,
        options: Vec<usize>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct DuelView {
    pub session_id: String,
    pub channel: String,
    pub acting_user_id: String,
    pub challenger: SideView,
    pub opponent: SideView,
    pub prompt: PromptView,
    pub finished: bool,
}

fn side_view(side: &session::SideState) -> SideView {
    SideView {
        user_id: side.user_id.clone(),
        boosts: side.boosts,
        active_index: side.life_index,
        units: side
            .units
            .iter()
            .enumerate()
            .map(|(index, u)| UnitView {
                index,
                card_id: u.card_id.clone(),
                name: u.name.clone(),
                level: u.level,
                power: u.power,
                attack_range: u.attack_range,
                special: u.special.as_ref().map(|s| SpecialView {
                    name: s.name.clone(),
                    range: s.range,
                    available: !s.used,
                }),
                current_health: u.current_health,
                max_health: u.max_health,
                alive: u.alive(),
                exhausted: u.exhausted_this_turn,
            })
            .collect(),
    }
}

fn view_of(session: &DuelSession, finished: bool) -> DuelView {
    let defending = session.current_turn.other();
    let prompt = match session.phase {
        DuelPhase::AwaitCharacter => PromptView::SelectCharacter {
            options: session.selectable_characters(),
        },
        DuelPhase::AwaitAttackType { attacker } => PromptView::SelectAttackType {
            attacker,
            special_available: session
                .acting()
                .units
                .get(attacker)
                .is_some_and(|u| u.special_available()),
        },
        DuelPhase::AwaitTarget { attacker, kind } => PromptView::SelectTarget {
            attacker,
            kind,
            options: session
                .side(defending)
                .units
                .iter()
                .enumerate()
                .filter(|(_, u)| u.alive())
                .map(|(i, _)| i)
                .collect(),
        },
    };
    DuelView {
        session_id: session.id.clone(),
        channel: session.channel.clone(),
        acting_user_id: session.acting().user_id.clone(),
        challenger: side_view(&session.challenger),
        opponent: side_view(&session.opponent),
        prompt,
        finished,
    }
}

// ---- Challenge creation ----

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct DuelRequest {
    pub challenger_id: String,
    pub opponent_id: String,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct InviteView {
    pub challenger_id: String,
    pub opponent_id: String,
    pub accept_custom_id: String,
    pub decline_custom_id: String,
    pub expires_in_secs: u64,
}

/// Create a duel challenge. Validation failures are reported synchronously;
/// nothing is mutated on rejection.
#[openapi]
#[post("/duel", format = "json", data = "<request>")]
pub async fn start_duel(
    request: Json<DuelRequest>,
    registry: &State<SharedRegistry>,
    store: &State<DocumentStore>,
) -> Result<
    (rocket::http::Status, Json<InviteView>),
    Either<NotFound<Json<Status>>, BadRequest<Json<Status>>>,
> {
    let request = request.0;
    let challenger = request.challenger_id;
    let opponent = request.opponent_id;

    if challenger == opponent {
        return Err(Right(BadRequest(new_status("You cannot duel yourself"))));
    }
    let challenger_progress = store
        .find_progress(&challenger)
        .await
        .ok_or_else(|| Left(NotFound(new_status(format!("Unknown player {challenger}")))))?;
    let opponent_progress = store
        .find_progress(&opponent)
        .await
        .ok_or_else(|| Left(NotFound(new_status(format!("Unknown player {opponent}")))))?;
    if opponent_progress.bot {
        return Err(Right(BadRequest(new_status(
            "You cannot duel a non-player",
        ))));
    }
    if challenger_progress.team.is_empty() || challenger_progress.team.len() > 3 {
        return Err(Right(BadRequest(new_status(
            "You need a team of one to three cards to duel",
        ))));
    }
    if opponent_progress.team.is_empty() || opponent_progress.team.len() > 3 {
        return Err(Right(BadRequest(new_status(format!(
            "{opponent} has no valid team"
        )))));
    }
    let window = current_day_window();
    if store.duels_against_today(&challenger, &opponent, window).await
        >= DAILY_SAME_OPPONENT_CAP
    {
        return Err(Right(BadRequest(new_status(format!(
            "Daily duel limit against {opponent} reached"
        )))));
    }

    let mut reg = registry.lock().await;
    if reg.participant_busy(&challenger) {
        return Err(Right(BadRequest(new_status(
            "You already have a duel or challenge in progress",
        ))));
    }
    if reg.participant_busy(&opponent) {
        return Err(Right(BadRequest(new_status(format!(
            "{opponent} is already in a duel"
        )))));
    }
    let channel = request.channel.unwrap_or_default();
    let token = reg.create_invite(&challenger, &opponent, &channel);
    let expires_in_secs = reg.invite_wait.as_secs();
    drop(reg);
    schedule_invite_timeout(registry.inner().clone(), challenger.clone(), token);

    Ok((
        rocket::http::Status::Created,
        Json(InviteView {
            accept_custom_id: format!("duel_accept:{challenger}"),
            decline_custom_id: format!("duel_decline:{challenger}"),
            challenger_id: challenger,
            opponent_id: opponent,
            expires_in_secs,
        }),
    ))
}

// ---- Interaction dispatch ----

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct InteractionRequest {
    pub actor_id: String,
    pub custom_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct InteractionResponse {
    /// False when the event was stale, unauthorized or malformed; the
    /// session state is untouched in that case.
    pub acknowledged: bool,
    pub note: Option<String>,
    pub view: Option<DuelView>,
    pub settlement: Option<Settlement>,
}

fn ignored(note: impl Into<String>) -> InteractionResponse {
    let note = note.into();
    log::debug!("ignored interaction: {note}");
    InteractionResponse {
        acknowledged: false,
        note: Some(note),
        view: None,
        settlement: None,
    }
}

fn accepted(note: Option<String>, view: DuelView) -> InteractionResponse {
    InteractionResponse {
        acknowledged: true,
        note,
        view: Some(view),
        settlement: None,
    }
}

fn describe(report: &ResolutionReport) -> String {
    match report.outcome {
        AttackOutcome::Missed => format!("{} missed completely", report.attacker_card_id),
        AttackOutcome::Hit { damage, special } => {
            let verb = if special { "unleashed a special for" } else { "hit for" };
            let mut text = format!(
                "{} {verb} {damage} damage on {}",
                report.attacker_card_id, report.target_card_id
            );
            if report.target_defeated {
                text.push_str(" (defeated)");
            }
            if !report.cascade_casualties.is_empty() {
                text.push_str(&format!(
                    "; boost collapse also took down {}",
                    report.cascade_casualties.join(", ")
                ));
            }
            text
        }
    }
}

/// Route a button-style event back into the state machine. Always returns
/// 200: stale and unauthorized events degrade to acknowledged-false notices.
#[openapi]
#[post("/interaction", format = "json", data = "<request>")]
pub async fn handle_interaction(
    request: Json<InteractionRequest>,
    registry: &State<SharedRegistry>,
    store: &State<DocumentStore>,
    catalog: &State<Catalog>,
    rng: &State<SharedRng>,
    recorder: &State<std::sync::Arc<ActionRecorder>>,
) -> Json<InteractionResponse> {
    let request = request.0;
    let actor = request.actor_id.as_str();
    let parts: Vec<&str> = request.custom_id.split(':').collect();

    let response = match parts.as_slice() {
        ["duel_accept", challenger] => {
            accept_invite(registry, store, catalog, rng, challenger, actor).await
        }
        ["duel_decline", challenger] => {
            let mut reg = registry.lock().await;
            match reg.take_invite_for(challenger, actor) {
                Some(invite) => {
                    log::info!("{} declined the duel from {}", actor, invite.challenger);
                    InteractionResponse {
                        acknowledged: true,
                        note: Some(format!("{actor} declined the challenge")),
                        view: None,
                        settlement: None,
                    }
                }
                None => ignored("No pending challenge for you"),
            }
        }
        ["duel_selectchar", session_id, idx] => {
            select_character(registry, session_id, actor, idx).await
        }
        ["duel_attack", session_id, idx, kind] => {
            select_attack_type(registry, session_id, actor, idx, kind).await
        }
        ["duel_target", session_id, attacker_idx, kind, target_idx] => {
            select_target(
                registry, store, catalog, rng, recorder, session_id, actor, attacker_idx,
                kind, target_idx,
            )
            .await
        }
        ["duel_forfeit", session_id] => {
            forfeit(registry, store, recorder, session_id, actor).await
        }
        _ => ignored("Unrecognized interaction id"),
    };
    Json(response)
}

async fn accept_invite(
    registry: &State<SharedRegistry>,
    store: &State<DocumentStore>,
    catalog: &State<Catalog>,
    rng: &State<SharedRng>,
    challenger: &str,
    actor: &str,
) -> InteractionResponse {
    let mut reg = registry.lock().await;
    let Some(invite) = reg.take_invite_for(challenger, actor) else {
        return ignored("No pending challenge for you");
    };
    // Records are read fresh at accept time; rosters are snapshotted from
    // whatever the players own right now.
    let Some(challenger_progress) = store.find_progress(&invite.challenger).await else {
        return ignored(format!("{} no longer has a player record", invite.challenger));
    };
    let Some(opponent_progress) = store.find_progress(&invite.opponent).await else {
        return ignored(format!("{} no longer has a player record", invite.opponent));
    };

    let mut rng_guard = rng.lock().await;
    let built = build_side(&mut rng_guard, &challenger_progress, catalog).and_then(
        |challenger_side| {
            build_side(&mut rng_guard, &opponent_progress, catalog)
                .map(|opponent_side| (challenger_side, opponent_side))
        },
    );
    drop(rng_guard);
    match built {
        Err(e) => {
            // Missing catalog data aborts creation; no session exists.
            log::warn!("duel between {challenger} and {actor} aborted: {e}");
            ignored(format!("Duel could not start: {e}"))
        }
        Ok((challenger_side, opponent_side)) => {
            let session_id =
                reg.create_session(&invite.channel, challenger_side, opponent_side);
            let view = reg.session(&session_id).map(|s| view_of(s, false));
            drop(reg);
            schedule_prompt_timeout(registry.inner().clone(), session_id.clone(), 0);
            match view {
                Some(view) => accepted(Some(format!("Duel {session_id} started")), view),
                None => ignored("Duel could not start"),
            }
        }
    }
}

async fn select_character(
    registry: &State<SharedRegistry>,
    session_id: &str,
    actor: &str,
    idx: &str,
) -> InteractionResponse {
    let Ok(idx) = idx.parse::<usize>() else {
        return ignored("Malformed unit index");
    };
    let mut reg = registry.lock().await;
    let Some(session) = reg.session_mut(session_id) else {
        return ignored("Unknown or finished duel");
    };
    if session.acting().user_id != actor {
        return ignored("It is not your turn");
    }
    if session.phase != DuelPhase::AwaitCharacter {
        return ignored("No character prompt is pending");
    }
    if !session.selectable_characters().contains(&idx) {
        return ignored("That unit cannot act this turn");
    }
    session.phase = DuelPhase::AwaitAttackType { attacker: idx };
    let seq = session.advance_step();
    let view = view_of(session, false);
    drop(reg);
    schedule_prompt_timeout(registry.inner().clone(), session_id.to_string(), seq);
    accepted(None, view)
}

async fn select_attack_type(
    registry: &State<SharedRegistry>,
    session_id: &str,
    actor: &str,
    idx: &str,
    kind: &str,
) -> InteractionResponse {
    let Ok(idx) = idx.parse::<usize>() else {
        return ignored("Malformed unit index");
    };
    let Some(kind) = AttackKind::parse(kind) else {
        return ignored("Unknown attack type");
    };
    let mut reg = registry.lock().await;
    let Some(session) = reg.session_mut(session_id) else {
        return ignored("Unknown or finished duel");
    };
    if session.acting().user_id != actor {
        return ignored("It is not your turn");
    }
    if session.phase != (DuelPhase::AwaitAttackType { attacker: idx }) {
        return ignored("No attack prompt is pending for that unit");
    }
    if kind == AttackKind::Special
        && !session
            .acting()
            .units
            .get(idx)
            .is_some_and(|u| u.special_available())
    {
        return ignored("That unit's special attack is not available");
    }
    session.phase = DuelPhase::AwaitTarget {
        attacker: idx,
        kind,
    };
    let seq = session.advance_step();
    let view = view_of(session, false);
    drop(reg);
    schedule_prompt_timeout(registry.inner().clone(), session_id.to_string(), seq);
    accepted(None, view)
}

#[allow(clippy::too_many_arguments)]
async fn select_target(
    registry: &State<SharedRegistry>,
    store: &State<DocumentStore>,
    catalog: &State<Catalog>,
    rng: &State<SharedRng>,
    recorder: &State<std::sync::Arc<ActionRecorder>>,
    session_id: &str,
    actor: &str,
    attacker_idx: &str,
    kind: &str,
    target_idx: &str,
) -> InteractionResponse {
    let (Ok(attacker_idx), Ok(target_idx)) =
        (attacker_idx.parse::<usize>(), target_idx.parse::<usize>())
    else {
        return ignored("Malformed unit index");
    };
    let Some(kind) = AttackKind::parse(kind) else {
        return ignored("Unknown attack type");
    };

    let mut reg = registry.lock().await;
    let Some(session) = reg.session_mut(session_id) else {
        return ignored("Unknown or finished duel");
    };
    if session.acting().user_id != actor {
        return ignored("It is not your turn");
    }
    if session.phase
        != (DuelPhase::AwaitTarget {
            attacker: attacker_idx,
            kind,
        })
    {
        return ignored("No target prompt is pending for that selection");
    }
    let defending = session.current_turn.other();
    if !session
        .side(defending)
        .units
        .get(target_idx)
        .is_some_and(|u| u.alive())
    {
        return ignored("That target is not available");
    }

    let mut rng_guard = rng.lock().await;
    let resolved = resolve_attack(
        session,
        attacker_idx,
        kind,
        target_idx,
        &mut rng_guard,
        catalog,
    );
    drop(rng_guard);
    let report = match resolved {
        Ok(report) => report,
        Err(e) => {
            log::error!("attack resolution failed in {session_id}: {e}");
            return ignored("Something went wrong resolving that attack");
        }
    };

    if let Some(winner_side) = report.winner {
        let winner = session.side(winner_side).user_id.clone();
        let loser = session.side(winner_side.other()).user_id.clone();
        let finished = reg.remove_session(session_id);
        drop(reg);
        let settlement = settle_duel(store, recorder, &winner, &loser).await;
        InteractionResponse {
            acknowledged: true,
            note: Some(format!("{} — {winner} wins the duel", describe(&report))),
            view: finished.map(|s| view_of(&s, true)),
            settlement: Some(settlement),
        }
    } else {
        session.current_turn = session.current_turn.other();
        session.phase = DuelPhase::AwaitCharacter;
        session.turn_start();
        session.skip_unactionable_turns();
        let seq = session.advance_step();
        let view = view_of(session, false);
        drop(reg);
        schedule_prompt_timeout(registry.inner().clone(), session_id.to_string(), seq);
        accepted(Some(describe(&report)), view)
    }
}

async fn forfeit(
    registry: &State<SharedRegistry>,
    store: &State<DocumentStore>,
    recorder: &State<std::sync::Arc<ActionRecorder>>,
    session_id: &str,
    actor: &str,
) -> InteractionResponse {
    let mut reg = registry.lock().await;
    let Some(session) = reg.session(session_id) else {
        return ignored("Unknown or finished duel");
    };
    let Some(forfeiting_side) = session.participant_side(actor) else {
        return ignored("You are not part of that duel");
    };
    let winner = session.side(forfeiting_side.other()).user_id.clone();
    let loser = session.side(forfeiting_side).user_id.clone();
    let finished = reg.remove_session(session_id);
    drop(reg);
    // Resolved identically to a loss by health exhaustion.
    let settlement = settle_duel(store, recorder, &winner, &loser).await;
    InteractionResponse {
        acknowledged: true,
        note: Some(format!("{loser} forfeited; {winner} wins the duel")),
        view: finished.map(|s| view_of(&s, true)),
        settlement: Some(settlement),
    }
}

// ---- Session and boost read endpoints ----

/// Structured state of a live duel for the presentation layer.
#[openapi]
#[get("/duel/<session_id>")]
pub async fn get_duel(
    session_id: &str,
    registry: &State<SharedRegistry>,
) -> Result<Json<DuelView>, NotFound<Json<Status>>> {
    let reg = registry.lock().await;
    match reg.session(session_id) {
        Some(session) => Ok(Json(view_of(session, false))),
        None => Err(NotFound(new_status(format!(
            "No live duel session {session_id}"
        )))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct TeamBoostBreakdown {
    pub user_id: String,
    pub total: TeamBoosts,
    pub per_card: Vec<CardBoostDetail>,
}

/// Per-card team boost breakdown. Support contributions are a fresh preview
/// roll; the values actually applied in a duel are the ones rolled when the
/// roster snapshot was built.
#[openapi]
#[get("/team/<user_id>/boosts")]
pub async fn get_team_boosts(
    user_id: &str,
    store: &State<DocumentStore>,
    catalog: &State<Catalog>,
    rng: &State<SharedRng>,
) -> Result<Json<TeamBoostBreakdown>, Either<NotFound<Json<Status>>, BadRequest<Json<Status>>>> {
    let Some(progress) = store.find_progress(user_id).await else {
        return Err(Left(NotFound(new_status(format!(
            "Unknown player {user_id}"
        )))));
    };
    let mut rng_guard = rng.lock().await;
    let per_card = team_boosts_detailed(
        &mut rng_guard,
        &progress.team,
        &progress.cards,
        catalog,
    )
    .map_err(|e| Right(BadRequest(new_status(e))))?;
    let mut total = TeamBoosts::default();
    for detail in &per_card {
        total.add(&detail.boost);
    }
    Ok(Json(TeamBoostBreakdown {
        user_id: user_id.to_string(),
        total,
        per_card,
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct SeedRequest {
    pub seed: u64,
}

/// Test endpoint: reseed the shared generator for deterministic runs.
#[openapi]
#[post("/tests/seed", format = "json", data = "<request>")]
pub async fn reseed_rng(
    request: Json<SeedRequest>,
    rng: &State<SharedRng>,
) -> Json<Status> {
    let seed = request.0.seed;
    let mut seed_bytes = [0u8; 16];
    seed_bytes[0..8].copy_from_slice(&seed.to_le_bytes());
    seed_bytes[8..16].copy_from_slice(&seed.to_le_bytes());
    *rng.lock().await = Lcg64Xsh32::from_seed(seed_bytes);
    Json(Status {
        message: format!("seeded with {seed}"),
    })
}
