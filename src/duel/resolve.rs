//! Attack resolution and the support-KO boost recalculation.

use rand::Rng;
use rand_pcg::Lcg64Xsh32;
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::boosts::team_boosts;
use crate::catalog::{Catalog, CardType, StatRange};
use crate::stats::round_nearest_five;

use super::session::{AttackKind, DuelSession, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "outcome_type")]
pub enum AttackOutcome {
    Missed,
    Hit { damage: i64, special: bool },
}

/// Everything the presentation layer needs to narrate one resolution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ResolutionReport {
    pub attacker_card_id: String,
    pub target_card_id: String,
    pub outcome: AttackOutcome,
    pub target_defeated: bool,
    /// Units killed by the boost recalculation after a support KO.
    pub cascade_casualties: Vec<String>,
    pub winner: Option<Side>,
}

const MISS_CHANCE_PERCENT: i64 = 5;

fn roll_inclusive(rng: &mut Lcg64Xsh32, range: StatRange) -> i64 {
    if range.min >= range.max {
        range.min
    } else {
        rng.gen_range(range.min..=range.max)
    }
}

fn rescale(value: i64, ratio: f64) -> i64 {
    round_nearest_five((value as f64 * ratio).round() as i64)
}

/// Resolve one attack by the acting side. Callers must have validated the
/// selections (alive, not exhausted, special unused); the guards here only
/// prevent half-mutated state on malformed input.
pub fn resolve_attack(
    session: &mut DuelSession,
    attacker_idx: usize,
    kind: AttackKind,
    target_idx: usize,
    rng: &mut Lcg64Xsh32,
    catalog: &Catalog,
) -> Result<ResolutionReport, String> {
    let acting_side = session.current_turn;
    let (acting, defending) = session.sides_mut(acting_side);

    // Validate both ends before mutating anything.
    {
        let attacker = acting
            .units
            .get(attacker_idx)
            .ok_or("No such attacking unit")?;
        if !attacker.alive() {
            return Err("Attacking unit is defeated".to_string());
        }
        if attacker.exhausted_this_turn {
            return Err("Attacking unit is exhausted".to_string());
        }
        let target = defending.units.get(target_idx).ok_or("No such target")?;
        if !target.alive() {
            return Err("Target is already defeated".to_string());
        }
    }

    let attacker = &mut acting.units[attacker_idx];
    let attacker_card_id = attacker.card_id.clone();
    let outcome = match kind {
        AttackKind::Normal => {
            if rng.gen_range(0..100) < MISS_CHANCE_PERCENT {
                AttackOutcome::Missed
            } else {
                AttackOutcome::Hit {
                    damage: roll_inclusive(rng, attacker.attack_range),
                    special: false,
                }
            }
        }
        AttackKind::Special => match attacker.special.as_mut() {
            Some(special) if !special.used => {
                let damage = roll_inclusive(rng, special.range);
                special.used = true;
                attacker.exhausted_pending_next_turn = true;
                AttackOutcome::Hit {
                    damage,
                    special: true,
                }
            }
            // No resolvable special: degrade to a guaranteed normal roll
            // without consuming the special flag.
            _ => AttackOutcome::Hit {
                damage: roll_inclusive(rng, attacker.attack_range),
                special: false,
            },
        },
    };

    let damage = match outcome {
        AttackOutcome::Missed => 0,
        AttackOutcome::Hit { damage, .. } => damage,
    };
    let target = &mut defending.units[target_idx];
    target.current_health = (target.current_health - damage).max(0);
    let target_card_id = target.card_id.clone();
    let target_defeated = !target.alive();
    let support_down = target_defeated && target.card_type == CardType::Support;

    let mut cascade_casualties = Vec::new();
    if support_down {
        let alive_ids: Vec<String> = defending
            .units
            .iter()
            .filter(|u| u.alive())
            .map(|u| u.card_id.clone())
            .collect();
        let new_boosts = team_boosts(rng, &alive_ids, &defending.owned, catalog)?;
        let old = defending.boosts;
        let atk_ratio = (100 + new_boosts.atk) as f64 / (100 + old.atk) as f64;
        let hp_ratio = (100 + new_boosts.hp) as f64 / (100 + old.hp) as f64;
        let special_ratio = (100 + new_boosts.special) as f64 / (100 + old.special) as f64;

        // Rescale living units by the ratio of boost factors, preserving the
        // relative stat spread. A shrinking health cap can itself kill; that
        // snowball is intentional when the buffer falls.
        for unit in defending.units.iter_mut().filter(|u| u.alive()) {
            unit.power = rescale(unit.power, atk_ratio);
            unit.attack_range = StatRange::new(
                rescale(unit.attack_range.min, atk_ratio),
                rescale(unit.attack_range.max, atk_ratio),
            );
            if let Some(special) = unit.special.as_mut() {
                special.range = StatRange::new(
                    rescale(special.range.min, special_ratio),
                    rescale(special.range.max, special_ratio),
                );
            }
            unit.max_health = rescale(unit.max_health, hp_ratio);
            unit.current_health = unit.current_health.min(unit.max_health);
            if !unit.alive() {
                cascade_casualties.push(unit.card_id.clone());
            }
        }
        defending.boosts = new_boosts;
    }

    let winner = if defending.defeated() {
        Some(acting_side)
    } else {
        None
    };

    Ok(ResolutionReport {
        attacker_card_id,
        target_card_id,
        outcome,
        target_defeated,
        cascade_casualties,
        winner,
    })
}
