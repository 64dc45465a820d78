//! Pure combat stat derivation.
//!
//! `scale_unit` turns a catalog card plus the owner's level entry, equipped
//! weapon, and team-wide boosts into a mutable `CombatUnit` snapshot. The
//! pipeline order is fixed: level multiplier, signature weapon bonus,
//! team percentage boosts, then normalization to multiples of five.

use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

use crate::boosts::TeamBoosts;
use crate::catalog::{CardDefinition, CardType, StatRange, WeaponDefinition};

/// Round to the nearest multiple of 5, half up. Gameplay-balance
/// normalization applied to every final combat stat.
pub fn round_nearest_five(x: i64) -> i64 {
    ((x as f64) / 5.0).round() as i64 * 5
}

fn round_range_to_five(range: StatRange) -> StatRange {
    StatRange::new(round_nearest_five(range.min), round_nearest_five(range.max))
}

/// Live state of a unit's special attack within one duel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct SpecialState {
    pub name: String,
    pub range: StatRange,
    /// Specials are single-use per match.
    pub used: bool,
}

/// Derived, mutable per-duel snapshot of one team member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CombatUnit {
    pub card_id: String,
    pub name: String,
    pub card_type: CardType,
    pub level: u32,
    pub power: i64,
    pub attack_range: StatRange,
    pub special: Option<SpecialState>,
    pub current_health: i64,
    pub max_health: i64,
    pub exhausted_this_turn: bool,
    pub exhausted_pending_next_turn: bool,
}

impl CombatUnit {
    pub fn alive(&self) -> bool {
        self.current_health > 0
    }

    pub fn special_available(&self) -> bool {
        self.special.as_ref().is_some_and(|s| !s.used)
    }
}

fn scale_round(value: i64, factor: f64) -> i64 {
    (value as f64 * factor).round() as i64
}

/// Derive a unit's combat stats. Pure given its inputs.
///
/// `weapon` is the at-most-one owned weapon equipped to this card, with its
/// weapon level; it only applies when the card declares it as its
/// signature weapon.
pub fn scale_unit(
    card: &CardDefinition,
    level: u32,
    weapon: Option<(&WeaponDefinition, u32)>,
    boosts: &TeamBoosts,
) -> CombatUnit {
    let level_mult = 1.0 + f64::from(level) * 0.01;

    let mut power = scale_round(card.power, level_mult);
    let mut health = scale_round(card.health, level_mult);
    let mut range = StatRange::new(
        scale_round(card.attack_range.min, level_mult),
        scale_round(card.attack_range.max, level_mult),
    );
    let mut special_range = card.special.as_ref().map(|s| {
        StatRange::new(
            scale_round(s.range.min, level_mult),
            scale_round(s.range.max, level_mult),
        )
    });

    if let Some((weapon, weapon_level)) = weapon {
        if card.signature_weapon.as_deref() == Some(weapon.id.as_str()) {
            let level_boost = f64::from(weapon_level.saturating_sub(1)) * 0.01;
            let non_base_form = weapon
                .signature_cards
                .iter()
                .position(|id| *id == card.id)
                .is_some_and(|idx| idx > 0);
            let sig_boost = if non_base_form { 0.25 } else { 0.0 };
            let total = 1.0 + level_boost + sig_boost;
            let atk_add = scale_round(weapon.boost.atk, total);
            let hp_add = scale_round(weapon.boost.hp, total);
            power += atk_add;
            range.min += atk_add;
            range.max += atk_add;
            health += hp_add;
        }
    }

    let atk_factor = 1.0 + boosts.atk as f64 / 100.0;
    let hp_factor = 1.0 + boosts.hp as f64 / 100.0;
    let special_factor = 1.0 + boosts.special as f64 / 100.0;

    power = round_nearest_five(scale_round(power, atk_factor));
    range = round_range_to_five(StatRange::new(
        scale_round(range.min, atk_factor),
        scale_round(range.max, atk_factor),
    ));
    health = round_nearest_five(scale_round(health, hp_factor));
    if let Some(sr) = special_range {
        special_range = Some(round_range_to_five(StatRange::new(
            scale_round(sr.min, special_factor),
            scale_round(sr.max, special_factor),
        )));
    }

    CombatUnit {
        card_id: card.id.clone(),
        name: card.name.clone(),
        card_type: card.card_type,
        level,
        power,
        attack_range: range,
        special: card.special.as_ref().zip(special_range).map(|(s, range)| {
            SpecialState {
                name: s.name.clone(),
                range,
                used: false,
            }
        }),
        current_health: health,
        max_health: health,
        exhausted_this_turn: false,
        exhausted_pending_next_turn: false,
    }
}
