//! Team boost aggregation.
//!
//! Support-type team members grant percentage bonuses to the whole team.
//! Their magnitude is rolled from rank-gated ranges, so callers that need a
//! stable value across rendering and combat must roll once when the roster
//! snapshot is built and carry the result through the session. The only
//! intentional recomputation is the support-KO path in the duel resolver.

use rand::Rng;
use rand_pcg::Lcg64Xsh32;
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;
use std::collections::HashMap;

use crate::catalog::{split_stage, BoostHint, BoostMode, Catalog, CardType, Rank};
use crate::store::OwnedCard;

/// Aggregate percentage bonuses for one team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct TeamBoosts {
    pub atk: i64,
    pub hp: i64,
    pub special: i64,
}

impl TeamBoosts {
    pub fn add(&mut self, other: &TeamBoosts) {
        self.atk += other.atk;
        self.hp += other.hp;
        self.special += other.special;
    }
}

/// Where a card's contribution came from, for the UI breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum BoostSource {
    OwnerOverride,
    SupportRoll,
    Explicit,
    Inferred,
    None,
}

/// Per-card contribution to the team totals.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CardBoostDetail {
    pub card_id: String,
    pub boost: TeamBoosts,
    pub source: BoostSource,
}

/// Inclusive boost ranges for a rank, per mode.
struct BoostRanges {
    single: (i64, i64),
    both: (i64, i64),
    special: Option<(i64, i64)>,
}

fn ranges_for(rank: Rank) -> BoostRanges {
    match rank {
        Rank::C => BoostRanges {
            single: (1, 10),
            both: (1, 10),
            special: None,
        },
        Rank::B => BoostRanges {
            single: (1, 15),
            both: (1, 15),
            special: None,
        },
        Rank::A => BoostRanges {
            single: (1, 25),
            both: (1, 20),
            special: Some((1, 5)),
        },
        Rank::S => BoostRanges {
            single: (1, 40),
            both: (1, 30),
            special: Some((1, 8)),
        },
        Rank::SS => BoostRanges {
            single: (1, 75),
            both: (1, 50),
            special: Some((1, 15)),
        },
        // The event tier sits above the normal ladder and shares the UR row.
        Rank::UR | Rank::Z => BoostRanges {
            single: (1, 100),
            both: (1, 60),
            special: Some((1, 25)),
        },
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ModePick {
    Single,
    Both,
    Special,
}

/// Eligible modes for a rank, weighted by repetition.
fn mode_options(rank: Rank) -> Vec<ModePick> {
    match rank {
        Rank::C => vec![ModePick::Single],
        Rank::B => vec![ModePick::Single, ModePick::Single, ModePick::Both],
        Rank::A | Rank::S | Rank::SS => vec![
            ModePick::Single,
            ModePick::Single,
            ModePick::Both,
            ModePick::Special,
        ],
        Rank::UR | Rank::Z => vec![ModePick::Single, ModePick::Single, ModePick::Special],
    }
}

/// Roll a magnitude for a support card, trending toward the top of the
/// range for later evolution stages.
fn stage_weighted_roll(
    rng: &mut Lcg64Xsh32,
    (lo, hi): (i64, i64),
    stage: u32,
    max_stage: u32,
) -> i64 {
    let lower = if max_stage <= 1 {
        lo
    } else {
        let shifted =
            lo + ((hi - lo) as f64 * stage as f64 / max_stage as f64).round() as i64;
        shifted.min(hi)
    };
    rng.gen_range(lower..=hi)
}

/// Deterministic magnitude for authored `Inferred` boost descriptors.
fn inferred_value((lo, hi): (i64, i64), stage: u32, max_stage: u32) -> i64 {
    if max_stage <= 1 {
        ((lo + hi) as f64 / 2.0).round() as i64
    } else {
        let scaled =
            (lo as f64 + (hi - lo) as f64 * stage as f64 / max_stage as f64).round() as i64;
        hi.min(scaled + 1)
    }
}

fn support_roll(rng: &mut Lcg64Xsh32, rank: Rank, stage: u32, max_stage: u32) -> TeamBoosts {
    let ranges = ranges_for(rank);
    let options = mode_options(rank);
    let mode = options[rng.gen_range(0..options.len())];
    let mut boost = TeamBoosts::default();
    match mode {
        ModePick::Single => {
            let value = stage_weighted_roll(rng, ranges.single, stage, max_stage);
            if rng.gen_range(0..2) == 0 {
                boost.atk = value;
            } else {
                boost.hp = value;
            }
        }
        ModePick::Both => {
            let value = stage_weighted_roll(rng, ranges.both, stage, max_stage);
            boost.atk = value;
            boost.hp = value;
        }
        ModePick::Special => {
            if let Some(range) = ranges.special {
                boost.special = stage_weighted_roll(rng, range, stage, max_stage);
            }
        }
    }
    boost
}

fn inferred_boost(mode: BoostMode, rank: Rank, stage: u32, max_stage: u32) -> TeamBoosts {
    let ranges = ranges_for(rank);
    let mut boost = TeamBoosts::default();
    match mode {
        BoostMode::Attack => boost.atk = inferred_value(ranges.single, stage, max_stage),
        BoostMode::Health => boost.hp = inferred_value(ranges.single, stage, max_stage),
        BoostMode::Both => {
            let value = inferred_value(ranges.both, stage, max_stage);
            boost.atk = value;
            boost.hp = value;
        }
        BoostMode::Special => {
            if let Some(range) = ranges.special {
                boost.special = inferred_value(range, stage, max_stage);
            }
        }
    }
    boost
}

/// Per-card contribution, in priority order: owner override, support roll,
/// authored explicit descriptor, authored inferred descriptor, nothing.
fn card_contribution(
    rng: &mut Lcg64Xsh32,
    card_id: &str,
    owned: &HashMap<String, OwnedCard>,
    catalog: &Catalog,
) -> Result<CardBoostDetail, String> {
    let card = catalog
        .card(card_id)
        .ok_or_else(|| format!("Card {card_id} not found in catalog"))?;

    if let Some(over) = owned.get(card_id).and_then(|o| o.boost_override) {
        return Ok(CardBoostDetail {
            card_id: card_id.to_string(),
            boost: over,
            source: BoostSource::OwnerOverride,
        });
    }

    let (_, stage) = split_stage(card_id);
    let max_stage = catalog.max_stage(card_id);

    if card.card_type == CardType::Support {
        return Ok(CardBoostDetail {
            card_id: card_id.to_string(),
            boost: support_roll(rng, card.rank, stage, max_stage),
            source: BoostSource::SupportRoll,
        });
    }

    match card.boost {
        Some(BoostHint::Explicit { atk, hp, special }) => Ok(CardBoostDetail {
            card_id: card_id.to_string(),
            boost: TeamBoosts { atk, hp, special },
            source: BoostSource::Explicit,
        }),
        Some(BoostHint::Inferred { mode }) => Ok(CardBoostDetail {
            card_id: card_id.to_string(),
            boost: inferred_boost(mode, card.rank, stage, max_stage),
            source: BoostSource::Inferred,
        }),
        None => Ok(CardBoostDetail {
            card_id: card_id.to_string(),
            boost: TeamBoosts::default(),
            source: BoostSource::None,
        }),
    }
}

/// Detailed per-card breakdown of a team's boosts.
pub fn team_boosts_detailed<S: AsRef<str>>(
    rng: &mut Lcg64Xsh32,
    team: &[S],
    owned: &HashMap<String, OwnedCard>,
    catalog: &Catalog,
) -> Result<Vec<CardBoostDetail>, String> {
    team.iter()
        .map(|id| card_contribution(rng, id.as_ref(), owned, catalog))
        .collect()
}

/// Aggregate team totals. Contributions sum additively with no clamp; a
/// stacked support team can exceed +100%.
pub fn team_boosts<S: AsRef<str>>(
    rng: &mut Lcg64Xsh32,
    team: &[S],
    owned: &HashMap<String, OwnedCard>,
    catalog: &Catalog,
) -> Result<TeamBoosts, String> {
    let mut total = TeamBoosts::default();
    for detail in team_boosts_detailed(rng, team, owned, catalog)? {
        total.add(&detail.boost);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample::sample_catalog;
    use rand::SeedableRng;

    fn rng() -> Lcg64Xsh32 {
        Lcg64Xsh32::from_seed([7u8; 16])
    }

    #[test]
    fn empty_team_has_zero_boosts() {
        let catalog = sample_catalog();
        let owned = HashMap::new();
        let total = team_boosts::<&str>(&mut rng(), &[], &owned, &catalog).unwrap();
        assert_eq!(total, TeamBoosts::default());
    }

    #[test]
    fn support_roll_stays_inside_rank_range() {
        let mut rng = rng();
        for _ in 0..200 {
            let boost = support_roll(&mut rng, Rank::A, 1, 2);
            assert!(boost.atk <= 25 && boost.hp <= 25 && boost.special <= 5);
            assert!(boost.atk >= 0 && boost.hp >= 0 && boost.special >= 0);
            // Exactly one mode per roll; Both sets atk and hp to the same value.
            if boost.atk > 0 && boost.hp > 0 {
                assert_eq!(boost.atk, boost.hp);
                assert!(boost.atk <= 20);
            }
        }
    }

    #[test]
    fn rank_c_only_rolls_single_stats() {
        let mut rng = rng();
        for _ in 0..100 {
            let boost = support_roll(&mut rng, Rank::C, 1, 1);
            assert_eq!(boost.special, 0);
            assert!(boost.atk == 0 || boost.hp == 0);
            assert!(boost.atk + boost.hp >= 1 && boost.atk + boost.hp <= 10);
        }
    }

    #[test]
    fn inferred_value_midpoint_and_stage_ramp() {
        // Single-stage lines use the range midpoint.
        assert_eq!(inferred_value((1, 20), 1, 1), 11);
        // Multi-stage lines ramp with stage, capped at the range max.
        assert_eq!(inferred_value((1, 20), 1, 2), 12);
        assert_eq!(inferred_value((1, 20), 2, 2), 20);
    }

    #[test]
    fn owner_override_wins_even_for_supports() {
        let catalog = sample_catalog();
        let mut owned = HashMap::new();
        owned.insert(
            "cleric1".to_string(),
            OwnedCard {
                count: 1,
                xp: 0,
                level: 3,
                boost_override: Some(TeamBoosts {
                    atk: 20,
                    hp: 10,
                    special: 0,
                }),
            },
        );
        let details =
            team_boosts_detailed(&mut rng(), &["cleric1"], &owned, &catalog).unwrap();
        assert_eq!(details[0].source, BoostSource::OwnerOverride);
        assert_eq!(details[0].boost.atk, 20);
        assert_eq!(details[0].boost.hp, 10);
    }

    #[test]
    fn explicit_hint_is_used_verbatim() {
        let catalog = sample_catalog();
        let owned = HashMap::new();
        let details =
            team_boosts_detailed(&mut rng(), &["tactician1"], &owned, &catalog).unwrap();
        assert_eq!(details[0].source, BoostSource::Explicit);
        assert_eq!(
            details[0].boost,
            TeamBoosts {
                atk: 5,
                hp: 5,
                special: 0
            }
        );
    }

    #[test]
    fn unknown_card_is_an_error() {
        let catalog = sample_catalog();
        let owned = HashMap::new();
        assert!(team_boosts(&mut rng(), &["missing1"], &owned, &catalog).is_err());
    }
}
