use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::JsonSchema;

/// Card rarity tier. Gates stat ranges and team boost magnitudes.
/// `Z` is the event tier that sits outside the normal ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum Rank {
    C,
    B,
    A,
    S,
    SS,
    UR,
    Z,
}

/// Role of a card when placed in a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum CardType {
    Attack,
    Support,
    Weapon,
    Banner,
}

/// Inclusive integer damage/stat range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct StatRange {
    pub min: i64,
    pub max: i64,
}

impl StatRange {
    pub fn new(min: i64, max: i64) -> Self {
        StatRange { min, max }
    }
}

/// A card's once-per-match special attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct SpecialAttack {
    pub name: String,
    pub range: StatRange,
    /// Uses before the move needs to recharge. Display data only; the duel
    /// engine restricts specials to one use per match regardless.
    pub cooldown: u32,
    pub visual: Option<String>,
}

/// Which stats a boost-granting card raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub enum BoostMode {
    Attack,
    Health,
    Both,
    Special,
}

/// Structured boost descriptor, decided at data-authoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", tag = "hint_type")]
pub enum BoostHint {
    /// Fixed percentages, used verbatim.
    Explicit { atk: i64, hp: i64, special: i64 },
    /// Magnitude derived from the card's rank and evolution stage.
    Inferred { mode: BoostMode },
}

/// Immutable card entry from the static catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CardDefinition {
    pub id: String,
    pub name: String,
    pub rank: Rank,
    pub card_type: CardType,
    pub power: i64,
    pub health: i64,
    pub attack_range: StatRange,
    pub special: Option<SpecialAttack>,
    pub boost: Option<BoostHint>,
    pub signature_weapon: Option<String>,
    /// Ordered upgrade chain; the ids this card can evolve into.
    pub evolutions: Vec<String>,
}

/// Flat stat bonus a weapon grants when equipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct WeaponBoost {
    pub atk: i64,
    pub hp: i64,
}

/// Immutable weapon entry from the static catalog.
/// A weapon may only be equipped to cards in its `signature_cards` list;
/// cards at index > 0 (non-base forms) receive a +25% boost multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct WeaponDefinition {
    pub id: String,
    pub name: String,
    pub boost: WeaponBoost,
    pub signature_cards: Vec<String>,
}
