//! Static card and weapon catalog.
//!
//! The catalog is immutable after boot; everything the duel engine knows
//! about base stats comes from here.

pub mod sample;
pub mod types;

use rocket::serde::json::Json;
use rocket_okapi::openapi;

pub use types::{
    BoostHint, BoostMode, CardDefinition, CardType, Rank, SpecialAttack, StatRange, WeaponBoost,
    WeaponDefinition,
};

#[derive(Debug, Clone)]
pub struct Catalog {
    pub cards: Vec<CardDefinition>,
    pub weapons: Vec<WeaponDefinition>,
}

impl Catalog {
    pub fn new(cards: Vec<CardDefinition>, weapons: Vec<WeaponDefinition>) -> Self {
        Catalog { cards, weapons }
    }

    pub fn card(&self, id: &str) -> Option<&CardDefinition> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn weapon(&self, id: &str) -> Option<&WeaponDefinition> {
        self.weapons.iter().find(|w| w.id == id)
    }

    /// Highest evolution stage sharing this card id's alphabetic prefix.
    pub fn max_stage(&self, id: &str) -> u32 {
        let (prefix, _) = split_stage(id);
        self.cards
            .iter()
            .filter(|c| split_stage(&c.id).0 == prefix)
            .map(|c| split_stage(&c.id).1)
            .max()
            .unwrap_or(1)
    }
}

/// Split a card id into its alphabetic prefix and numeric stage suffix.
/// Ids without a numeric suffix are stage 1.
pub fn split_stage(id: &str) -> (&str, u32) {
    let digits = id.chars().rev().take_while(char::is_ascii_digit).count();
    let (prefix, suffix) = id.split_at(id.len() - digits);
    (prefix, suffix.parse().unwrap_or(1))
}

/// All card definitions in the catalog.
#[openapi]
#[get("/catalog/cards")]
pub async fn list_catalog_cards(
    catalog: &rocket::State<Catalog>,
) -> Json<Vec<CardDefinition>> {
    Json(catalog.cards.clone())
}

/// All weapon definitions in the catalog.
#[openapi]
#[get("/catalog/weapons")]
pub async fn list_catalog_weapons(
    catalog: &rocket::State<Catalog>,
) -> Json<Vec<WeaponDefinition>> {
    Json(catalog.weapons.clone())
}
