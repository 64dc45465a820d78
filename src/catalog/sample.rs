//! Seeded sample catalog used by the default server and the test suites.

use super::types::{
    BoostHint, BoostMode, CardDefinition, CardType, Rank, SpecialAttack, StatRange, WeaponBoost,
    WeaponDefinition,
};
use super::Catalog;

fn attack_card(
    id: &str,
    name: &str,
    rank: Rank,
    power: i64,
    health: i64,
    range: (i64, i64),
) -> CardDefinition {
    CardDefinition {
        id: id.to_string(),
        name: name.to_string(),
        rank,
        card_type: CardType::Attack,
        power,
        health,
        attack_range: StatRange::new(range.0, range.1),
        special: None,
        boost: None,
        signature_weapon: None,
        evolutions: Vec::new(),
    }
}

fn support_card(
    id: &str,
    name: &str,
    rank: Rank,
    power: i64,
    health: i64,
    range: (i64, i64),
) -> CardDefinition {
    CardDefinition {
        card_type: CardType::Support,
        ..attack_card(id, name, rank, power, health, range)
    }
}

pub fn sample_catalog() -> Catalog {
    let mut cards = vec![
        // Base C-rank attacker, the reference entry for balance checks.
        attack_card("squire1", "Squire", Rank::C, 20, 70, (3, 9)),
        attack_card("squire2", "Veteran Squire", Rank::C, 35, 90, (5, 12)),
        support_card("herald1", "Herald", Rank::B, 10, 60, (1, 4)),
        support_card("cleric1", "Cleric", Rank::A, 15, 40, (2, 6)),
        support_card("cleric2", "High Cleric", Rank::A, 25, 65, (4, 9)),
        support_card("warlord1", "Warlord", Rank::UR, 90, 220, (15, 30)),
    ];

    cards[0].evolutions = vec!["squire2".to_string()];
    cards[3].evolutions = vec!["cleric2".to_string()];

    // Knight line carries the oathblade as its signature weapon.
    let mut knight1 = attack_card("knight1", "Knight", Rank::S, 60, 160, (10, 22));
    knight1.signature_weapon = Some("oathblade".to_string());
    knight1.evolutions = vec!["knight2".to_string(), "knight3".to_string()];
    knight1.special = Some(SpecialAttack {
        name: "Crescent Sweep".to_string(),
        range: StatRange::new(24, 40),
        cooldown: 1,
        visual: None,
    });
    let mut knight2 = attack_card("knight2", "Knight Captain", Rank::S, 80, 200, (14, 28));
    knight2.signature_weapon = Some("oathblade".to_string());
    knight2.evolutions = vec!["knight3".to_string()];
    knight2.special = Some(SpecialAttack {
        name: "Crescent Sweep".to_string(),
        range: StatRange::new(30, 50),
        cooldown: 1,
        visual: None,
    });
    let mut knight3 = attack_card("knight3", "Knight Commander", Rank::SS, 100, 250, (18, 34));
    knight3.signature_weapon = Some("oathblade".to_string());
    knight3.special = Some(SpecialAttack {
        name: "Oath Unbound".to_string(),
        range: StatRange::new(40, 65),
        cooldown: 1,
        visual: Some("oath-unbound.gif".to_string()),
    });

    let mut archmage1 = attack_card("archmage1", "Archmage", Rank::SS, 85, 140, (12, 26));
    archmage1.special = Some(SpecialAttack {
        name: "Starfall".to_string(),
        range: StatRange::new(30, 55),
        cooldown: 1,
        visual: Some("starfall.gif".to_string()),
    });

    // Banner card: non-Support boost carrier with an authored descriptor.
    let mut bannerman1 = attack_card("bannerman1", "Bannerman", Rank::A, 30, 110, (5, 12));
    bannerman1.card_type = CardType::Banner;
    bannerman1.boost = Some(BoostHint::Inferred {
        mode: BoostMode::Both,
    });

    // Attack card with a fixed authored boost, used verbatim.
    let mut tactician1 = attack_card("tactician1", "Tactician", Rank::B, 25, 85, (4, 10));
    tactician1.boost = Some(BoostHint::Explicit {
        atk: 5,
        hp: 5,
        special: 0,
    });

    cards.extend([
        knight1, knight2, knight3, archmage1, bannerman1, tactician1,
    ]);

    let weapons = vec![WeaponDefinition {
        id: "oathblade".to_string(),
        name: "Oathblade".to_string(),
        boost: WeaponBoost { atk: 40, hp: 0 },
        signature_cards: vec![
            "knight1".to_string(),
            "knight2".to_string(),
            "knight3".to_string(),
        ],
    }];

    Catalog::new(cards, weapons)
}
