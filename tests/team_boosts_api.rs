//! Team boost breakdown endpoint.

use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use serde_json::{json, Value};

fn client() -> Client {
    Client::tracked(duel_engine::rocket_initialize()).expect("valid rocket instance")
}

#[test]
fn breakdown_reports_each_contribution_source() {
    let client = client();
    let record = json!({
        "user_id": "alice",
        "cards": {
            "squire1": {"count": 1, "xp": 0, "level": 0,
                        "boost_override": {"atk": 7, "hp": 3, "special": 0}},
            "tactician1": {"count": 1, "xp": 0, "level": 0, "boost_override": null},
            "bannerman1": {"count": 1, "xp": 0, "level": 0, "boost_override": null}
        },
        "weapons": {},
        "team": ["squire1", "tactician1", "bannerman1"],
        "level": 1,
        "xp": 0,
        "bot": false
    });
    let response = client
        .post("/tests/players")
        .header(ContentType::JSON)
        .body(record.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Created);

    let response = client.get("/team/alice/boosts").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let breakdown: Value =
        serde_json::from_str(&response.into_string().expect("body")).expect("valid json");

    let per_card = breakdown["per_card"].as_array().expect("per_card");
    assert_eq!(per_card.len(), 3);

    // Owner override wins over everything and is used verbatim.
    assert_eq!(per_card[0]["source"], "OwnerOverride");
    assert_eq!(per_card[0]["boost"], json!({"atk": 7, "hp": 3, "special": 0}));
    // Authored explicit descriptor, verbatim.
    assert_eq!(per_card[1]["source"], "Explicit");
    assert_eq!(per_card[1]["boost"], json!({"atk": 5, "hp": 5, "special": 0}));
    // Single-stage inferred Both descriptor on an A-rank card: midpoint of
    // the shared range, applied to both stats.
    assert_eq!(per_card[2]["source"], "Inferred");
    assert_eq!(per_card[2]["boost"], json!({"atk": 11, "hp": 11, "special": 0}));

    assert_eq!(breakdown["total"], json!({"atk": 23, "hp": 19, "special": 0}));
}

#[test]
fn breakdown_rejects_unknown_players_and_cards() {
    let client = client();
    let response = client.get("/team/ghost/boosts").dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let record = json!({
        "user_id": "bob",
        "cards": {},
        "weapons": {},
        "team": ["missing1"],
        "level": 1,
        "xp": 0,
        "bot": false
    });
    let seeded = client
        .post("/tests/players")
        .header(ContentType::JSON)
        .body(record.to_string())
        .dispatch();
    assert_eq!(seeded.status(), Status::Created);
    let response = client.get("/team/bob/boosts").dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}
