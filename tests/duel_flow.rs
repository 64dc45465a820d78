//! End-to-end duel: challenge, accept, prompt-driven turn loop, settlement.

use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use serde_json::{json, Value};

fn client() -> Client {
    Client::tracked(duel_engine::rocket_initialize()).expect("valid rocket instance")
}

fn seed_player(client: &Client, record: Value) {
    let response = client
        .post("/tests/players")
        .header(ContentType::JSON)
        .body(record.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Created);
}

fn squire_record(user_id: &str, player_level: u32) -> Value {
    json!({
        "user_id": user_id,
        "cards": {"squire1": {"count": 1, "xp": 0, "level": 0, "boost_override": null}},
        "weapons": {},
        "team": ["squire1"],
        "level": player_level,
        "xp": 0,
        "bot": false
    })
}

fn interact(client: &Client, actor: &str, custom_id: &str) -> Value {
    let response = client
        .post("/interaction")
        .header(ContentType::JSON)
        .body(json!({"actor_id": actor, "custom_id": custom_id}).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    serde_json::from_str(&response.into_string().expect("response body")).expect("valid json")
}

fn challenge(client: &Client, challenger: &str, opponent: &str) -> (Status, Value) {
    let response = client
        .post("/duel")
        .header(ContentType::JSON)
        .body(json!({"challenger_id": challenger, "opponent_id": opponent, "channel": "arena"}).to_string())
        .dispatch();
    let status = response.status();
    let body = response.into_string().unwrap_or_default();
    let value = serde_json::from_str(&body).unwrap_or(Value::Null);
    (status, value)
}

/// The side currently defending, given the acting user id.
fn defender<'a>(view: &'a Value, acting: &str) -> &'a Value {
    if view["challenger"]["user_id"].as_str() == Some(acting) {
        &view["opponent"]
    } else {
        &view["challenger"]
    }
}

#[test]
fn full_duel_runs_to_settlement_with_bounded_damage() {
    let client = client();
    seed_player(&client, squire_record("alice", 5));
    seed_player(&client, squire_record("bob", 7));

    let response = client
        .post("/tests/seed")
        .header(ContentType::JSON)
        .body(json!({"seed": 42u64}).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let (status, invite) = challenge(&client, "alice", "bob");
    assert_eq!(status, Status::Created);
    assert_eq!(invite["accept_custom_id"], "duel_accept:alice");
    assert_eq!(invite["decline_custom_id"], "duel_decline:alice");

    let accepted = interact(&client, "bob", "duel_accept:alice");
    assert_eq!(accepted["acknowledged"], true);
    let mut view = accepted["view"].clone();

    // Equal strongest power on both sides: the challenger moves first.
    assert_eq!(view["acting_user_id"], "alice");
    let unit = &view["challenger"]["units"][0];
    assert_eq!(unit["power"], 20);
    assert_eq!(unit["max_health"], 70);
    assert_eq!(unit["attack_range"]["min"], 5);
    assert_eq!(unit["attack_range"]["max"], 10);

    let session_id = view["session_id"].as_str().expect("session id").to_string();
    let live = client.get(format!("/duel/{session_id}")).dispatch();
    assert_eq!(live.status(), Status::Ok);

    let mut settlement = Value::Null;
    for _ in 0..400 {
        let actor = view["acting_user_id"].as_str().expect("actor").to_string();
        let prompt = view["prompt"].clone();
        let custom_id = match prompt["prompt_type"].as_str().expect("prompt type") {
            "SelectCharacter" => {
                format!("duel_selectchar:{session_id}:{}", prompt["options"][0])
            }
            "SelectAttackType" => {
                format!("duel_attack:{session_id}:{}:normal", prompt["attacker"])
            }
            "SelectTarget" => format!(
                "duel_target:{session_id}:{}:normal:{}",
                prompt["attacker"], prompt["options"][0]
            ),
            other => panic!("unexpected prompt {other}"),
        };

        let target_health_before = if prompt["prompt_type"] == "SelectTarget" {
            let idx = prompt["options"][0].as_u64().expect("target index") as usize;
            Some((
                idx,
                defender(&view, &actor)["units"][idx]["current_health"]
                    .as_i64()
                    .expect("health"),
            ))
        } else {
            None
        };

        let response = interact(&client, &actor, &custom_id);
        assert_eq!(response["acknowledged"], true, "rejected: {response}");

        let next_view = response["view"].clone();
        if let (Some((idx, before)), false) = (target_health_before, next_view.is_null()) {
            let after = defender(&next_view, &actor)["units"][idx]["current_health"]
                .as_i64()
                .expect("health");
            let damage = before - after;
            assert!(
                damage == 0 || (5..=10).contains(&damage),
                "damage {damage} outside the squire's scaled range"
            );
        }

        if !response["settlement"].is_null() {
            settlement = response["settlement"].clone();
            break;
        }
        view = next_view;
        assert!(!view.is_null(), "live turn without a view: {response}");
    }

    let winner = settlement["winner_id"].as_str().expect("settled duel");
    let loser = settlement["loser_id"].as_str().expect("loser");
    let loser_level = settlement["loser_level"].as_u64().expect("loser level");
    assert_eq!(
        loser_level,
        if loser == "alice" { 5 } else { 7 }
    );
    assert_eq!(settlement["bounty"], loser_level * 100);
    assert_eq!(settlement["xp_gained"], (loser_level * 10).min(100));
    assert_eq!(settlement["persisted"], true);

    // The session is gone once settled.
    let finished = client.get(format!("/duel/{session_id}")).dispatch();
    assert_eq!(finished.status(), Status::NotFound);

    // Persisted rewards are visible through the read endpoints.
    let balance = client.get(format!("/player/{winner}/balance")).dispatch();
    assert_eq!(balance.status(), Status::Ok);
    let balance: Value =
        serde_json::from_str(&balance.into_string().expect("body")).expect("valid json");
    assert_eq!(balance["currency"], settlement["bounty"]);
    assert_eq!(balance["duel_xp_today"], settlement["xp_gained"]);
    assert_eq!(balance["duel_opponents_today"][loser], 1);

    let progress = client.get(format!("/player/{winner}/progress")).dispatch();
    let progress: Value =
        serde_json::from_str(&progress.into_string().expect("body")).expect("valid json");
    assert_eq!(progress["xp"], settlement["xp_gained"]);

    // Both participants got a quest notification.
    let log = client.get("/actions/log?action=duel").dispatch();
    let log: Value = serde_json::from_str(&log.into_string().expect("body")).expect("valid json");
    let users: Vec<&str> = log["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|e| e["user_id"].as_str())
        .collect();
    assert!(users.contains(&"alice") && users.contains(&"bob"));
}

#[test]
fn forfeit_settles_as_a_loss() {
    let client = client();
    seed_player(&client, squire_record("alice", 3));
    seed_player(&client, squire_record("bob", 4));

    let (status, _) = challenge(&client, "alice", "bob");
    assert_eq!(status, Status::Created);
    let accepted = interact(&client, "bob", "duel_accept:alice");
    let session_id = accepted["view"]["session_id"]
        .as_str()
        .expect("session id")
        .to_string();

    let response = interact(&client, "alice", &format!("duel_forfeit:{session_id}"));
    assert_eq!(response["acknowledged"], true);
    let settlement = &response["settlement"];
    assert_eq!(settlement["winner_id"], "bob");
    assert_eq!(settlement["loser_id"], "alice");
    assert_eq!(settlement["loser_level"], 3);
    assert_eq!(settlement["bounty"], 300);
    assert_eq!(settlement["xp_gained"], 30);

    // A settled pair can duel again right away (three per day).
    let (status, _) = challenge(&client, "alice", "bob");
    assert_eq!(status, Status::Created);
}

#[test]
fn catalog_endpoints_serve_the_seeded_definitions() {
    let client = client();
    let cards = client.get("/catalog/cards").dispatch();
    assert_eq!(cards.status(), Status::Ok);
    let body = cards.into_string().expect("body");
    assert!(body.contains("squire1") && body.contains("knight3"));

    let weapons = client.get("/catalog/weapons").dispatch();
    assert_eq!(weapons.status(), Status::Ok);
    assert!(weapons.into_string().expect("body").contains("oathblade"));
}
