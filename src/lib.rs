//! # Duel Engine
//!
//! Turn-based duel backend for a collectible-card chat game.
//!
//! ## Overview
//!
//! Players challenge each other with teams of up to three leveled cards.
//! Combat stats are scaled from catalog bases by level, signature weapons and
//! team boosts, then a strict prompt-driven turn loop (pick character, pick
//! attack type, pick target) plays out until one side's team is defeated.
//! The winner is paid XP and a bounty from the loser's level.
//!
//! ## Architecture
//!
//! The API is built using the Rocket web framework with OpenAPI documentation
//! support. Live duel sessions, player records and the shared RNG are managed
//! through thread-safe `Arc<Mutex<T>>` wrappers to allow concurrent access
//! from multiple HTTP requests; prompt deadlines run as spawned tokio tasks
//! guarded by a per-session step sequence.

// Rocket makes this a bit tricky to support
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate rocket;

use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{make_swagger_ui, SwaggerUIConfig};

pub mod boosts;
pub mod catalog;
pub mod duel;
pub mod stats;
pub mod status_messages;
pub mod store;
pub mod telemetry;

/// Shared deterministic generator; tests reseed it through `/tests/seed`.
pub type SharedRng = std::sync::Arc<rocket::futures::lock::Mutex<rand_pcg::Lcg64Xsh32>>;

/// Initializes and configures the Rocket web server with all routes and OpenAPI documentation.
///
/// # Returns
///
/// A configured Rocket instance ready to be launched.
///
/// # Example
///
/// ```no_run
/// use duel_engine::rocket_initialize;
///
/// #[rocket::main]
/// async fn main() {
///     rocket_initialize().launch().await.expect("Failed to launch rocket");
/// }
/// ```
pub fn rocket_initialize() -> rocket::Rocket<rocket::Build> {
    use crate::catalog::okapi_add_operation_for_list_catalog_cards_;
    use crate::catalog::okapi_add_operation_for_list_catalog_weapons_;
    use crate::catalog::{list_catalog_cards, list_catalog_weapons};
    use crate::duel::okapi_add_operation_for_get_duel_;
    use crate::duel::okapi_add_operation_for_get_team_boosts_;
    use crate::duel::okapi_add_operation_for_handle_interaction_;
    use crate::duel::okapi_add_operation_for_reseed_rng_;
    use crate::duel::okapi_add_operation_for_start_duel_;
    use crate::duel::{get_duel, get_team_boosts, handle_interaction, reseed_rng, start_duel};
    use crate::store::okapi_add_operation_for_get_player_balance_;
    use crate::store::okapi_add_operation_for_get_player_progress_;
    use crate::store::okapi_add_operation_for_seed_test_player_;
    use crate::store::{get_player_balance, get_player_progress, seed_test_player};
    use crate::telemetry::list_actions_log;
    use crate::telemetry::okapi_add_operation_for_list_actions_log_;

    #[allow(clippy::no_effect_underscore_binding)]
    let _ = env_logger::try_init();

    use rand::SeedableRng;

    let registry: duel::session::SharedRegistry = std::sync::Arc::new(
        rocket::futures::lock::Mutex::new(duel::session::DuelRegistry::new()),
    );
    let rng: SharedRng = std::sync::Arc::new(rocket::futures::lock::Mutex::new(
        rand_pcg::Lcg64Xsh32::from_entropy(),
    ));
    let recorder = std::sync::Arc::new(telemetry::ActionRecorder::new());

    rocket::build()
        .mount(
            "/",
            openapi_get_routes![
                start_duel,
                handle_interaction,
                get_duel,
                get_team_boosts,
                list_catalog_cards,
                list_catalog_weapons,
                get_player_progress,
                get_player_balance,
                list_actions_log,
                seed_test_player,
                reseed_rng
            ],
        )
        .mount("/swagger", make_swagger_ui(&get_docs()))
        .manage(catalog::sample::sample_catalog())
        .manage(store::DocumentStore::new())
        .manage(registry)
        .manage(rng)
        .manage(recorder)
}

fn get_docs() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/openapi.json".to_string(),
        ..Default::default()
    }
}
