use sqlx::sqlite::SqlitePoolOptions;

use crate::{
    db,
    models::{NewProposal, User},
    AppState,
};

pub const PASSWORD: &str = "senha-segura-123";

/// Fresh in-memory database with migrations applied. One connection, so every
/// query sees the same memory database.
pub async fn memory_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("memory database");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    AppState::new(pool, false)
}

pub async fn seed_user(state: &AppState, email: &str) -> User {
    db::create_user(
        state,
        "Ana Lima".to_owned(),
        email.to_owned(),
        PASSWORD,
        None,
        Some("(11) 99999-0000".to_owned()),
    )
    .await
    .expect("seed user")
}

pub fn sample_proposal(number: &str) -> NewProposal {
    NewProposal {
        number: number.to_owned(),
        client_name: Some("Carlos".to_owned()),
        client_phone: None,
        service_type: Some("Avaliação Psicológica".to_owned()),
        base_value: 500.0,
        analysis_hours: 2.0,
        urgency_grade: 0,
        specificity_grade: 0,
        complexity_grade: 0,
        adjustments: "[]".to_owned(),
        adjusted_value: 500.0,
        hourly_rate: 100.0,
        analysis_hours_cost: 200.0,
        fixed_subtotal: 0.0,
        total_value: 500.0,
        payment_options: "[]".to_owned(),
        notes: None,
        raw_payload: "{}".to_owned(),
    }
}
