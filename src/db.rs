use chrono::SecondsFormat;

use crate::{
    auth,
    errors::AppError,
    models::{FixedCosts, NewProposal, ProfileUpdate, Proposal, User},
    AppState,
};

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub async fn get_active_user_by_email(
    state: &AppState,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 AND active = 1")
        .bind(email)
        .fetch_optional(&pool)
        .await
}

pub async fn email_exists(state: &AppState, email: &str) -> Result<bool, sqlx::Error> {
    let pool = state.db_pool.clone();
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&pool)
        .await?;
    Ok(row.is_some())
}

pub async fn get_user_by_id(state: &AppState, id: i64) -> Result<Option<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
}

pub async fn create_user(
    state: &AppState,
    full_name: String,
    email: String,
    password: &str,
    crp_number: Option<String>,
    phone: Option<String>,
) -> Result<User, AppError> {
    let created_at = now_timestamp();
    let pwd_hash = auth::hash_password(password)?;
    let pool = state.db_pool.clone();
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (full_name, email, pwd_hash, crp_number, phone, active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 1, $6, $7) RETURNING *",
    )
    .bind(full_name)
    .bind(email)
    .bind(pwd_hash)
    .bind(crp_number)
    .bind(phone)
    .bind(&created_at)
    .bind(&created_at)
    .fetch_one(&pool)
    .await?;
    log::info!("User created: id={} email={}", user.id, user.email);
    Ok(user)
}

pub async fn update_user(
    state: &AppState,
    id: i64,
    update: ProfileUpdate,
) -> Result<User, AppError> {
    let pool = state.db_pool.clone();
    let updated_at = now_timestamp();
    let mut query = String::from(
        "UPDATE users SET updated_at = $1, full_name = $2, crp_number = $3, phone = $4",
    );
    let mut param_index = 5;

    if update.new_pwd_hash.is_some() {
        query.push_str(&format!(", pwd_hash = ${}", param_index));
        param_index += 1;
    }
    query.push_str(&format!(" WHERE id = ${} RETURNING *", param_index));

    let mut q = sqlx::query_as::<_, User>(&query)
        .bind(&updated_at)
        .bind(&update.full_name)
        .bind(&update.crp_number)
        .bind(&update.phone);
    if let Some(pwd_hash) = &update.new_pwd_hash {
        q = q.bind(pwd_hash);
    }
    q = q.bind(id);

    let user = q.fetch_optional(&pool).await?.ok_or(AppError::NotFound)?;
    log::info!("User updated: id={}", user.id);
    Ok(user)
}

pub async fn deactivate_user(state: &AppState, id: i64) -> Result<(), sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query("UPDATE users SET active = 0, updated_at = $1 WHERE id = $2")
        .bind(now_timestamp())
        .bind(id)
        .execute(&pool)
        .await?;
    log::info!("User with id {} deactivated", id);
    Ok(())
}

pub async fn get_fixed_costs(
    state: &AppState,
    user_id: i64,
) -> Result<Option<FixedCosts>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, FixedCosts>(
        "SELECT rent, internet_phone, tools_software, annual_dues, payroll, other_costs, hours_per_month \
         FROM fixed_costs WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
}

pub async fn insert_fixed_costs(
    state: &AppState,
    user_id: i64,
    costs: &FixedCosts,
) -> Result<(), sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query(
        "INSERT INTO fixed_costs (user_id, rent, internet_phone, tools_software, annual_dues, payroll, other_costs, hours_per_month, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(user_id)
    .bind(costs.rent)
    .bind(costs.internet_phone)
    .bind(costs.tools_software)
    .bind(costs.annual_dues)
    .bind(costs.payroll)
    .bind(costs.other_costs)
    .bind(costs.hours_per_month)
    .bind(now_timestamp())
    .execute(&pool)
    .await?;
    log::info!("Fixed costs created for user {}", user_id);
    Ok(())
}

/// Updates the owner's profile in place, inserting it when the account has none yet.
pub async fn upsert_fixed_costs(
    state: &AppState,
    user_id: i64,
    costs: &FixedCosts,
) -> Result<(), sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query(
        "INSERT INTO fixed_costs (user_id, rent, internet_phone, tools_software, annual_dues, payroll, other_costs, hours_per_month, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (user_id) DO UPDATE SET \
            rent = excluded.rent, \
            internet_phone = excluded.internet_phone, \
            tools_software = excluded.tools_software, \
            annual_dues = excluded.annual_dues, \
            payroll = excluded.payroll, \
            other_costs = excluded.other_costs, \
            hours_per_month = excluded.hours_per_month, \
            updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(costs.rent)
    .bind(costs.internet_phone)
    .bind(costs.tools_software)
    .bind(costs.annual_dues)
    .bind(costs.payroll)
    .bind(costs.other_costs)
    .bind(costs.hours_per_month)
    .bind(now_timestamp())
    .execute(&pool)
    .await?;
    log::info!("Fixed costs saved for user {}", user_id);
    Ok(())
}

pub async fn insert_proposal(
    state: &AppState,
    user_id: i64,
    proposal: &NewProposal,
) -> Result<i64, sqlx::Error> {
    let pool = state.db_pool.clone();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO proposals (user_id, number, client_name, client_phone, service_type, base_value, analysis_hours, \
            urgency_grade, specificity_grade, complexity_grade, adjustments, adjusted_value, hourly_rate, \
            analysis_hours_cost, fixed_subtotal, total_value, payment_options, notes, raw_payload, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
         RETURNING id",
    )
    .bind(user_id)
    .bind(&proposal.number)
    .bind(&proposal.client_name)
    .bind(&proposal.client_phone)
    .bind(&proposal.service_type)
    .bind(proposal.base_value)
    .bind(proposal.analysis_hours)
    .bind(proposal.urgency_grade)
    .bind(proposal.specificity_grade)
    .bind(proposal.complexity_grade)
    .bind(&proposal.adjustments)
    .bind(proposal.adjusted_value)
    .bind(proposal.hourly_rate)
    .bind(proposal.analysis_hours_cost)
    .bind(proposal.fixed_subtotal)
    .bind(proposal.total_value)
    .bind(&proposal.payment_options)
    .bind(&proposal.notes)
    .bind(&proposal.raw_payload)
    .bind(now_timestamp())
    .fetch_one(&pool)
    .await?;
    log::info!("Proposal {} created for user {} (id={})", proposal.number, user_id, id);
    Ok(id)
}

pub async fn get_proposal(
    state: &AppState,
    user_id: i64,
    id: i64,
) -> Result<Option<Proposal>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, Proposal>("SELECT * FROM proposals WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await
}

pub async fn list_proposals(state: &AppState, user_id: i64) -> Result<Vec<Proposal>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, Proposal>(
        "SELECT * FROM proposals WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
}

/// Returns the number of rows removed; zero when the id is absent or foreign.
pub async fn delete_proposal(state: &AppState, user_id: i64, id: i64) -> Result<u64, sqlx::Error> {
    let pool = state.db_pool.clone();
    let result = sqlx::query("DELETE FROM proposals WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&pool)
        .await?;
    log::info!(
        "Delete of proposal {} by user {} removed {} row(s)",
        id,
        user_id,
        result.rows_affected()
    );
    Ok(result.rows_affected())
}

/// Proposal count and sum of totals for the dashboard.
pub async fn proposal_summary(state: &AppState, user_id: i64) -> Result<(i64, f64), sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(total_value), 0.0) FROM proposals WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_state, sample_proposal, seed_user};

    #[actix_web::test]
    async fn active_lookup_skips_deactivated_accounts() {
        let state = memory_state().await;
        let user = seed_user(&state, "ana@example.com").await;

        assert!(get_active_user_by_email(&state, "ana@example.com")
            .await
            .unwrap()
            .is_some());

        deactivate_user(&state, user.id).await.unwrap();
        assert!(get_active_user_by_email(&state, "ana@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(email_exists(&state, "ana@example.com").await.unwrap());
    }

    #[actix_web::test]
    async fn upsert_inserts_then_updates_in_place() {
        let state = memory_state().await;
        let user = seed_user(&state, "ana@example.com").await;
        assert!(get_fixed_costs(&state, user.id).await.unwrap().is_none());

        let mut costs = FixedCosts::default();
        upsert_fixed_costs(&state, user.id, &costs).await.unwrap();
        costs.rent = 1800.0;
        costs.hours_per_month = 120;
        upsert_fixed_costs(&state, user.id, &costs).await.unwrap();

        assert_eq!(get_fixed_costs(&state, user.id).await.unwrap(), Some(costs));
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fixed_costs")
            .fetch_one(&state.db_pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[actix_web::test]
    async fn proposals_are_owner_scoped() {
        let state = memory_state().await;
        let ana = seed_user(&state, "ana@example.com").await;
        let bia = seed_user(&state, "bia@example.com").await;

        let id = insert_proposal(&state, ana.id, &sample_proposal("PER-20250101120000"))
            .await
            .unwrap();

        assert!(get_proposal(&state, ana.id, id).await.unwrap().is_some());
        assert!(get_proposal(&state, bia.id, id).await.unwrap().is_none());
        assert!(list_proposals(&state, bia.id).await.unwrap().is_empty());

        assert_eq!(delete_proposal(&state, bia.id, id).await.unwrap(), 0);
        assert!(get_proposal(&state, ana.id, id).await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn listing_is_newest_first() {
        let state = memory_state().await;
        let ana = seed_user(&state, "ana@example.com").await;
        let first = insert_proposal(&state, ana.id, &sample_proposal("PER-20250101120000"))
            .await
            .unwrap();
        let second = insert_proposal(&state, ana.id, &sample_proposal("PER-20250101120001"))
            .await
            .unwrap();

        let ids: Vec<i64> = list_proposals(&state, ana.id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![second, first]);

        let (count, total) = proposal_summary(&state, ana.id).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(total, 1000.0);
    }

    #[actix_web::test]
    async fn profile_update_can_change_password() {
        let state = memory_state().await;
        let ana = seed_user(&state, "ana@example.com").await;
        let updated = update_user(
            &state,
            ana.id,
            ProfileUpdate {
                full_name: "Ana Souza".into(),
                crp_number: Some("06/12345".into()),
                phone: None,
                new_pwd_hash: Some(auth::hash_password("outra-senha-123").unwrap()),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.full_name, "Ana Souza");
        assert_eq!(updated.crp_number.as_deref(), Some("06/12345"));
        assert!(auth::verify_password("outra-senha-123", &updated.pwd_hash).unwrap());

        let missing = update_user(&state, 9999, ProfileUpdate::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound)));
    }
}
