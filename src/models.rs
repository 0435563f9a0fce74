use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pwd_hash: String,
    pub crp_number: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Monthly overhead of one professional, used to price billable hours.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct FixedCosts {
    pub rent: f64,
    pub internet_phone: f64,
    pub tools_software: f64,
    pub annual_dues: f64,
    pub payroll: f64,
    pub other_costs: f64,
    pub hours_per_month: i64,
}

impl Default for FixedCosts {
    fn default() -> Self {
        Self {
            rent: 1000.00,
            internet_phone: 200.00,
            tools_software: 150.00,
            annual_dues: 100.00,
            payroll: 0.00,
            other_costs: 0.00,
            hours_per_month: 160,
        }
    }
}

impl FixedCosts {
    pub fn monthly_total(&self) -> f64 {
        self.rent
            + self.internet_phone
            + self.tools_software
            + self.annual_dues
            + self.payroll
            + self.other_costs
    }
}

/// A persisted fee proposal. Monetary fields hold exactly what the client submitted.
#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Proposal {
    pub id: i64,
    pub user_id: i64,
    pub number: String,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub service_type: Option<String>,
    pub base_value: f64,
    pub analysis_hours: f64,
    pub urgency_grade: i64,
    pub specificity_grade: i64,
    pub complexity_grade: i64,
    /// JSON array, stored as submitted.
    pub adjustments: String,
    pub adjusted_value: f64,
    pub hourly_rate: f64,
    pub analysis_hours_cost: f64,
    pub fixed_subtotal: f64,
    pub total_value: f64,
    /// JSON array, stored as submitted.
    pub payment_options: String,
    pub notes: Option<String>,
    pub raw_payload: String,
    pub created_at: String,
}

/// Validated proposal fields ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProposal {
    pub number: String,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub service_type: Option<String>,
    pub base_value: f64,
    pub analysis_hours: f64,
    pub urgency_grade: i64,
    pub specificity_grade: i64,
    pub complexity_grade: i64,
    pub adjustments: String,
    pub adjusted_value: f64,
    pub hourly_rate: f64,
    pub analysis_hours_cost: f64,
    pub fixed_subtotal: f64,
    pub total_value: f64,
    pub payment_options: String,
    pub notes: Option<String>,
    pub raw_payload: String,
}

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub crp_number: Option<String>,
    pub phone: Option<String>,
    pub new_pwd_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fixed_costs_match_new_account_profile() {
        let costs = FixedCosts::default();
        assert_eq!(costs.rent, 1000.00);
        assert_eq!(costs.hours_per_month, 160);
        assert_eq!(costs.monthly_total(), 1450.00);
    }
}
