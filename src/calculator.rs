//! Fee arithmetic for a proposal.
//!
//! Everything here is pure. The browser may run the same arithmetic on its own
//! and submit the result; [`check_totals`] reports where a submission disagrees
//! with the recomputation.

use serde::{Deserialize, Serialize};

use crate::models::FixedCosts;

/// Tolerance used when comparing submitted and recomputed amounts.
pub const TOLERANCE: f64 = 0.01;

/// Multiplier over the hourly overhead used for the suggested hourly rate.
pub const SUGGESTED_MARKUP: f64 = 5.0;

/// A named change to the base value: a fixed amount, or a percentage of the base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    #[serde(rename = "tipo")]
    pub label: String,
    #[serde(rename = "percentual", default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(rename = "valor", default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl Adjustment {
    pub fn percent(label: impl Into<String>, percent: f64) -> Self {
        Self {
            label: label.into(),
            percent: Some(percent),
            amount: None,
        }
    }

    pub fn amount(label: impl Into<String>, amount: f64) -> Self {
        Self {
            label: label.into(),
            percent: None,
            amount: Some(amount),
        }
    }

    /// Signed effect on `base`. An explicit amount wins over a percentage.
    pub fn delta(&self, base: f64) -> f64 {
        match (self.amount, self.percent) {
            (Some(amount), _) => amount,
            (None, Some(percent)) => base * percent / 100.0,
            (None, None) => 0.0,
        }
    }
}

/// Severity grades, each a percentage added on top of the base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grades {
    #[serde(default)]
    pub urgency: i64,
    #[serde(default)]
    pub specificity: i64,
    #[serde(default)]
    pub complexity: i64,
}

impl Grades {
    pub fn total_percent(&self) -> i64 {
        self.urgency + self.specificity + self.complexity
    }
}

/// Percentage adjustments for every non-zero grade, each resolved against `base`.
pub fn grade_adjustments(grades: &Grades, base: f64) -> Vec<Adjustment> {
    [
        ("Urgência", grades.urgency),
        ("Especificidade", grades.specificity),
        ("Complexidade", grades.complexity),
    ]
    .into_iter()
    .filter(|(_, grade)| *grade != 0)
    .map(|(label, grade)| {
        let percent = grade as f64;
        Adjustment {
            label: label.to_owned(),
            percent: Some(percent),
            amount: Some(base * percent / 100.0),
        }
    })
    .collect()
}

/// How the professional's overhead is charged to one engagement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modo", content = "valor", rename_all = "snake_case")]
pub enum FixedCostAllocation {
    #[default]
    None,
    /// Overhead per billable hour times the analysis hours.
    PerAnalysisHour,
    /// A flat amount chosen by the caller.
    Flat(f64),
}

pub fn analysis_cost(hourly_rate: f64, analysis_hours: f64) -> f64 {
    hourly_rate * analysis_hours
}

/// Monthly overhead spread across billable hours. Zero when no hours are billable.
pub fn hourly_overhead(costs: &FixedCosts) -> f64 {
    if costs.hours_per_month <= 0 {
        return 0.0;
    }
    costs.monthly_total() / costs.hours_per_month as f64
}

pub fn suggested_rate(costs: &FixedCosts) -> f64 {
    hourly_overhead(costs) * SUGGESTED_MARKUP
}

pub fn fixed_subtotal(
    allocation: FixedCostAllocation,
    costs: Option<&FixedCosts>,
    analysis_hours: f64,
) -> f64 {
    match allocation {
        FixedCostAllocation::None => 0.0,
        FixedCostAllocation::PerAnalysisHour => {
            costs.map(hourly_overhead).unwrap_or(0.0) * analysis_hours
        }
        FixedCostAllocation::Flat(amount) => amount,
    }
}

/// Base value plus the net effect of every adjustment.
pub fn adjusted_value(base: f64, adjustments: &[Adjustment]) -> f64 {
    base + adjustments.iter().map(|a| a.delta(base)).sum::<f64>()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeInput {
    /// Defaults to `hourly_rate * analysis_hours` when absent.
    #[serde(default)]
    pub base_value: Option<f64>,
    #[serde(default)]
    pub hourly_rate: f64,
    #[serde(default)]
    pub analysis_hours: f64,
    #[serde(default)]
    pub grades: Grades,
    /// Extra adjustments on top of the grade percentages.
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
    #[serde(default)]
    pub allocation: FixedCostAllocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub base_value: f64,
    pub analysis_hours_cost: f64,
    pub adjustments: Vec<Adjustment>,
    pub adjusted_value: f64,
    pub fixed_subtotal: f64,
    pub total_value: f64,
}

pub fn quote(input: &FeeInput, costs: Option<&FixedCosts>) -> Quote {
    let analysis_hours_cost = analysis_cost(input.hourly_rate, input.analysis_hours);
    let base_value = input.base_value.unwrap_or(analysis_hours_cost);

    let mut adjustments = grade_adjustments(&input.grades, base_value);
    adjustments.extend(input.adjustments.iter().cloned());

    let adjusted_value = adjusted_value(base_value, &adjustments);
    let fixed_subtotal = fixed_subtotal(input.allocation, costs, input.analysis_hours);

    Quote {
        base_value,
        analysis_hours_cost,
        adjustments,
        adjusted_value,
        fixed_subtotal,
        total_value: adjusted_value + fixed_subtotal,
    }
}

/// Figures as submitted by a client, to be checked against the recomputation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmittedTotals<'a> {
    pub base_value: f64,
    pub hourly_rate: f64,
    pub analysis_hours: f64,
    pub adjustments: &'a [Adjustment],
    pub adjusted_value: f64,
    pub analysis_hours_cost: f64,
    pub fixed_subtotal: f64,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub field: &'static str,
    pub submitted: f64,
    pub expected: f64,
}

impl SubmittedTotals<'_> {
    /// An omitted adjusted value with no adjustments means the base value stands.
    pub fn base_stands(&self) -> bool {
        self.adjusted_value == 0.0 && self.adjustments.is_empty()
    }
}

/// Every submitted figure that disagrees with the recomputation by more than [`TOLERANCE`].
pub fn check_totals(submitted: &SubmittedTotals<'_>) -> Vec<Mismatch> {
    let expected_cost = analysis_cost(submitted.hourly_rate, submitted.analysis_hours);
    let (adjusted_check, effective_adjusted) = if submitted.base_stands() {
        (None, submitted.base_value)
    } else {
        let expected = adjusted_value(submitted.base_value, submitted.adjustments);
        (
            Some(("valor_ajustado", submitted.adjusted_value, expected)),
            submitted.adjusted_value,
        )
    };
    let expected_total = effective_adjusted + submitted.fixed_subtotal;

    [
        Some(("custo_horas_analise", submitted.analysis_hours_cost, expected_cost)),
        adjusted_check,
        Some(("valor_total", submitted.total_value, expected_total)),
    ]
    .into_iter()
    .flatten()
    .filter(|(_, got, want)| (got - want).abs() > TOLERANCE)
    .map(|(field, submitted, expected)| Mismatch {
        field,
        submitted,
        expected,
    })
    .collect()
}
