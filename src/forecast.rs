// 📈 Cash-Flow Forecaster - trend projection over monthly totals
//
// Pure and single-pass: average month-over-month growth, seasonal revenue
// adjustment, and a confidence score that decays with the horizon.
// Rounding happens only when building the HTTP response shape.

use crate::assumptions::SeasonalityTable;
use crate::error::ForecastError;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Minimum number of monthly periods needed to compute a trend
pub const MIN_HISTORY_PERIODS: usize = 3;

/// Longest horizon the HTTP endpoint accepts
pub const MAX_FORECAST_MONTHS: u32 = 24;

/// Default horizon when the caller does not ask for one
pub const DEFAULT_FORECAST_MONTHS: u32 = 3;

/// How many trailing months of history the forecast is built from
pub const HISTORY_MONTHS: u32 = 6;

pub const RISK_FACTORS: [&str; 4] = [
    "Economic conditions may affect member retention",
    "Seasonal variations may differ from historical patterns",
    "Unexpected equipment maintenance or replacement costs",
    "Competition and market changes not accounted for",
];

// ============================================================================
// DATA MODEL
// ============================================================================

/// Revenue and expense totals of one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPeriod {
    pub month_label: String,
    pub revenue: f64,
    pub expenses: f64,
}

impl HistoricalPeriod {
    pub fn new(month_label: impl Into<String>, revenue: f64, expenses: f64) -> Self {
        HistoricalPeriod {
            month_label: month_label.into(),
            revenue,
            expenses,
        }
    }
}

/// One projected month
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub month_label: String,
    pub predicted_revenue: f64,
    pub predicted_expenses: f64,
    pub predicted_profit: f64,
    pub confidence: f64,
}

/// Projection plus the growth rates it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct CashFlowForecast {
    pub points: Vec<ForecastPoint>,
    pub avg_revenue_growth: f64,
    pub avg_expense_growth: f64,
    pub history_len: usize,
}

// ============================================================================
// FORECAST
// ============================================================================

/// Project `months_ahead` months past the month of `as_of`.
///
/// `history` must be chronological. Fewer than [`MIN_HISTORY_PERIODS`] periods
/// fail with [`ForecastError::InsufficientHistory`] and produce nothing.
pub fn forecast(
    history: &[HistoricalPeriod],
    months_ahead: u32,
    as_of: NaiveDate,
    seasonality: &SeasonalityTable,
) -> Result<CashFlowForecast, ForecastError> {
    if history.len() < MIN_HISTORY_PERIODS {
        return Err(ForecastError::InsufficientHistory {
            available: history.len(),
            required: MIN_HISTORY_PERIODS,
        });
    }

    if let Some(bad) = history
        .iter()
        .find(|p| !p.revenue.is_finite() || !p.expenses.is_finite())
    {
        return Err(ForecastError::MalformedInput(format!(
            "non-finite totals for {}",
            bad.month_label
        )));
    }

    let revenues: Vec<f64> = history.iter().map(|p| p.revenue).collect();
    let expenses: Vec<f64> = history.iter().map(|p| p.expenses).collect();

    let avg_revenue_growth = mean(&growth_rates(&revenues));
    let avg_expense_growth = mean(&growth_rates(&expenses));

    // Length checked above
    let last = &history[history.len() - 1];

    let points = (1..=months_ahead)
        .map(|i| {
            let target = target_month(as_of, i).ok_or_else(|| {
                ForecastError::MalformedInput(format!(
                    "{} months after {} is out of range",
                    i, as_of
                ))
            })?;
            let exponent = i as i32;

            let predicted_revenue = last.revenue
                * (1.0 + avg_revenue_growth).powi(exponent)
                * seasonality.multiplier_for(target.month());
            let predicted_expenses = last.expenses * (1.0 + avg_expense_growth).powi(exponent);

            Ok(ForecastPoint {
                month_label: target.format("%B %Y").to_string(),
                predicted_revenue,
                predicted_expenses,
                predicted_profit: predicted_revenue - predicted_expenses,
                confidence: confidence_for(i),
            })
        })
        .collect::<Result<Vec<_>, ForecastError>>()?;

    Ok(CashFlowForecast {
        points,
        avg_revenue_growth,
        avg_expense_growth,
        history_len: history.len(),
    })
}

/// Period-over-period growth, skipping transitions from a non-positive value
pub fn growth_rates(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// First day of the month that lies `step` months after the month of `as_of`
fn target_month(as_of: NaiveDate, step: u32) -> Option<NaiveDate> {
    as_of.with_day(1)?.checked_add_months(Months::new(step))
}

fn confidence_for(step: u32) -> f64 {
    (0.9 - 0.1 * step as f64).max(0.5)
}

// ============================================================================
// RESPONSE SHAPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowPrediction {
    pub month: String,
    pub predicted_revenue: f64,
    pub predicted_expenses: f64,
    pub predicted_profit: f64,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialForecast {
    pub period: String,
    pub predictions: Vec<CashFlowPrediction>,
    pub key_assumptions: Vec<String>,
    pub risk_factors: Vec<String>,
}

impl FinancialForecast {
    pub fn from_forecast(forecast: &CashFlowForecast, months_ahead: u32) -> Self {
        let predictions = forecast
            .points
            .iter()
            .map(|p| CashFlowPrediction {
                month: p.month_label.clone(),
                predicted_revenue: round2(p.predicted_revenue),
                predicted_expenses: round2(p.predicted_expenses),
                predicted_profit: round2(p.predicted_profit),
                confidence_level: round2(p.confidence),
            })
            .collect();

        FinancialForecast {
            period: period_label(months_ahead),
            predictions,
            key_assumptions: vec![
                format!(
                    "Revenue growth rate: {:.1}% per month",
                    forecast.avg_revenue_growth * 100.0
                ),
                format!(
                    "Expense growth rate: {:.1}% per month",
                    forecast.avg_expense_growth * 100.0
                ),
                "Seasonal adjustments applied for summer and winter months".to_string(),
                format!(
                    "Based on historical trend analysis of last {} months",
                    forecast.history_len
                ),
            ],
            risk_factors: RISK_FACTORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Degraded response used when there is not enough history to project
    pub fn insufficient_data(months_ahead: u32) -> Self {
        FinancialForecast {
            period: period_label(months_ahead),
            predictions: Vec::new(),
            key_assumptions: vec!["Insufficient data for accurate prediction".to_string()],
            risk_factors: vec!["Prediction model requires more historical data".to_string()],
        }
    }
}

fn period_label(months_ahead: u32) -> String {
    format!("{} months ahead", months_ahead)
}

/// Round to 2 decimals for presentation
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
