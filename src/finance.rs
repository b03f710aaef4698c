// 💵 Finance Aggregations - dashboard cards, charts and rule-based insights
//
// Every function takes `today` explicitly so results are reproducible in tests.
// Sums are plain f64; only percentages are rounded here.

use crate::entities::{BudgetAllocation, ExpenseCategory, FinancialTarget, IncomeType};
use crate::error::{AppError, AppResult};
use crate::forecast::{round2, HistoricalPeriod};
use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest daily window a chart may ask for
pub const MAX_WINDOW_DAYS: u32 = 366;

/// Longest monthly trend a chart may ask for
pub const MAX_TREND_MONTHS: u32 = 120;

// ============================================================================
// DATE RANGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "ytd")]
    YearToDate,
    #[default]
    #[serde(rename = "12months")]
    TwelveMonths,
    #[serde(rename = "custom")]
    Custom,
}

/// Query-string filter shared by the finance endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRangeFilter {
    #[serde(default)]
    pub period: Period,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRangeFilter {
    pub fn period(period: Period) -> Self {
        DateRangeFilter {
            period,
            start_date: None,
            end_date: None,
        }
    }

    /// Resolve to concrete dates relative to `today`.
    ///
    /// Rolling windows step back from the first of the current month and then
    /// snap to the first of that month. `Custom` without both dates is an error.
    pub fn resolve(&self, today: NaiveDate) -> AppResult<DateRange> {
        let month_start = first_of_month(today);
        let back = |days: i64| first_of_month(month_start - Duration::days(days));

        let start = match self.period {
            Period::Custom => {
                return match (self.start_date, self.end_date) {
                    (Some(start), Some(end)) if start <= end => Ok(DateRange { start, end }),
                    (Some(_), Some(_)) => Err(AppError::invalid_input(
                        "start_date must not be after end_date",
                    )),
                    _ => Err(AppError::invalid_input(
                        "custom period requires start_date and end_date",
                    )),
                };
            }
            Period::OneMonth => month_start,
            Period::ThreeMonths => back(90),
            Period::SixMonths => back(180),
            Period::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(month_start),
            Period::TwelveMonths => back(365),
        };

        Ok(DateRange { start, end: today })
    }
}

impl DateRange {
    /// The range of equal length that ends the day before this one starts
    pub fn previous(&self) -> AppResult<DateRange> {
        let length = self.end - self.start;
        let end = days_before(self.start, 1)?;
        let start = end
            .checked_sub_signed(length)
            .ok_or_else(|| AppError::invalid_input("date range is out of bounds"))?;
        Ok(DateRange { start, end })
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn next_month(day: NaiveDate) -> NaiveDate {
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(day)
}

pub(crate) fn month_label(day: NaiveDate) -> String {
    day.format("%b %Y").to_string()
}

/// First days of the last `months` months, oldest first, ending with the
/// month of `today`
pub(crate) fn trailing_month_starts(months: u32, today: NaiveDate) -> AppResult<Vec<NaiveDate>> {
    if months > MAX_TREND_MONTHS {
        return Err(AppError::invalid_input(format!(
            "months must be at most {}, got {}",
            MAX_TREND_MONTHS, months
        )));
    }
    if months == 0 {
        return Ok(Vec::new());
    }

    let mut month_starts = vec![first_of_month(today)];
    for _ in 1..months {
        let earliest = month_starts[month_starts.len() - 1];
        let previous = days_before(earliest, 1)?;
        month_starts.push(first_of_month(previous));
    }
    month_starts.reverse();
    Ok(month_starts)
}

/// `day` minus `days`, or `InvalidInput` when that leaves the calendar
pub(crate) fn days_before(day: NaiveDate, days: u32) -> AppResult<NaiveDate> {
    day.checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| AppError::invalid_input(format!("{} days before {} is out of range", days, day)))
}

/// Reject daily windows longer than [`MAX_WINDOW_DAYS`]
pub(crate) fn check_window(days: u32) -> AppResult<()> {
    if days > MAX_WINDOW_DAYS {
        return Err(AppError::invalid_input(format!(
            "days must be at most {}, got {}",
            MAX_WINDOW_DAYS, days
        )));
    }
    Ok(())
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

fn sum_between(conn: &Connection, table: &str, range: DateRange) -> AppResult<f64> {
    let total: f64 = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(amount), 0) FROM {}
             WHERE transaction_date >= ?1 AND transaction_date <= ?2",
            table
        ),
        params![range.start, range.end],
        |row| row.get(0),
    )?;
    Ok(total)
}

fn sums_by(
    conn: &Connection,
    table: &str,
    column: &str,
    range: DateRange,
) -> AppResult<HashMap<String, f64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, SUM(amount) FROM {table}
         WHERE transaction_date >= ?1 AND transaction_date <= ?2
         GROUP BY {column}",
    ))?;

    let rows = stmt
        .query_map(params![range.start, range.end], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;

    Ok(rows)
}

// ============================================================================
// OVERVIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceOverviewStats {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
    pub profit_margin: f64,
    /// Revenue growth against the previous period of equal length
    pub monthly_growth: f64,
}

pub fn overview_stats(
    conn: &Connection,
    filter: &DateRangeFilter,
    today: NaiveDate,
) -> AppResult<FinanceOverviewStats> {
    let range = filter.resolve(today)?;

    let total_revenue = sum_between(conn, "income_transaction", range)?;
    let total_expenses = sum_between(conn, "expense_transaction", range)?;
    let net_profit = total_revenue - total_expenses;

    let prev_revenue = sum_between(conn, "income_transaction", range.previous()?)?;
    let growth = if prev_revenue > 0.0 {
        (total_revenue - prev_revenue) / prev_revenue * 100.0
    } else {
        0.0
    };

    Ok(FinanceOverviewStats {
        total_revenue,
        total_expenses,
        net_profit,
        profit_margin: round2(percent(net_profit, total_revenue)),
        monthly_growth: round2(growth),
    })
}

// ============================================================================
// BREAKDOWNS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub membership: f64,
    pub personal_training: f64,
    pub class_fees: f64,
    pub product_sales: f64,
}

impl RevenueBreakdown {
    pub fn total(&self) -> f64 {
        self.membership + self.personal_training + self.class_fees + self.product_sales
    }
}

pub fn revenue_breakdown(
    conn: &Connection,
    filter: &DateRangeFilter,
    today: NaiveDate,
) -> AppResult<RevenueBreakdown> {
    let range = filter.resolve(today)?;
    let sums = sums_by(conn, "income_transaction", "income_type", range)?;
    let get = |kind: IncomeType| sums.get(kind.as_str()).copied().unwrap_or(0.0);

    Ok(RevenueBreakdown {
        membership: get(IncomeType::Membership),
        personal_training: get(IncomeType::PersonalTraining),
        class_fees: get(IncomeType::ClassFee),
        product_sales: get(IncomeType::ProductSale),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseBreakdown {
    pub rent: f64,
    pub utilities: f64,
    pub staff_salary: f64,
    pub equipment: f64,
    pub marketing: f64,
    pub maintenance: f64,
}

impl ExpenseBreakdown {
    pub fn total(&self) -> f64 {
        self.rent
            + self.utilities
            + self.staff_salary
            + self.equipment
            + self.marketing
            + self.maintenance
    }
}

pub fn expense_breakdown(
    conn: &Connection,
    filter: &DateRangeFilter,
    today: NaiveDate,
) -> AppResult<ExpenseBreakdown> {
    let range = filter.resolve(today)?;
    let sums = sums_by(conn, "expense_transaction", "expense_category", range)?;
    let get = |category: ExpenseCategory| sums.get(category.as_str()).copied().unwrap_or(0.0);

    Ok(ExpenseBreakdown {
        rent: get(ExpenseCategory::Rent),
        utilities: get(ExpenseCategory::Utilities),
        staff_salary: get(ExpenseCategory::StaffSalary),
        equipment: get(ExpenseCategory::Equipment),
        marketing: get(ExpenseCategory::Marketing),
        maintenance: get(ExpenseCategory::Maintenance),
    })
}

// ============================================================================
// TRENDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrendData {
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

impl From<&MonthlyTrendData> for HistoricalPeriod {
    fn from(data: &MonthlyTrendData) -> Self {
        HistoricalPeriod::new(data.month.clone(), data.revenue, data.expenses)
    }
}

/// Monthly totals for the `months` calendar months ending with the month of
/// `today`, oldest first. Months without transactions are zero.
pub fn monthly_trend(
    conn: &Connection,
    months: u32,
    today: NaiveDate,
) -> AppResult<Vec<MonthlyTrendData>> {
    let month_starts = trailing_month_starts(months, today)?;
    if month_starts.is_empty() {
        return Ok(Vec::new());
    }

    let range = DateRange {
        start: month_starts[0],
        end: next_month(first_of_month(today)) - Duration::days(1),
    };

    let monthly = |table: &str| -> AppResult<HashMap<String, f64>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT substr(transaction_date, 1, 7) AS ym, SUM(amount) FROM {}
             WHERE transaction_date >= ?1 AND transaction_date <= ?2
             GROUP BY ym",
            table
        ))?;
        let rows = stmt
            .query_map(params![range.start, range.end], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    };

    let revenue = monthly("income_transaction")?;
    let expenses = monthly("expense_transaction")?;

    Ok(month_starts
        .into_iter()
        .map(|start| {
            let key = start.format("%Y-%m").to_string();
            let revenue = revenue.get(&key).copied().unwrap_or(0.0);
            let expenses = expenses.get(&key).copied().unwrap_or(0.0);
            MonthlyTrendData {
                month: month_label(start),
                revenue,
                expenses,
                profit: revenue - expenses,
            }
        })
        .collect())
}

/// History fed to the forecaster: the trailing months up to and including the
/// month of `today`, so the first forecast step is the month after it. Empty
/// months before the first recorded transaction are dropped.
pub fn forecast_history(
    conn: &Connection,
    months: u32,
    today: NaiveDate,
) -> AppResult<Vec<HistoricalPeriod>> {
    let trend = monthly_trend(conn, months, today)?;
    Ok(trend
        .iter()
        .skip_while(|m| m.revenue == 0.0 && m.expenses == 0.0)
        .map(HistoricalPeriod::from)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowData {
    pub date: NaiveDate,
    pub cash_in: f64,
    pub cash_out: f64,
    pub net_flow: f64,
    pub cumulative: f64,
}

/// Daily cash movement for the last `days` days (today included)
pub fn cash_flow(conn: &Connection, days: u32, today: NaiveDate) -> AppResult<Vec<CashFlowData>> {
    check_window(days)?;
    if days == 0 {
        return Ok(Vec::new());
    }

    let range = DateRange {
        start: days_before(today, days - 1)?,
        end: today,
    };

    let daily = |table: &str| -> AppResult<HashMap<NaiveDate, f64>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT transaction_date, SUM(amount) FROM {}
             WHERE transaction_date >= ?1 AND transaction_date <= ?2
             GROUP BY transaction_date",
            table
        ))?;
        let rows = stmt
            .query_map(params![range.start, range.end], |row| {
                Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    };

    let income = daily("income_transaction")?;
    let outgoing = daily("expense_transaction")?;

    let mut cumulative = 0.0;
    Ok(range
        .start
        .iter_days()
        .take(days as usize)
        .map(|date| {
            let cash_in = income.get(&date).copied().unwrap_or(0.0);
            let cash_out = outgoing.get(&date).copied().unwrap_or(0.0);
            let net_flow = cash_in - cash_out;
            cumulative += net_flow;
            CashFlowData {
                date,
                cash_in,
                cash_out,
                net_flow,
                cumulative,
            }
        })
        .collect())
}

// ============================================================================
// BUDGETS AND TARGETS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetVarianceData {
    pub category: String,
    pub allocated: f64,
    pub actual: f64,
    pub variance: f64,
    pub variance_percentage: f64,
}

pub fn budget_variance(
    conn: &Connection,
    year: i32,
    month: Option<u32>,
) -> AppResult<Vec<BudgetVarianceData>> {
    let mut stmt = conn.prepare(
        "SELECT budget_id, budget_year, budget_month, category, allocated_amount, actual_amount
         FROM budget_allocation
         WHERE budget_year = ?1 AND (?2 IS NULL OR budget_month = ?2)
         ORDER BY budget_month, category",
    )?;

    let budgets = stmt
        .query_map(params![year, month], BudgetAllocation::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(budgets
        .into_iter()
        .map(|b| {
            let variance = b.actual_amount - b.allocated_amount;
            BudgetVarianceData {
                variance_percentage: round2(percent(variance, b.allocated_amount)),
                category: b.category,
                allocated: b.allocated_amount,
                actual: b.actual_amount,
                variance,
            }
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Achieved,
    OnTrack,
    Behind,
}

impl TargetStatus {
    pub fn from_achievement(percentage: f64) -> Self {
        if percentage >= 100.0 {
            TargetStatus::Achieved
        } else if percentage >= 80.0 {
            TargetStatus::OnTrack
        } else {
            TargetStatus::Behind
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTargetData {
    pub target_type: String,
    pub target_value: f64,
    pub actual_value: f64,
    pub achievement_percentage: f64,
    pub status: TargetStatus,
}

pub fn financial_targets(
    conn: &Connection,
    year: i32,
    month: Option<u32>,
) -> AppResult<Vec<FinancialTargetData>> {
    let mut stmt = conn.prepare(
        "SELECT target_id, target_year, target_month, target_type, target_value, actual_value
         FROM financial_target
         WHERE target_year = ?1 AND (?2 IS NULL OR target_month = ?2)
         ORDER BY target_month, target_type",
    )?;

    let targets = stmt
        .query_map(params![year, month], FinancialTarget::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(targets
        .into_iter()
        .map(|t| {
            let achievement = percent(t.actual_value, t.target_value);
            FinancialTargetData {
                target_type: t.target_type,
                target_value: t.target_value,
                actual_value: t.actual_value,
                achievement_percentage: round2(achievement),
                status: TargetStatus::from_achievement(achievement),
            }
        })
        .collect())
}

// ============================================================================
// PAYMENT METHODS AND TRANSACTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodData {
    pub method: String,
    pub amount: f64,
    pub percentage: f64,
    pub transaction_count: i64,
}

/// Income per payment method, largest amount first
pub fn payment_method_distribution(
    conn: &Connection,
    filter: &DateRangeFilter,
    today: NaiveDate,
) -> AppResult<Vec<PaymentMethodData>> {
    let range = filter.resolve(today)?;

    let mut stmt = conn.prepare(
        "SELECT payment_method, SUM(amount), COUNT(*) FROM income_transaction
         WHERE transaction_date >= ?1 AND transaction_date <= ?2
         GROUP BY payment_method",
    )?;

    let rows = stmt
        .query_map(params![range.start, range.end], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total: f64 = rows.iter().map(|(_, amount, _)| amount).sum();

    let mut result: Vec<PaymentMethodData> = rows
        .into_iter()
        .map(|(method, amount, count)| PaymentMethodData {
            method,
            amount,
            percentage: round2(percent(amount, total)),
            transaction_count: count,
        })
        .collect();

    result.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// Income and expense rows merged into one list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// "inc-<id>" or "exp-<id>"
    pub id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    pub payment_method: String,
    pub description: Option<String>,
}

/// Newest `limit` transactions across income and expenses
pub fn recent_transactions(conn: &Connection, limit: usize) -> AppResult<Vec<TransactionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT 'inc-' || income_id, transaction_date, 'income', income_type, amount,
                payment_method, description, income_id
         FROM income_transaction
         UNION ALL
         SELECT 'exp-' || expense_id, transaction_date, 'expense', expense_category, amount,
                payment_method, description, expense_id
         FROM expense_transaction
         ORDER BY 2 DESC, 8 DESC
         LIMIT ?1",
    )?;

    let records = stmt
        .query_map([limit as i64], |row| {
            let kind: String = row.get(2)?;
            Ok(TransactionRecord {
                id: row.get(0)?,
                date: row.get(1)?,
                kind: if kind == "income" {
                    TransactionKind::Income
                } else {
                    TransactionKind::Expense
                },
                category: row.get(3)?,
                amount: row.get(4)?,
                payment_method: row.get(5)?,
                description: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

// ============================================================================
// INSIGHTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceInsight {
    pub title: String,
    pub text: String,
    pub recommendation: String,
    pub impact_level: ImpactLevel,
    /// "profit", "revenue" or "expense"
    pub category: String,
}

impl FinanceInsight {
    fn new(
        title: &str,
        text: String,
        recommendation: &str,
        impact_level: ImpactLevel,
        category: &str,
    ) -> Self {
        FinanceInsight {
            title: title.to_string(),
            text,
            recommendation: recommendation.to_string(),
            impact_level,
            category: category.to_string(),
        }
    }
}

pub const MAX_FINANCE_INSIGHTS: usize = 4;

/// Threshold rules over the overview and breakdowns, at most four insights
pub fn finance_insights(
    conn: &Connection,
    filter: &DateRangeFilter,
    today: NaiveDate,
) -> AppResult<Vec<FinanceInsight>> {
    let stats = overview_stats(conn, filter, today)?;
    let revenue = revenue_breakdown(conn, filter, today)?;
    let expenses = expense_breakdown(conn, filter, today)?;

    Ok(insights_from(&stats, &revenue, &expenses))
}

fn insights_from(
    stats: &FinanceOverviewStats,
    revenue: &RevenueBreakdown,
    expenses: &ExpenseBreakdown,
) -> Vec<FinanceInsight> {
    let mut insights = Vec::new();

    if stats.profit_margin < 15.0 {
        insights.push(FinanceInsight::new(
            "Low Profit Margin",
            format!(
                "Current profit margin of {:.1}% is below the 15% target.",
                stats.profit_margin
            ),
            "Review the cost structure and consider adjusting membership pricing or trimming operating costs.",
            ImpactLevel::High,
            "profit",
        ));
    } else if stats.profit_margin > 25.0 {
        insights.push(FinanceInsight::new(
            "Healthy Profit Margin",
            format!(
                "A profit margin of {:.1}% shows very strong financial performance.",
                stats.profit_margin
            ),
            "Keep operations efficient and consider investing in expansion or facility upgrades.",
            ImpactLevel::Low,
            "profit",
        ));
    }

    if stats.monthly_growth < -5.0 {
        insights.push(FinanceInsight::new(
            "Significant Revenue Decline",
            format!(
                "Revenue fell {:.1}% compared with the previous period.",
                stats.monthly_growth.abs()
            ),
            "Investigate the drivers and launch member retention and acquisition campaigns.",
            ImpactLevel::High,
            "revenue",
        ));
    } else if stats.monthly_growth > 10.0 {
        insights.push(FinanceInsight::new(
            "Positive Revenue Growth",
            format!(
                "Revenue grew {:.1}%, a very positive trend.",
                stats.monthly_growth
            ),
            "Use the momentum to expand capacity and service quality.",
            ImpactLevel::Medium,
            "revenue",
        ));
    }

    let total_revenue = revenue.total();
    if total_revenue > 0.0 {
        let membership_share = percent(revenue.membership, total_revenue);
        if membership_share < 60.0 {
            insights.push(FinanceInsight::new(
                "Well Diversified Revenue",
                format!(
                    "Memberships contribute {:.1}% of total revenue, a healthy mix.",
                    membership_share
                ),
                "Keep the balance of revenue sources to limit dependence on any single one.",
                ImpactLevel::Low,
                "revenue",
            ));
        } else if membership_share > 80.0 {
            insights.push(FinanceInsight::new(
                "High Dependence on Memberships",
                format!(
                    "Memberships make up {:.1}% of total revenue.",
                    membership_share
                ),
                "Grow personal training, class and product revenue to diversify.",
                ImpactLevel::Medium,
                "revenue",
            ));
        }
    }

    let total_expenses = expenses.total();
    if total_expenses > 0.0 {
        let salary_share = percent(expenses.staff_salary, total_expenses);
        if salary_share > 50.0 {
            insights.push(FinanceInsight::new(
                "High Staff Costs",
                format!(
                    "Staff salaries account for {:.1}% of total expenses.",
                    salary_share
                ),
                "Review staff productivity and consider schedule optimisation or performance-based incentives.",
                ImpactLevel::Medium,
                "expense",
            ));
        }

        let marketing_share = percent(expenses.marketing, total_expenses);
        if marketing_share < 10.0 {
            insights.push(FinanceInsight::new(
                "Low Marketing Investment",
                format!(
                    "Marketing is only {:.1}% of total expenses.",
                    marketing_share
                ),
                "Consider spending more on marketing to drive new member acquisition.",
                ImpactLevel::Medium,
                "expense",
            ));
        }
    }

    insights.truncate(MAX_FINANCE_INSIGHTS);
    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{date, empty_db, expense, income, seeded_db};
    use crate::db::insert_income;

    fn custom(start: NaiveDate, end: NaiveDate) -> DateRangeFilter {
        DateRangeFilter {
            period: Period::Custom,
            start_date: Some(start),
            end_date: Some(end),
        }
    }

    #[test]
    fn test_resolve_periods() {
        let today = date(2025, 3, 20);

        let one = DateRangeFilter::period(Period::OneMonth).resolve(today).unwrap();
        assert_eq!(one.start, date(2025, 3, 1));
        assert_eq!(one.end, today);

        // 2025-03-01 minus 90 days = 2024-12-01
        let three = DateRangeFilter::period(Period::ThreeMonths).resolve(today).unwrap();
        assert_eq!(three.start, date(2024, 12, 1));

        let ytd = DateRangeFilter::period(Period::YearToDate).resolve(today).unwrap();
        assert_eq!(ytd.start, date(2025, 1, 1));

        let twelve = DateRangeFilter::default().resolve(today).unwrap();
        assert_eq!(twelve.start, date(2024, 3, 1));
    }

    #[test]
    fn test_custom_requires_both_dates() {
        let filter = DateRangeFilter {
            period: Period::Custom,
            start_date: Some(date(2025, 1, 1)),
            end_date: None,
        };
        assert!(filter.resolve(date(2025, 3, 1)).is_err());

        let backwards = custom(date(2025, 3, 1), date(2025, 1, 1));
        assert!(backwards.resolve(date(2025, 3, 1)).is_err());
    }

    #[test]
    fn test_previous_period_has_equal_length() {
        let range = DateRange {
            start: date(2025, 3, 1),
            end: date(2025, 3, 31),
        };
        let prev = range.previous().unwrap();

        assert_eq!(prev.end, date(2025, 2, 28));
        assert_eq!(prev.end - prev.start, range.end - range.start);
    }

    #[test]
    fn test_overview_stats() {
        let conn = seeded_db();
        let stats = overview_stats(
            &conn,
            &custom(date(2025, 3, 1), date(2025, 3, 31)),
            date(2025, 3, 31),
        )
        .unwrap();

        assert_eq!(stats.total_revenue, 1210.0);
        assert_eq!(stats.total_expenses, 840.0);
        assert_eq!(stats.net_profit, 370.0);
        assert_eq!(stats.profit_margin, 30.58);
        // Previous window 2025-01-29..=2025-02-28 holds the February income
        assert_eq!(stats.monthly_growth, 10.0);
    }

    #[test]
    fn test_overview_stats_empty_database() {
        let conn = empty_db();
        let stats = overview_stats(&conn, &DateRangeFilter::default(), date(2025, 3, 31)).unwrap();

        assert_eq!(stats.total_revenue, 0.0);
        assert_eq!(stats.profit_margin, 0.0);
        assert_eq!(stats.monthly_growth, 0.0);
    }

    #[test]
    fn test_breakdowns() {
        let conn = seeded_db();
        let filter = custom(date(2025, 1, 1), date(2025, 3, 31));

        let revenue = revenue_breakdown(&conn, &filter, date(2025, 3, 31)).unwrap();
        assert_eq!(revenue.membership, 2400.0);
        assert_eq!(revenue.personal_training, 300.0);
        assert_eq!(revenue.class_fees, 310.0);
        assert_eq!(revenue.product_sales, 300.0);

        let expenses = expense_breakdown(&conn, &filter, date(2025, 3, 31)).unwrap();
        assert_eq!(expenses.rent, 1500.0);
        assert_eq!(expenses.staff_salary, 620.0);
        assert_eq!(expenses.marketing, 340.0);
        assert_eq!(expenses.utilities, 0.0);
    }

    #[test]
    fn test_monthly_trend_zero_fills() {
        let conn = seeded_db();
        let trend = monthly_trend(&conn, 5, date(2025, 4, 10)).unwrap();

        let labels: Vec<_> = trend.iter().map(|t| t.month.as_str()).collect();
        assert_eq!(labels, vec!["Dec 2024", "Jan 2025", "Feb 2025", "Mar 2025", "Apr 2025"]);

        assert_eq!(trend[0].revenue, 0.0);
        assert_eq!(trend[1].revenue, 1000.0);
        assert_eq!(trend[1].expenses, 800.0);
        assert_eq!(trend[2].revenue, 1100.0);
        assert_eq!(trend[3].revenue, 1210.0);
        assert_eq!(trend[3].profit, 370.0);
        assert_eq!(trend[4].revenue, 0.0);
    }

    #[test]
    fn test_forecast_history_includes_current_month() {
        let conn = seeded_db();
        let history = forecast_history(&conn, 3, date(2025, 3, 20)).unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].month_label, "Jan 2025");
        assert_eq!(history[2].month_label, "Mar 2025");
        assert_eq!(history[2].revenue, 1210.0);
        assert_eq!(history[2].expenses, 840.0);

        // A quiet current month stays in as a zero month
        let history = forecast_history(&conn, 4, date(2025, 4, 10)).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].month_label, "Apr 2025");
        assert_eq!(history[3].revenue, 0.0);
    }

    #[test]
    fn test_forecast_history_drops_months_before_first_activity() {
        let conn = seeded_db();
        // Six months back from March reaches into Oct 2024, before any data
        let history = forecast_history(&conn, 6, date(2025, 3, 20)).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].month_label, "Jan 2025");

        assert!(forecast_history(&empty_db(), 6, date(2025, 4, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_forecast_starts_right_after_last_history_month() {
        let conn = seeded_db();
        let today = date(2025, 3, 20);
        let history = forecast_history(&conn, 6, today).unwrap();

        let result = crate::forecast::forecast(
            &history,
            2,
            today,
            &crate::assumptions::SeasonalityTable::default(),
        )
        .unwrap();

        assert_eq!(history.last().unwrap().month_label, "Mar 2025");
        assert_eq!(result.points[0].month_label, "April 2025");
        assert!((result.points[0].predicted_revenue - 1331.0).abs() < 1e-6);
        assert!((result.points[0].predicted_expenses - 860.74).abs() < 0.01);
        assert_eq!(result.points[1].month_label, "May 2025");
    }

    #[test]
    fn test_monthly_trend_rejects_long_window() {
        let conn = seeded_db();
        let err = monthly_trend(&conn, MAX_TREND_MONTHS + 1, date(2025, 4, 10)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            monthly_trend(&conn, MAX_TREND_MONTHS, date(2025, 4, 10)).unwrap().len(),
            MAX_TREND_MONTHS as usize
        );
    }

    #[test]
    fn test_cash_flow_rejects_out_of_range_days() {
        let conn = seeded_db();

        let err = cash_flow(&conn, u32::MAX, date(2025, 4, 10)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(cash_flow(&conn, MAX_WINDOW_DAYS + 1, date(2025, 4, 10)).is_err());
        assert_eq!(
            cash_flow(&conn, MAX_WINDOW_DAYS, date(2025, 4, 10)).unwrap().len(),
            MAX_WINDOW_DAYS as usize
        );
    }

    #[test]
    fn test_previous_range_out_of_bounds() {
        let range = DateRange {
            start: NaiveDate::MIN,
            end: NaiveDate::MIN + Duration::days(10),
        };
        assert!(range.previous().is_err());
    }

    #[test]
    fn test_cash_flow_cumulative() {
        let conn = empty_db();
        insert_income(
            &conn,
            &[income(date(2025, 3, 2), IncomeType::Membership, 100.0, "cash", "a")],
        )
        .unwrap();
        crate::db::insert_expenses(
            &conn,
            &[expense(date(2025, 3, 3), ExpenseCategory::Utilities, 30.0, "b")],
        )
        .unwrap();

        let flow = cash_flow(&conn, 3, date(2025, 3, 3)).unwrap();

        assert_eq!(flow.len(), 3);
        assert_eq!(flow[0].date, date(2025, 3, 1));
        assert_eq!(flow[0].cumulative, 0.0);
        assert_eq!(flow[1].net_flow, 100.0);
        assert_eq!(flow[2].net_flow, -30.0);
        assert_eq!(flow[2].cumulative, 70.0);
    }

    #[test]
    fn test_budget_variance_and_targets() {
        let conn = empty_db();
        BudgetAllocation {
            budget_id: 0,
            budget_year: 2025,
            budget_month: 3,
            category: "marketing".to_string(),
            allocated_amount: 400.0,
            actual_amount: 340.0,
        }
        .insert(&conn)
        .unwrap();

        for (kind, target, actual) in [
            ("revenue", 1000.0, 1210.0),
            ("profit", 400.0, 370.0),
            ("new_members", 10.0, 3.0),
        ] {
            FinancialTarget {
                target_id: 0,
                target_year: 2025,
                target_month: 3,
                target_type: kind.to_string(),
                target_value: target,
                actual_value: actual,
            }
            .insert(&conn)
            .unwrap();
        }

        let variance = budget_variance(&conn, 2025, Some(3)).unwrap();
        assert_eq!(variance.len(), 1);
        assert_eq!(variance[0].variance, -60.0);
        assert_eq!(variance[0].variance_percentage, -15.0);
        assert!(budget_variance(&conn, 2025, Some(4)).unwrap().is_empty());

        let targets = financial_targets(&conn, 2025, None).unwrap();
        let status: HashMap<_, _> = targets
            .iter()
            .map(|t| (t.target_type.as_str(), t.status))
            .collect();
        assert_eq!(status["revenue"], TargetStatus::Achieved);
        assert_eq!(status["profit"], TargetStatus::OnTrack);
        assert_eq!(status["new_members"], TargetStatus::Behind);
    }

    #[test]
    fn test_payment_methods_sorted_desc() {
        let conn = seeded_db();
        let methods = payment_method_distribution(
            &conn,
            &custom(date(2025, 1, 1), date(2025, 3, 31)),
            date(2025, 3, 31),
        )
        .unwrap();

        assert_eq!(methods[0].method, "card");
        assert_eq!(methods[0].amount, 2400.0);
        assert_eq!(methods[0].transaction_count, 3);
        for pair in methods.windows(2) {
            assert!(pair[0].amount >= pair[1].amount);
        }
        let total: f64 = methods.iter().map(|m| m.percentage).sum();
        assert!((total - 100.0).abs() < 0.05);
    }

    #[test]
    fn test_recent_transactions_newest_first() {
        let conn = seeded_db();
        let recent = recent_transactions(&conn, 3).unwrap();

        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].date, date(2025, 3, 25));
        assert_eq!(recent[0].kind, TransactionKind::Expense);
        assert_eq!(recent[0].category, "marketing");
        assert!(recent[0].id.starts_with("exp-"));
        assert_eq!(recent[1].date, date(2025, 3, 12));
        assert_eq!(recent[1].kind, TransactionKind::Income);
    }

    #[test]
    fn test_insight_rules() {
        let stats = FinanceOverviewStats {
            total_revenue: 1000.0,
            total_expenses: 950.0,
            net_profit: 50.0,
            profit_margin: 5.0,
            monthly_growth: -12.0,
        };
        let revenue = RevenueBreakdown {
            membership: 900.0,
            personal_training: 100.0,
            ..Default::default()
        };
        let expenses = ExpenseBreakdown {
            staff_salary: 600.0,
            rent: 350.0,
            ..Default::default()
        };

        let insights = insights_from(&stats, &revenue, &expenses);

        assert_eq!(insights.len(), MAX_FINANCE_INSIGHTS);
        assert_eq!(insights[0].title, "Low Profit Margin");
        assert_eq!(insights[0].impact_level, ImpactLevel::High);
        assert_eq!(insights[1].title, "Significant Revenue Decline");
        assert!(insights[1].text.contains("12.0%"));
        assert_eq!(insights[2].title, "High Dependence on Memberships");
        assert_eq!(insights[3].title, "High Staff Costs");
    }

    #[test]
    fn test_finance_insights_from_database() {
        let conn = seeded_db();
        let insights = finance_insights(
            &conn,
            &custom(date(2025, 3, 1), date(2025, 3, 31)),
            date(2025, 3, 31),
        )
        .unwrap();

        // margin 30.58% (healthy), growth 10% (no rule), membership 74% (no rule),
        // salary 0%, marketing 40%
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, "Healthy Profit Margin");
    }
}
