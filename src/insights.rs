// 💡 AI Insights - language-model commentary on membership and finance numbers

use crate::error::AppError;
use crate::finance::{ExpenseBreakdown, FinanceOverviewStats, MonthlyTrendData, RevenueBreakdown};
use crate::insight_cache::InsightCache;
use crate::llm::LlmClient;
use crate::members::{MemberActivity, MemberStats};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are an expert in gym member behavior analytics.";

const FINANCE_SYSTEM_PROMPT: &str =
    "You are a gym financial analyst who turns bookkeeping numbers into business insights.";

static JSON_ARRAY: OnceLock<Regex> = OnceLock::new();
static JSON_OBJECT: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub recommendation: Option<String>,
    /// Tailwind border class, e.g. "border-blue-500"
    #[serde(rename = "borderColor", default)]
    pub border_color: Option<String>,
}

impl Insight {
    /// Placeholder shown on the dashboard when generation fails
    pub fn unavailable(reason: &str) -> Self {
        Insight {
            title: "Insight unavailable".to_string(),
            text: reason.to_string(),
            recommendation: None,
            border_color: Some("border-red-500".to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum InsightError {
    #[error(transparent)]
    Llm(#[from] AppError),

    #[error("model reply did not contain a JSON array")]
    NoJsonArray,

    #[error("model reply did not contain a JSON object")]
    NoJsonObject,

    #[error("model reply contained invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Decode the widest span of `reply` matched by `pattern`
fn decode_span<T: DeserializeOwned>(
    reply: &str,
    pattern: &Regex,
    missing: InsightError,
) -> Result<T, InsightError> {
    let span = pattern.find(reply).ok_or(missing)?;
    Ok(serde_json::from_str(span.as_str())?)
}

/// Fresh cached value, or a new generation stored on success. Failures are
/// logged and replaced by `fallback`, never cached.
async fn cached_or_generate<T, Fut>(
    cache: &InsightCache<T>,
    what: &str,
    generate: Fut,
    fallback: impl FnOnce(&InsightError) -> T,
) -> T
where
    T: Clone,
    Fut: Future<Output = Result<T, InsightError>>,
{
    if let Some(value) = cache.get() {
        return value;
    }

    match generate.await {
        Ok(value) => {
            info!(what, "generated insights");
            cache.put(value.clone());
            value
        }
        Err(e) => {
            warn!(what, error = %e, "insight generation failed");
            fallback(&e)
        }
    }
}

// ============================================================================
// MEMBERS
// ============================================================================

pub fn member_insight_prompt(stats: &MemberStats, activity: &[MemberActivity]) -> String {
    let trend = activity
        .iter()
        .map(|a| format!("{}: {} members", a.month, a.value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Gym statistics:\n\
         - Total: {}\n\
         - Active: {}\n\
         - Retention: {}%\n\
         - New this month: {}\n\
         Monthly trend:\n{}\n\n\
         Write 3 short insights as JSON in this format:\n\
         [\n  {{\n    \"title\": \"Insight title\",\n    \"text\": \"Short explanation\",\n    \
         \"recommendation\": \"Concrete, actionable recommendation\",\n    \
         \"borderColor\": \"Tailwind border color class, e.g. border-blue-500\"\n  }}\n]\n\
         Keep the language concise and professional for a gym business dashboard.",
        stats.total, stats.active, stats.retention, stats.new_members, trend
    )
}

/// Pull the first `[...]` span out of a free-form reply and decode it
pub fn parse_insights(reply: &str) -> Result<Vec<Insight>, InsightError> {
    let pattern = JSON_ARRAY
        .get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("JSON array regex should be valid"));
    decode_span(reply, pattern, InsightError::NoJsonArray)
}

pub async fn generate_member_insights(
    stats: &MemberStats,
    activity: &[MemberActivity],
    llm: &dyn LlmClient,
) -> Result<Vec<Insight>, InsightError> {
    let prompt = member_insight_prompt(stats, activity);
    let reply = llm.complete(SYSTEM_PROMPT, &prompt).await?;
    parse_insights(&reply)
}

/// Cached insights when fresh, otherwise a new generation. Failures are
/// reported as a single placeholder insight and never cached.
pub async fn cached_member_insights(
    cache: &InsightCache<Vec<Insight>>,
    stats: &MemberStats,
    activity: &[MemberActivity],
    llm: &dyn LlmClient,
) -> Vec<Insight> {
    cached_or_generate(
        cache,
        "member",
        generate_member_insights(stats, activity, llm),
        |e| vec![Insight::unavailable(&e.to_string())],
    )
    .await
}

// ============================================================================
// FINANCE
// ============================================================================

/// Plain-language commentary on the books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceAiInsights {
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub trends: Vec<String>,
}

impl FinanceAiInsights {
    /// Generic advice served while the model is unreachable
    pub fn fallback() -> Self {
        let owned =
            |lines: &[&str]| -> Vec<String> { lines.iter().map(|l| l.to_string()).collect() };
        FinanceAiInsights {
            insights: owned(&[
                "Financial data is still being analysed",
                "Recorded activity looks normal for the period",
                "Ongoing monitoring is needed to spot optimisation chances",
            ]),
            recommendations: owned(&[
                "Review the books weekly",
                "Track the key performance metrics",
                "Prepare a plan for the coming period",
            ]),
            trends: owned(&[
                "Trend data is being processed",
                "A full analysis will be available shortly",
            ]),
        }
    }
}

/// Snapshot of the numbers the finance prompt is built from
pub struct FinanceSnapshot<'a> {
    pub overview: &'a FinanceOverviewStats,
    pub revenue: &'a RevenueBreakdown,
    pub expenses: &'a ExpenseBreakdown,
    pub monthly_trend: &'a [MonthlyTrendData],
    pub period: &'a str,
}

pub fn finance_insight_prompt(snapshot: &FinanceSnapshot<'_>) -> String {
    let data = serde_json::json!({
        "overview": snapshot.overview,
        "revenue_breakdown": snapshot.revenue,
        "expense_breakdown": snapshot.expenses,
        "monthly_trend": snapshot.monthly_trend,
        "period": snapshot.period,
    });

    format!(
        "Analyse the following gym financial data:\n\n{:#}\n\n\
         Reply with JSON in this format:\n\
         {{\n  \"insights\": [\"insight 1\", \"insight 2\", \"insight 3\"],\n  \
         \"recommendations\": [\"recommendation 1\", \"recommendation 2\", \"recommendation 3\"],\n  \
         \"trends\": [\"trend 1\", \"trend 2\"]\n}}\n\
         Focus on revenue and expense trends, operating efficiency, room to grow profit \
         and strategic next steps.",
        data
    )
}

/// Pull the first `{...}` span out of a free-form reply and decode it
pub fn parse_finance_insights(reply: &str) -> Result<FinanceAiInsights, InsightError> {
    let pattern = JSON_OBJECT
        .get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("JSON object regex should be valid"));
    decode_span(reply, pattern, InsightError::NoJsonObject)
}

pub async fn generate_finance_insights(
    snapshot: &FinanceSnapshot<'_>,
    llm: &dyn LlmClient,
) -> Result<FinanceAiInsights, InsightError> {
    let prompt = finance_insight_prompt(snapshot);
    let reply = llm.complete(FINANCE_SYSTEM_PROMPT, &prompt).await?;
    parse_finance_insights(&reply)
}

/// Like [`cached_member_insights`], with [`FinanceAiInsights::fallback`]
/// standing in for failed generations
pub async fn cached_finance_insights(
    cache: &InsightCache<FinanceAiInsights>,
    snapshot: &FinanceSnapshot<'_>,
    llm: &dyn LlmClient,
) -> FinanceAiInsights {
    cached_or_generate(
        cache,
        "finance",
        generate_finance_insights(snapshot, llm),
        |_| FinanceAiInsights::fallback(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fake::ScriptedLlm;
    use std::time::Duration;

    fn stats() -> MemberStats {
        MemberStats {
            total: 120,
            active: 90,
            new_members: 8,
            retention: 75.0,
        }
    }

    fn activity() -> Vec<MemberActivity> {
        vec![
            MemberActivity {
                month: "2025-01".to_string(),
                value: 10,
            },
            MemberActivity {
                month: "2025-02".to_string(),
                value: 14,
            },
        ]
    }

    const REPLY: &str = r#"Here you go:
[
  {"title": "Strong retention", "text": "75% of members stay.", "recommendation": "Reward loyalty", "borderColor": "border-green-500"},
  {"title": "Growth", "text": "Signups are rising."}
]
Hope this helps!"#;

    #[test]
    fn test_prompt_contains_numbers() {
        let prompt = member_insight_prompt(&stats(), &activity());
        assert!(prompt.contains("- Total: 120"));
        assert!(prompt.contains("- Retention: 75%"));
        assert!(prompt.contains("2025-02: 14 members"));
    }

    #[test]
    fn test_parse_insights_from_chatty_reply() {
        let insights = parse_insights(REPLY).unwrap();
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].border_color.as_deref(), Some("border-green-500"));
        assert_eq!(insights[1].recommendation, None);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            parse_insights("no json here"),
            Err(InsightError::NoJsonArray)
        ));
        assert!(matches!(
            parse_insights("[{\"title\": }]"),
            Err(InsightError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_cached_insights_reuse() {
        let llm = ScriptedLlm::replying(&[REPLY]);
        let cache = InsightCache::with_system_clock(Duration::from_secs(600));

        let first = cached_member_insights(&cache, &stats(), &activity(), &llm).await;
        let second = cached_member_insights(&cache, &stats(), &activity(), &llm).await;

        assert_eq!(first, second);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let llm = ScriptedLlm::replying(&["sorry, no insights today", REPLY]);
        let cache = InsightCache::with_system_clock(Duration::from_secs(600));

        let failed = cached_member_insights(&cache, &stats(), &activity(), &llm).await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].title, "Insight unavailable");
        assert!(cache.get().is_none());

        let retried = cached_member_insights(&cache, &stats(), &activity(), &llm).await;
        assert_eq!(retried.len(), 2);
        assert_eq!(llm.calls(), 2);
    }

    fn overview() -> FinanceOverviewStats {
        FinanceOverviewStats {
            total_revenue: 3310.0,
            total_expenses: 2460.0,
            net_profit: 850.0,
            profit_margin: 25.68,
            monthly_growth: 10.0,
        }
    }

    fn revenue() -> RevenueBreakdown {
        RevenueBreakdown {
            membership: 3310.0,
            personal_training: 0.0,
            class_fees: 0.0,
            product_sales: 0.0,
        }
    }

    fn expenses() -> ExpenseBreakdown {
        ExpenseBreakdown {
            rent: 2460.0,
            utilities: 0.0,
            staff_salary: 0.0,
            equipment: 0.0,
            marketing: 0.0,
            maintenance: 0.0,
        }
    }

    const FINANCE_REPLY: &str = r#"Sure! {"insights": ["Revenue grew 10%"], "recommendations": ["Cut rent"], "trends": ["Membership dominates"]} Let me know."#;

    #[test]
    fn test_finance_prompt_embeds_numbers() {
        let (overview, revenue, expenses) = (overview(), revenue(), expenses());
        let snapshot = FinanceSnapshot {
            overview: &overview,
            revenue: &revenue,
            expenses: &expenses,
            monthly_trend: &[],
            period: "year_to_date",
        };

        let prompt = finance_insight_prompt(&snapshot);
        assert!(prompt.contains("\"total_revenue\": 3310.0"));
        assert!(prompt.contains("\"rent\": 2460.0"));
        assert!(prompt.contains("year_to_date"));
    }

    #[test]
    fn test_parse_finance_insights() {
        let parsed = parse_finance_insights(FINANCE_REPLY).unwrap();
        assert_eq!(parsed.insights, vec!["Revenue grew 10%"]);
        assert_eq!(parsed.trends.len(), 1);

        // Missing lists default to empty
        let partial = parse_finance_insights(r#"{"insights": ["only this"]}"#).unwrap();
        assert!(partial.recommendations.is_empty());

        assert!(matches!(
            parse_finance_insights("nothing useful"),
            Err(InsightError::NoJsonObject)
        ));
    }

    #[tokio::test]
    async fn test_finance_insights_fallback_then_cache() {
        let (overview, revenue, expenses) = (overview(), revenue(), expenses());
        let snapshot = FinanceSnapshot {
            overview: &overview,
            revenue: &revenue,
            expenses: &expenses,
            monthly_trend: &[],
            period: "year_to_date",
        };
        let llm = ScriptedLlm::replying(&["no json", FINANCE_REPLY]);
        let cache = InsightCache::with_system_clock(Duration::from_secs(600));

        let fallback = cached_finance_insights(&cache, &snapshot, &llm).await;
        assert_eq!(fallback, FinanceAiInsights::fallback());
        assert!(cache.get().is_none());

        let fresh = cached_finance_insights(&cache, &snapshot, &llm).await;
        let again = cached_finance_insights(&cache, &snapshot, &llm).await;
        assert_eq!(fresh.recommendations, vec!["Cut rent"]);
        assert_eq!(fresh, again);
        assert_eq!(llm.calls(), 2);
        println!("✅ Finance insight caching PASSED");
    }
}
