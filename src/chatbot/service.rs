// 💬 Chatbot Service - one chat turn from user message to saved bot reply
//
// A turn is split in three so the database lock is never held while the
// language model is thinking:
//   prepare (db) -> reply (llm) -> finish (db)

use super::intent::{Classification, Intent, IntentClassifier};
use crate::entities::{ChatMessage, ChatSession, MessageType};
use crate::error::{AppError, AppResult};
use crate::feedback::{self, FeedbackFilter};
use crate::finance::{self, DateRangeFilter, Period};
use crate::inventory;
use crate::llm::LlmClient;
use crate::{members, products, trainers};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are GymBot, an assistant for a gym management dashboard.";

pub const FALLBACK_REPLY: &str =
    "Sorry, I had trouble processing your request. Please try again later.";

/// Messages fetched for the prompt; only the last few make it in
const RECENT_MESSAGES: usize = 5;
const HISTORY_LINES: usize = 3;
const RECENT_ROWS: u32 = 5;
const EXCERPT_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: i64,
    pub intent: Intent,
    pub context_used: Value,
    pub data_sources: Vec<String>,
}

/// Everything gathered from the database before calling the model
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTurn {
    pub session_id: i64,
    pub message: String,
    pub classification: Classification,
    pub context: Value,
    /// "user: ..." / "bot: ..." lines, oldest first
    pub history: Vec<String>,
}

pub struct ChatbotService {
    classifier: IntentClassifier,
    llm: Arc<dyn LlmClient>,
}

impl ChatbotService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_classifier(IntentClassifier::default(), llm)
    }

    pub fn with_classifier(classifier: IntentClassifier, llm: Arc<dyn LlmClient>) -> Self {
        ChatbotService { classifier, llm }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Resolve the session, store the user message and collect context
    pub fn prepare(
        &self,
        conn: &Connection,
        request: &ChatRequest,
        now: DateTime<Utc>,
    ) -> AppResult<PreparedTurn> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::invalid_input("message must not be empty"));
        }

        let session =
            ChatSession::get_or_create(conn, request.session_id, request.user_id.as_deref(), now)?;
        ChatMessage::save(conn, session.session_id, MessageType::User, message, None, now)?;

        let classification = self.classifier.classify(message);
        let context = gather_context(conn, classification.intent, now.date_naive())?;

        let history = ChatMessage::recent(conn, session.session_id, RECENT_MESSAGES)?
            .into_iter()
            .map(|m| format!("{}: {}", m.message_type, m.content))
            .collect();

        Ok(PreparedTurn {
            session_id: session.session_id,
            message: message.to_string(),
            classification,
            context,
            history,
        })
    }

    /// Ask the model; any failure becomes the apology text
    pub async fn reply(&self, turn: &PreparedTurn) -> String {
        let prompt = build_prompt(turn);

        match self.llm.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, session_id = turn.session_id, "chat completion failed");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Store the bot reply together with the context it was based on
    pub fn finish(
        &self,
        conn: &Connection,
        turn: PreparedTurn,
        reply: String,
        now: DateTime<Utc>,
    ) -> AppResult<ChatResponse> {
        ChatMessage::save(
            conn,
            turn.session_id,
            MessageType::Bot,
            &reply,
            Some(&turn.context),
            now,
        )?;

        info!(
            session_id = turn.session_id,
            intent = turn.classification.intent.as_str(),
            "chat turn completed"
        );

        Ok(ChatResponse {
            response: reply,
            session_id: turn.session_id,
            intent: turn.classification.intent,
            context_used: turn.context,
            data_sources: turn
                .classification
                .intent
                .data_sources()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }

    /// Full turn against a shared connection
    pub async fn handle(
        &self,
        db: &Mutex<Connection>,
        request: &ChatRequest,
        now: DateTime<Utc>,
    ) -> AppResult<ChatResponse> {
        let turn = {
            let conn = lock(db)?;
            self.prepare(&conn, request, now)?
        };

        let reply = self.reply(&turn).await;

        let conn = lock(db)?;
        self.finish(&conn, turn, reply, now)
    }
}

fn lock(db: &Mutex<Connection>) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
    db.lock()
        .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
}

pub fn build_prompt(turn: &PreparedTurn) -> String {
    let skip = turn.history.len().saturating_sub(HISTORY_LINES);
    let history = if turn.history.is_empty() {
        "No previous conversation".to_string()
    } else {
        turn.history[skip..].join("\n")
    };

    let context =
        serde_json::to_string_pretty(&turn.context).unwrap_or_else(|_| turn.context.to_string());

    format!(
        "You help gym staff find information about their gym in a friendly, informative way.\n\n\
         User question: \"{}\"\n\
         Detected intent: {}\n\n\
         Recent conversation:\n{}\n\n\
         Available data:\n{}\n\n\
         Answer using the exact figures from the data above (retention_rate for retention, \
         profit_margin for margins, total_equipment_value for asset value). \
         If something is not in the data, say that it is not available. \
         Do not estimate or invent numbers.",
        turn.message,
        turn.classification.intent.as_str(),
        history,
        context
    )
}

// ============================================================================
// CONTEXT
// ============================================================================

/// JSON snapshot of the data relevant to an intent
pub fn gather_context(conn: &Connection, intent: Intent, today: NaiveDate) -> AppResult<Value> {
    Ok(match intent {
        Intent::MemberInfo => member_context(conn, today)?,
        Intent::TrainerInfo => trainer_context(conn)?,
        Intent::InventoryInfo => inventory_context(conn)?,
        Intent::FinanceInfo => finance_context(conn, today)?,
        Intent::FeedbackInfo => feedback_context(conn)?,
        Intent::ProductInfo => product_context(conn, today)?,
        Intent::GeneralStats => json!({
            "members": member_context(conn, today)?,
            "trainers": trainer_context(conn)?,
            "inventory": inventory_context(conn)?,
            "finance": finance_context(conn, today)?,
        }),
        Intent::Greeting | Intent::Help | Intent::General => json!({}),
    })
}

fn member_context(conn: &Connection, today: NaiveDate) -> AppResult<Value> {
    let stats = members::member_stats(conn, today)?;
    let segments = members::member_segments(conn)?;

    let mut stmt =
        conn.prepare("SELECT name, join_date FROM member ORDER BY join_date DESC LIMIT ?1")?;
    let recent = stmt
        .query_map([RECENT_ROWS], |row| {
            Ok(json!({
                "name": row.get::<_, String>(0)?,
                "join_date": row.get::<_, NaiveDate>(1)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let distribution: Vec<Value> = segments
        .iter()
        .map(|s| json!({ "goal": s.name, "members": s.value }))
        .collect();

    Ok(json!({
        "total_members": stats.total,
        "active_members": stats.active,
        "new_members_this_month": stats.new_members,
        "retention_rate": stats.retention,
        "recent_members": recent,
        "membership_distribution": distribution,
    }))
}

fn trainer_context(conn: &Connection) -> AppResult<Value> {
    let perf = trainers::trainer_performance(conn)?;

    Ok(json!({
        "total_trainers": perf.total_trainers,
        "active_trainers": perf.active_trainers,
        "average_rating": perf.average_rating,
        "top_trainers": perf.top_rated,
        "specialization_distribution": perf.specializations,
    }))
}

fn inventory_context(conn: &Connection) -> AppResult<Value> {
    let summary = inventory::inventory_summary(conn)?;
    let categories = inventory::category_distribution(conn)?;

    let mut stmt = conn.prepare(
        "SELECT name, status, purchase_date FROM equipment
         ORDER BY purchase_date DESC LIMIT ?1",
    )?;
    let recent = stmt
        .query_map([RECENT_ROWS], |row| {
            Ok(json!({
                "name": row.get::<_, String>(0)?,
                "status": row.get::<_, String>(1)?,
                "purchase_date": row.get::<_, Option<NaiveDate>>(2)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "total_equipment": summary.total_equipment,
        "working_equipment": summary.total_active_equipment,
        "broken_equipment": summary.total_broken_equipment,
        "in_maintenance": summary.total_in_maintenance_equipment,
        "needs_replacement": summary.total_replacement_needed_equipment,
        "backup_stock": summary.total_backup_stock,
        "total_equipment_value": summary.total_equipment_value,
        "category_distribution": categories,
        "recent_equipment": recent,
    }))
}

fn finance_context(conn: &Connection, today: NaiveDate) -> AppResult<Value> {
    let year_to_date = DateRangeFilter::period(Period::YearToDate);
    let overview = finance::overview_stats(conn, &year_to_date, today)?;
    let revenue = finance::revenue_breakdown(conn, &year_to_date, today)?;
    let expenses = finance::expense_breakdown(conn, &year_to_date, today)?;

    Ok(json!({
        "period": "year to date",
        "total_income": overview.total_revenue,
        "total_expenses": overview.total_expenses,
        "net_profit": overview.net_profit,
        "profit_margin": overview.profit_margin,
        "revenue_growth": overview.monthly_growth,
        "income_breakdown": revenue,
        "expense_breakdown": expenses,
    }))
}

fn feedback_context(conn: &Connection) -> AppResult<Value> {
    let summary = feedback::feedback_summary(conn)?;
    let recent = feedback::list_feedback(
        conn,
        &FeedbackFilter {
            limit: RECENT_ROWS,
            ..Default::default()
        },
    )?;

    let excerpts: Vec<Value> = recent
        .iter()
        .map(|item| {
            json!({
                "content": item.feedback.content.chars().take(EXCERPT_CHARS).collect::<String>(),
                "rating": item.feedback.rating,
                "sentiment": item.feedback.sentiment,
            })
        })
        .collect();

    Ok(json!({
        "total_feedback": summary.total_feedback,
        "positive_feedback": summary.positive_count,
        "negative_feedback": summary.negative_count,
        "average_rating": summary.avg_rating,
        "recent_feedback": excerpts,
    }))
}

fn product_context(conn: &Connection, today: NaiveDate) -> AppResult<Value> {
    let stats = products::product_stats(conn, today)?;
    let top = products::top_sales(conn, RECENT_ROWS)?;

    Ok(json!({
        "active_products": stats.total_products,
        "supplements": stats.total_supplements,
        "units_sold_last_7_days": stats.weekly_sales,
        "low_stock_products": stats.low_stock,
        "top_selling": top,
    }))
}
