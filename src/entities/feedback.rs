// 💬 Feedback Rows - member feedback and the topics extracted from it

use crate::error::AppError;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }
}

impl FromStr for Sentiment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sentiment::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::invalid_input(format!("unknown sentiment: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback_id: i64,
    pub member_id: Option<i64>,
    pub feedback_date: NaiveDate,
    /// "Class", "Trainer", "Facility", "General", ...
    pub feedback_type: String,
    pub content: String,
    pub rating: Option<f64>,
    pub sentiment: String,
    /// -1.0 (negative) ..= 1.0 (positive)
    pub sentiment_score: f64,
}

impl Feedback {
    pub const COLUMNS: &'static str = "feedback_id, member_id, feedback_date, feedback_type, \
                                       content, rating, sentiment, sentiment_score";

    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO feedback (
                member_id, feedback_date, feedback_type, content,
                rating, sentiment, sentiment_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.member_id,
                self.feedback_date,
                self.feedback_type,
                self.content,
                self.rating,
                self.sentiment,
                self.sentiment_score,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Columns in [`Feedback::COLUMNS`] order
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Feedback {
            feedback_id: row.get(0)?,
            member_id: row.get(1)?,
            feedback_date: row.get(2)?,
            feedback_type: row.get(3)?,
            content: row.get(4)?,
            rating: row.get(5)?,
            sentiment: row.get(6)?,
            sentiment_score: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTopic {
    pub topic_id: i64,
    pub feedback_id: i64,
    pub topic: String,
    pub sentiment_score: f64,
    pub confidence: f64,
}

impl FeedbackTopic {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO feedback_topic (feedback_id, topic, sentiment_score, confidence)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.feedback_id,
                self.topic,
                self.sentiment_score,
                self.confidence,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
