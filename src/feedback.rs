// 💬 Feedback Dashboard - sentiment summary, topics and the feedback list

use crate::entities::{Feedback, Member, Sentiment};
use crate::error::{AppError, AppResult};
use crate::finance::{month_label, trailing_month_starts};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn share(count: i64, total: i64) -> f64 {
    if total > 0 {
        round1(count as f64 / total as f64 * 100.0)
    } else {
        0.0
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total_feedback: i64,
    pub positive_count: i64,
    pub neutral_count: i64,
    pub negative_count: i64,
    pub positive_percentage: f64,
    pub neutral_percentage: f64,
    pub negative_percentage: f64,
    pub avg_rating: f64,
}

pub fn feedback_summary(conn: &Connection) -> AppResult<FeedbackSummary> {
    let (total, positive, neutral, negative, avg_rating): (i64, i64, i64, i64, Option<f64>) =
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN sentiment = ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN sentiment = ?2 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN sentiment = ?3 THEN 1 ELSE 0 END), 0),
                    AVG(rating)
             FROM feedback",
            [
                Sentiment::Positive.as_str(),
                Sentiment::Neutral.as_str(),
                Sentiment::Negative.as_str(),
            ],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;

    Ok(FeedbackSummary {
        total_feedback: total,
        positive_count: positive,
        neutral_count: neutral,
        negative_count: negative,
        positive_percentage: share(positive, total),
        neutral_percentage: share(neutral, total),
        negative_percentage: share(negative, total),
        avg_rating: round1(avg_rating.unwrap_or(0.0)),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub sentiment: String,
    pub count: i64,
    pub percentage: f64,
}

pub fn sentiment_distribution(conn: &Connection) -> AppResult<Vec<SentimentDistribution>> {
    let mut stmt = conn.prepare(
        "SELECT sentiment, COUNT(*) FROM feedback GROUP BY sentiment ORDER BY COUNT(*) DESC, sentiment",
    )?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let total: i64 = rows.iter().map(|(_, count)| count).sum();

    Ok(rows
        .into_iter()
        .map(|(sentiment, count)| SentimentDistribution {
            sentiment,
            count,
            percentage: share(count, total),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAnalysisItem {
    pub topic: String,
    pub frequency: i64,
    pub sentiment_score: f64,
}

/// Topics by how often they come up, with their mean sentiment score
pub fn topic_analysis(conn: &Connection) -> AppResult<Vec<TopicAnalysisItem>> {
    let mut stmt = conn.prepare(
        "SELECT topic, COUNT(*), AVG(sentiment_score) FROM feedback_topic
         GROUP BY topic
         ORDER BY COUNT(*) DESC, topic",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(TopicAnalysisItem {
                topic: row.get(0)?,
                frequency: row.get(1)?,
                sentiment_score: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// LIST
// ============================================================================

/// Optional filters for the feedback list; all conditions are ANDed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackFilter {
    pub member_id: Option<i64>,
    pub feedback_type: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Case-insensitive substring of the content
    pub search: Option<String>,
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

impl Default for FeedbackFilter {
    fn default() -> Self {
        FeedbackFilter {
            member_id: None,
            feedback_type: None,
            sentiment: None,
            start_date: None,
            end_date: None,
            search: None,
            skip: 0,
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackListItem {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub member_name: String,
}

/// Newest feedback first
pub fn list_feedback(conn: &Connection, filter: &FeedbackFilter) -> AppResult<Vec<FeedbackListItem>> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(member_id) = filter.member_id {
        conditions.push("f.member_id = ?");
        values.push(Value::Integer(member_id));
    }
    if let Some(kind) = &filter.feedback_type {
        conditions.push("f.feedback_type = ?");
        values.push(Value::Text(kind.clone()));
    }
    if let Some(sentiment) = filter.sentiment {
        conditions.push("f.sentiment = ?");
        values.push(Value::Text(sentiment.as_str().to_string()));
    }
    if let Some(start) = filter.start_date {
        conditions.push("f.feedback_date >= ?");
        values.push(Value::Text(start.to_string()));
    }
    if let Some(end) = filter.end_date {
        conditions.push("f.feedback_date <= ?");
        values.push(Value::Text(end.to_string()));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("lower(f.content) LIKE ?");
        values.push(Value::Text(format!("%{}%", search.trim().to_lowercase())));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    values.push(Value::Integer(i64::from(filter.limit)));
    values.push(Value::Integer(i64::from(filter.skip)));

    let columns = Feedback::COLUMNS
        .split(", ")
        .map(|c| format!("f.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT {}, m.name
         FROM feedback f
         LEFT JOIN member m ON m.member_id = f.member_id
         {}
         ORDER BY f.feedback_date DESC, f.feedback_id DESC
         LIMIT ? OFFSET ?",
        columns, where_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(values), |row| {
            let name: Option<String> = row.get(8)?;
            Ok(FeedbackListItem {
                feedback: Feedback::from_row(row)?,
                member_name: name.unwrap_or_else(|| "Unknown Member".to_string()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

// ============================================================================
// TRENDS
// ============================================================================

/// Optional bounds for the daily trend; dates are inclusive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentTrendQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub feedback_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySentimentTrend {
    pub date: NaiveDate,
    /// The filtered type, or "All"
    pub feedback_type: String,
    pub positive: i64,
    pub neutral: i64,
    pub negative: i64,
    pub total: i64,
    pub avg_rating: f64,
}

/// Sentiment counts for every day that received feedback, oldest first
pub fn daily_sentiment_trends(
    conn: &Connection,
    query: &SentimentTrendQuery,
) -> AppResult<Vec<DailySentimentTrend>> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = vec![
        Value::Text(Sentiment::Positive.as_str().to_string()),
        Value::Text(Sentiment::Neutral.as_str().to_string()),
        Value::Text(Sentiment::Negative.as_str().to_string()),
    ];

    if let Some(start) = query.start_date {
        conditions.push("feedback_date >= ?");
        values.push(Value::Text(start.to_string()));
    }
    if let Some(end) = query.end_date {
        conditions.push("feedback_date <= ?");
        values.push(Value::Text(end.to_string()));
    }
    if let Some(kind) = &query.feedback_type {
        conditions.push("feedback_type = ?");
        values.push(Value::Text(kind.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT feedback_date,
                COALESCE(SUM(CASE WHEN sentiment = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN sentiment = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN sentiment = ? THEN 1 ELSE 0 END), 0),
                COUNT(*),
                AVG(rating)
         FROM feedback
         {}
         GROUP BY feedback_date
         ORDER BY feedback_date",
        where_clause
    );

    let feedback_type = query.feedback_type.clone().unwrap_or_else(|| "All".to_string());
    let mut stmt = conn.prepare(&sql)?;
    let trends = stmt
        .query_map(params_from_iter(values), |row| {
            let avg_rating: Option<f64> = row.get(5)?;
            Ok(DailySentimentTrend {
                date: row.get(0)?,
                feedback_type: feedback_type.clone(),
                positive: row.get(1)?,
                neutral: row.get(2)?,
                negative: row.get(3)?,
                total: row.get(4)?,
                avg_rating: round1(avg_rating.unwrap_or(0.0)),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(trends)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySentimentTrend {
    /// e.g. "Mar 2025"
    pub month: String,
    pub positive: i64,
    pub neutral: i64,
    pub negative: i64,
    pub total: i64,
    pub positive_percentage: f64,
    pub avg_rating: f64,
}

/// One entry per month for the last `months` months, current month
/// included; quiet months are zero-filled
pub fn monthly_sentiment_trends(
    conn: &Connection,
    months: u32,
    today: NaiveDate,
) -> AppResult<Vec<MonthlySentimentTrend>> {
    let month_starts = trailing_month_starts(months, today)?;
    let Some(first) = month_starts.first().copied() else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare(
        "SELECT substr(feedback_date, 1, 7) AS ym,
                COALESCE(SUM(CASE WHEN sentiment = ?1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN sentiment = ?2 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN sentiment = ?3 THEN 1 ELSE 0 END), 0),
                COUNT(*),
                AVG(rating)
         FROM feedback
         WHERE feedback_date >= ?4 AND feedback_date <= ?5
         GROUP BY ym",
    )?;
    let mut by_month: HashMap<String, (i64, i64, i64, i64, Option<f64>)> = stmt
        .query_map(
            params![
                Sentiment::Positive.as_str(),
                Sentiment::Neutral.as_str(),
                Sentiment::Negative.as_str(),
                first,
                today,
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    (row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?),
                ))
            },
        )?
        .collect::<Result<_, _>>()?;

    Ok(month_starts
        .into_iter()
        .map(|start| {
            let (positive, neutral, negative, total, avg_rating) = by_month
                .remove(&start.format("%Y-%m").to_string())
                .unwrap_or((0, 0, 0, 0, None));
            MonthlySentimentTrend {
                month: month_label(start),
                positive,
                neutral,
                negative,
                total,
                positive_percentage: share(positive, total),
                avg_rating: round1(avg_rating.unwrap_or(0.0)),
            }
        })
        .collect())
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub member_id: Option<i64>,
    pub feedback_date: NaiveDate,
    pub feedback_type: String,
    pub content: String,
    /// 1.0 ..= 5.0
    pub rating: f64,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub sentiment_score: f64,
}

impl NewFeedback {
    pub fn validate(&self) -> AppResult<()> {
        if self.feedback_type.trim().is_empty() {
            return Err(AppError::invalid_input("feedback_type must not be empty"));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::invalid_input("content must not be empty"));
        }
        if !(1.0..=5.0).contains(&self.rating) {
            return Err(AppError::invalid_input(format!(
                "rating must be between 1 and 5, got {}",
                self.rating
            )));
        }
        if !(-1.0..=1.0).contains(&self.sentiment_score) {
            return Err(AppError::invalid_input(format!(
                "sentiment_score must be between -1 and 1, got {}",
                self.sentiment_score
            )));
        }
        Ok(())
    }
}

/// Store a piece of feedback and return the stored row
pub fn create_feedback(conn: &Connection, new: &NewFeedback) -> AppResult<Feedback> {
    new.validate()?;

    if let Some(member_id) = new.member_id {
        if Member::find(conn, member_id)?.is_none() {
            return Err(AppError::not_found(format!("member {}", member_id)));
        }
    }

    let mut feedback = Feedback {
        feedback_id: 0,
        member_id: new.member_id,
        feedback_date: new.feedback_date,
        feedback_type: new.feedback_type.trim().to_string(),
        content: new.content.trim().to_string(),
        rating: Some(new.rating),
        sentiment: new.sentiment.as_str().to_string(),
        sentiment_score: new.sentiment_score,
    };
    feedback.feedback_id = feedback.insert(conn)?;

    info!(
        feedback_id = feedback.feedback_id,
        sentiment = %feedback.sentiment,
        "feedback recorded"
    );

    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{date, empty_db, seeded_db};

    #[test]
    fn test_feedback_summary() {
        let conn = seeded_db();
        let summary = feedback_summary(&conn).unwrap();

        assert_eq!(summary.total_feedback, 4);
        assert_eq!(summary.positive_count, 2);
        assert_eq!(summary.neutral_count, 1);
        assert_eq!(summary.negative_count, 1);
        assert_eq!(summary.positive_percentage, 50.0);
        assert_eq!(summary.negative_percentage, 25.0);
        // (5 + 2 + 3 + 5) / 4 = 3.75
        assert_eq!(summary.avg_rating, 3.8);
    }

    #[test]
    fn test_summary_empty() {
        let summary = feedback_summary(&empty_db()).unwrap();
        assert_eq!(summary.total_feedback, 0);
        assert_eq!(summary.positive_percentage, 0.0);
        assert_eq!(summary.avg_rating, 0.0);
    }

    #[test]
    fn test_sentiment_distribution() {
        let conn = seeded_db();
        let distribution = sentiment_distribution(&conn).unwrap();

        assert_eq!(distribution[0].sentiment, "Positive");
        assert_eq!(distribution[0].count, 2);
        assert_eq!(distribution[0].percentage, 50.0);
        assert_eq!(distribution.iter().map(|d| d.count).sum::<i64>(), 4);
    }

    #[test]
    fn test_topic_analysis() {
        let conn = seeded_db();
        let topics = topic_analysis(&conn).unwrap();

        assert_eq!(topics[0].topic, "coaching");
        assert_eq!(topics[0].frequency, 3);
        assert_eq!(topics[1].topic, "cleanliness");
        assert_eq!(topics[1].sentiment_score, -0.6);
    }

    #[test]
    fn test_list_feedback_filters() {
        let conn = seeded_db();

        let all = list_feedback(&conn, &FeedbackFilter::default()).unwrap();
        assert_eq!(all.len(), 4);
        // Newest first
        assert_eq!(all[0].feedback.feedback_date, date(2025, 3, 4));
        assert_eq!(all[1].member_name, "Unknown Member");

        let negative = list_feedback(
            &conn,
            &FeedbackFilter {
                sentiment: Some(Sentiment::Negative),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].member_name, "Bob");

        let search = list_feedback(
            &conn,
            &FeedbackFilter {
                search: Some("YOGA".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].feedback.content, "Loved the yoga class");

        let window = list_feedback(
            &conn,
            &FeedbackFilter {
                start_date: Some(date(2025, 3, 2)),
                end_date: Some(date(2025, 3, 3)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_list_feedback_paging() {
        let conn = seeded_db();
        let page = list_feedback(
            &conn,
            &FeedbackFilter {
                skip: 1,
                limit: 2,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].feedback.feedback_date, date(2025, 3, 3));
    }

    #[test]
    fn test_daily_sentiment_trends() {
        let conn = seeded_db();

        let all = daily_sentiment_trends(&conn, &SentimentTrendQuery::default()).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].date, date(2025, 3, 1));
        assert_eq!(all[0].feedback_type, "All");
        assert_eq!(all[0].positive, 1);
        assert_eq!(all[1].negative, 1);
        assert_eq!(all[1].avg_rating, 2.0);
        assert!(all.iter().all(|d| d.total == 1));

        let facility = daily_sentiment_trends(
            &conn,
            &SentimentTrendQuery {
                feedback_type: Some("Facility".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(facility.len(), 1);
        assert_eq!(facility[0].feedback_type, "Facility");
        assert_eq!(facility[0].date, date(2025, 3, 2));

        let window = daily_sentiment_trends(
            &conn,
            &SentimentTrendQuery {
                start_date: Some(date(2025, 3, 3)),
                end_date: Some(date(2025, 3, 31)),
                feedback_type: None,
            },
        )
        .unwrap();
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_monthly_sentiment_trends() {
        let conn = seeded_db();

        let months = monthly_sentiment_trends(&conn, 3, date(2025, 4, 10)).unwrap();
        assert_eq!(months.len(), 3);
        assert_eq!(months[0].month, "Feb 2025");
        assert_eq!(months[0].total, 0);
        assert_eq!(months[0].positive_percentage, 0.0);

        let march = &months[1];
        assert_eq!(march.month, "Mar 2025");
        assert_eq!(march.total, 4);
        assert_eq!(march.positive, 2);
        assert_eq!(march.positive_percentage, 50.0);
        assert_eq!(march.avg_rating, 3.8);

        assert_eq!(months[2].month, "Apr 2025");
        assert_eq!(months[2].total, 0);

        assert!(monthly_sentiment_trends(&conn, 0, date(2025, 4, 10)).unwrap().is_empty());
        let err = monthly_sentiment_trends(&conn, u32::MAX, date(2025, 4, 10)).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    fn new_feedback() -> NewFeedback {
        NewFeedback {
            member_id: Some(1),
            feedback_date: date(2025, 3, 20),
            feedback_type: "Facility".to_string(),
            content: "  New rowing machines are great  ".to_string(),
            rating: 4.5,
            sentiment: Sentiment::Positive,
            sentiment_score: 0.7,
        }
    }

    #[test]
    fn test_create_feedback() {
        let conn = seeded_db();

        let stored = create_feedback(&conn, &new_feedback()).unwrap();
        assert!(stored.feedback_id > 0);
        assert_eq!(stored.content, "New rowing machines are great");
        assert_eq!(stored.sentiment, "Positive");

        let listed = list_feedback(&conn, &FeedbackFilter::default()).unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0].feedback, stored);
        assert_eq!(listed[0].member_name, "Alice");
        assert_eq!(feedback_summary(&conn).unwrap().positive_count, 3);
    }

    #[test]
    fn test_create_feedback_validation() {
        let conn = seeded_db();

        let bad_rating = NewFeedback {
            rating: 6.0,
            ..new_feedback()
        };
        assert_eq!(create_feedback(&conn, &bad_rating).unwrap_err().status_code(), 400);

        let bad_score = NewFeedback {
            sentiment_score: -1.5,
            ..new_feedback()
        };
        assert_eq!(create_feedback(&conn, &bad_score).unwrap_err().status_code(), 400);

        let blank = NewFeedback {
            content: "   ".to_string(),
            ..new_feedback()
        };
        assert_eq!(create_feedback(&conn, &blank).unwrap_err().status_code(), 400);

        let stranger = NewFeedback {
            member_id: Some(99),
            ..new_feedback()
        };
        assert_eq!(create_feedback(&conn, &stranger).unwrap_err().status_code(), 404);

        let anonymous = NewFeedback {
            member_id: None,
            ..new_feedback()
        };
        assert!(create_feedback(&conn, &anonymous).is_ok());
        assert_eq!(feedback_summary(&conn).unwrap().total_feedback, 5);
    }
}
