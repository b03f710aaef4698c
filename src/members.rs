// 🧍 Member Dashboard - headcount, joins, goal segments and busy hours

use crate::entities::member::hour_of;
use crate::entities::Member;
use crate::error::AppResult;
use crate::forecast::round2;
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_SEGMENT_COLOR: &str = "#8884d8";

fn segment_color(goal_type: &str) -> &'static str {
    match goal_type {
        "Weight Loss" => "#10b981",
        "Muscle Gain" => "#f59e0b",
        "Endurance" => "#6366f1",
        _ => DEFAULT_SEGMENT_COLOR,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberStats {
    pub total: i64,
    pub active: i64,
    /// Joined since the first of the current month
    pub new_members: i64,
    /// Active share of all members, in percent
    pub retention: f64,
}

pub fn member_stats(conn: &Connection, today: NaiveDate) -> AppResult<MemberStats> {
    let month_start = today.with_day(1).unwrap_or(today);

    let (total, active, new_members): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'Active' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN join_date >= ?1 THEN 1 ELSE 0 END), 0)
         FROM member",
        [month_start],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let retention = if total > 0 {
        round2(active as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    Ok(MemberStats {
        total,
        active,
        new_members,
        retention,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberActivity {
    /// "YYYY-MM"
    pub month: String,
    pub value: i64,
}

/// Joins per calendar month, oldest first
pub fn member_activity(conn: &Connection) -> AppResult<Vec<MemberActivity>> {
    let mut stmt = conn.prepare(
        "SELECT substr(join_date, 1, 7) AS month, COUNT(*)
         FROM member
         GROUP BY month
         ORDER BY month",
    )?;

    let activity = stmt
        .query_map([], |row| {
            Ok(MemberActivity {
                month: row.get(0)?,
                value: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(activity)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMember {
    pub id: String,
    pub name: String,
    pub join_date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    pub name: String,
    pub value: i64,
    pub color: String,
    pub members: Vec<SegmentMember>,
}

/// Members grouped by goal type
pub fn member_segments(conn: &Connection) -> AppResult<Vec<SegmentData>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT g.goal_type, {}
         FROM member_goal g
         JOIN member m ON m.member_id = g.member_id
         ORDER BY g.goal_type, m.member_id",
        Member::COLUMNS
            .split(", ")
            .map(|c| format!("m.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ")
    ))?;

    let rows = stmt
        .query_map([], |row| {
            let goal_type: String = row.get(0)?;
            let member = Member {
                member_id: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
                birth_date: row.get(5)?,
                join_date: row.get(6)?,
                membership_type: row.get(7)?,
                membership_expiry: row.get(8)?,
                status: row.get(9)?,
            };
            Ok((goal_type, member))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut segments: BTreeMap<String, Vec<SegmentMember>> = BTreeMap::new();
    for (goal_type, member) in rows {
        segments.entry(goal_type).or_default().push(SegmentMember {
            id: member.member_id.to_string(),
            name: member.name,
            join_date: member.join_date,
            status: member.status,
        });
    }

    Ok(segments
        .into_iter()
        .map(|(name, members)| SegmentData {
            value: members.len() as i64,
            color: segment_color(&name).to_string(),
            name,
            members,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTime {
    /// "HH:00"
    pub time: String,
    pub members: i64,
}

/// Workout sessions counted by the hour they started
pub fn workout_time(conn: &Connection) -> AppResult<Vec<WorkoutTime>> {
    let mut stmt = conn.prepare("SELECT start_time FROM workout_session")?;
    let starts = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_hour: BTreeMap<u32, i64> = BTreeMap::new();
    for start in &starts {
        match hour_of(start) {
            Some(hour) => *by_hour.entry(hour).or_insert(0) += 1,
            None => tracing::warn!(start_time = %start, "skipping malformed workout start time"),
        }
    }

    Ok(by_hour
        .into_iter()
        .map(|(hour, members)| WorkoutTime {
            time: format!("{:02}:00", hour),
            members,
        })
        .collect())
}
