// 🧍 Member Rows - members, their goals and workout sessions

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub join_date: NaiveDate,
    pub membership_type: String,
    pub membership_expiry: Option<NaiveDate>,
    /// "Active" or "Inactive"
    pub status: String,
}

impl Member {
    pub const COLUMNS: &'static str = "member_id, name, email, phone, birth_date, join_date, \
                                       membership_type, membership_expiry, status";

    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }

    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO member (
                name, email, phone, birth_date, join_date,
                membership_type, membership_expiry, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.name,
                self.email,
                self.phone,
                self.birth_date,
                self.join_date,
                self.membership_type,
                self.membership_expiry,
                self.status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Columns in [`Member::COLUMNS`] order
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Member {
            member_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            birth_date: row.get(4)?,
            join_date: row.get(5)?,
            membership_type: row.get(6)?,
            membership_expiry: row.get(7)?,
            status: row.get(8)?,
        })
    }

    pub fn find(conn: &Connection, member_id: i64) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM member WHERE member_id = ?1", Self::COLUMNS),
            [member_id],
            Self::from_row,
        )
        .optional()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberGoal {
    pub goal_id: i64,
    pub member_id: i64,
    /// "Weight Loss", "Muscle Gain", "Endurance", ...
    pub goal_type: String,
    pub target_date: Option<NaiveDate>,
    pub initial_value: Option<i64>,
    pub target_value: Option<i64>,
}

impl MemberGoal {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO member_goal (
                member_id, goal_type, target_date, initial_value, target_value
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.member_id,
                self.goal_type,
                self.target_date,
                self.initial_value,
                self.target_value,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// A visit to the gym floor. Times are kept as "HH:MM" text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub session_id: i64,
    pub member_id: Option<i64>,
    pub session_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub notes: Option<String>,
}

impl WorkoutSession {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO workout_session (
                member_id, session_date, start_time, end_time, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.member_id,
                self.session_date,
                self.start_time,
                self.end_time,
                self.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// Parse the hour out of an "HH:MM" or "HH:MM:SS" string
pub fn hour_of(time: &str) -> Option<u32> {
    let hour: u32 = time.split(':').next()?.trim().parse().ok()?;
    (hour < 24).then_some(hour)
}
