// 🏋️ Trainer Rows - trainers, classes and the class timetable

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trainer {
    pub trainer_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub join_date: Option<NaiveDate>,
    pub specialization: String,
    pub certification: Option<String>,
    pub hourly_rate: Option<f64>,
    pub rating: Option<f64>,
    /// "active" or "inactive"
    pub status: String,
    pub bio: Option<String>,
}

impl Trainer {
    pub const COLUMNS: &'static str = "trainer_id, name, email, phone, join_date, specialization, \
                                       certification, hourly_rate, rating, status, bio";

    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO trainer (
                name, email, phone, join_date, specialization,
                certification, hourly_rate, rating, status, bio
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.name,
                self.email,
                self.phone,
                self.join_date,
                self.specialization,
                self.certification,
                self.hourly_rate,
                self.rating,
                self.status,
                self.bio,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Columns in [`Trainer::COLUMNS`] order
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Trainer {
            trainer_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            join_date: row.get(4)?,
            specialization: row.get(5)?,
            certification: row.get(6)?,
            hourly_rate: row.get(7)?,
            rating: row.get(8)?,
            status: row.get(9)?,
            bio: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymClass {
    pub class_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub difficulty_level: Option<String>,
    pub trainer_id: Option<i64>,
    pub max_capacity: Option<i64>,
    pub location: Option<String>,
}

impl GymClass {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO gym_class (
                name, description, difficulty_level, trainer_id, max_capacity, location
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.name,
                self.description,
                self.difficulty_level,
                self.trainer_id,
                self.max_capacity,
                self.location,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// One occurrence of a class on the timetable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSchedule {
    pub schedule_id: i64,
    pub class_id: i64,
    pub schedule_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub trainer_id: i64,
    pub status: String,
}

impl ClassSchedule {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO class_schedule (
                class_id, schedule_date, start_time, end_time, trainer_id, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.class_id,
                self.schedule_date,
                self.start_time,
                self.end_time,
                self.trainer_id,
                self.status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ClassSchedule {
            schedule_id: row.get(0)?,
            class_id: row.get(1)?,
            schedule_date: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            trainer_id: row.get(5)?,
            status: row.get(6)?,
        })
    }
}

/// A member's booking of a scheduled class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberClass {
    pub member_class_id: i64,
    pub member_id: i64,
    pub schedule_id: i64,
    /// "Present", "Absent", "Booked"
    pub attendance_status: String,
    pub rating: Option<f64>,
}

impl MemberClass {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO member_class (
                member_id, schedule_id, attendance_status, rating
            ) VALUES (?1, ?2, ?3, ?4)",
            params![
                self.member_id,
                self.schedule_id,
                self.attendance_status,
                self.rating,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
