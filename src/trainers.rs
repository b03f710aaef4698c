// 🏋️ Trainer Dashboard - roster, performance and weekly timetable

use crate::entities::member::hour_of;
use crate::entities::{ClassSchedule, Trainer};
use crate::error::{AppError, AppResult};
use crate::finance::{check_window, days_before};
use crate::forecast::round2;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capacity assumed for classes that do not declare one
pub const DEFAULT_CLASS_CAPACITY: i64 = 20;

pub const DEFAULT_PAGE_LIMIT: u32 = 100;

pub const DEFAULT_ACTIVITY_DAYS: u32 = 7;

const TOP_RATED_COUNT: usize = 3;

// ============================================================================
// ROSTER
// ============================================================================

pub fn list_trainers(conn: &Connection, skip: u32, limit: u32) -> AppResult<Vec<Trainer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM trainer ORDER BY trainer_id LIMIT ?1 OFFSET ?2",
        Trainer::COLUMNS
    ))?;

    let trainers = stmt
        .query_map(params![limit, skip], Trainer::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(trainers)
}

pub fn get_trainer(conn: &Connection, trainer_id: i64) -> AppResult<Trainer> {
    conn.query_row(
        &format!("SELECT {} FROM trainer WHERE trainer_id = ?1", Trainer::COLUMNS),
        [trainer_id],
        Trainer::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(format!("trainer {}", trainer_id)))
}

// ============================================================================
// PERFORMANCE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedTrainer {
    pub trainer_id: i64,
    pub name: String,
    pub specialization: String,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializationCount {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerPerformance {
    pub total_trainers: i64,
    pub active_trainers: i64,
    /// Mean of rated trainers only, 0 when nobody is rated
    pub average_rating: f64,
    pub total_classes: i64,
    pub top_rated: Vec<RatedTrainer>,
    pub specializations: Vec<SpecializationCount>,
}

pub fn trainer_performance(conn: &Connection) -> AppResult<TrainerPerformance> {
    let (total_trainers, active_trainers, average_rating): (i64, i64, Option<f64>) = conn
        .query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN lower(status) = 'active' THEN 1 ELSE 0 END), 0),
                    AVG(rating)
             FROM trainer",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

    let total_classes: i64 =
        conn.query_row("SELECT COUNT(*) FROM class_schedule", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT trainer_id, name, specialization, rating FROM trainer
         WHERE rating IS NOT NULL
         ORDER BY rating DESC, trainer_id
         LIMIT ?1",
    )?;
    let top_rated = stmt
        .query_map([TOP_RATED_COUNT as i64], |row| {
            Ok(RatedTrainer {
                trainer_id: row.get(0)?,
                name: row.get(1)?,
                specialization: row.get(2)?,
                rating: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT specialization, COUNT(*) FROM trainer
         GROUP BY specialization
         ORDER BY COUNT(*) DESC, specialization",
    )?;
    let specializations = stmt
        .query_map([], |row| {
            Ok(SpecializationCount {
                name: row.get(0)?,
                value: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TrainerPerformance {
        total_trainers,
        active_trainers,
        average_rating: round2(average_rating.unwrap_or(0.0)),
        total_classes,
        top_rated,
        specializations,
    })
}

// ============================================================================
// SCHEDULE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledClass {
    pub schedule_id: i64,
    pub name: String,
    pub date: NaiveDate,
    /// "HH:MM - HH:MM"
    pub time: String,
    pub duration_minutes: i64,
    pub location: Option<String>,
    /// "present/capacity"
    pub participants: String,
    pub available: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: String,
    pub classes: Vec<ScheduledClass>,
}

fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn minutes_of(time: &str) -> Option<i64> {
    let hour = hour_of(time)? as i64;
    let minute: i64 = time.split(':').nth(1)?.trim().parse().ok()?;
    Some(hour * 60 + minute)
}

/// A trainer's classes grouped by weekday, Monday first. All seven days are
/// present even when empty.
pub fn trainer_schedule(conn: &Connection, trainer_id: i64) -> AppResult<Vec<DaySchedule>> {
    // 404 for unknown trainers instead of an empty week
    get_trainer(conn, trainer_id)?;

    let mut stmt = conn.prepare(
        "SELECT s.schedule_id, s.class_id, s.schedule_date, s.start_time, s.end_time,
                s.trainer_id, s.status,
                c.name, c.location, c.max_capacity,
                (SELECT COUNT(*) FROM member_class mc
                  WHERE mc.schedule_id = s.schedule_id AND mc.attendance_status = 'Present')
         FROM class_schedule s
         JOIN gym_class c ON c.class_id = s.class_id
         WHERE s.trainer_id = ?1
         ORDER BY s.schedule_date, s.start_time",
    )?;

    let rows = stmt
        .query_map([trainer_id], |row| {
            let schedule = ClassSchedule::from_row(row)?;
            let name: String = row.get(7)?;
            let location: Option<String> = row.get(8)?;
            let capacity: Option<i64> = row.get(9)?;
            let present: i64 = row.get(10)?;
            Ok((schedule, name, location, capacity, present))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_day: BTreeMap<u32, Vec<ScheduledClass>> = BTreeMap::new();
    for (schedule, name, location, capacity, present) in rows {
        let capacity = capacity.unwrap_or(DEFAULT_CLASS_CAPACITY);
        let duration_minutes = match (minutes_of(&schedule.start_time), minutes_of(&schedule.end_time)) {
            (Some(start), Some(end)) => end - start,
            _ => 0,
        };

        by_day
            .entry(schedule.schedule_date.weekday().num_days_from_monday())
            .or_default()
            .push(ScheduledClass {
                schedule_id: schedule.schedule_id,
                name,
                date: schedule.schedule_date,
                time: format!("{} - {}", schedule.start_time, schedule.end_time),
                duration_minutes,
                location,
                participants: format!("{}/{}", present, capacity),
                available: capacity - present,
                status: schedule.status,
            });
    }

    let mut weekday = Weekday::Mon;
    let mut week = Vec::with_capacity(7);
    for index in 0..7 {
        week.push(DaySchedule {
            day: day_name(weekday).to_string(),
            classes: by_day.remove(&index).unwrap_or_default(),
        });
        weekday = weekday.succ();
    }

    Ok(week)
}

// ============================================================================
// ACTIVITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerActivity {
    /// e.g. "10 Mar"
    pub date: String,
    /// Members marked present in the trainer's classes that day
    pub attendance: i64,
    /// Mean class rating that day, 0 without ratings
    pub satisfaction: f64,
    /// Attendance scaled by satisfaction, as a percentage of a 5x5 day
    pub engagement: f64,
}

/// Day-by-day attendance and satisfaction for one trainer over the last
/// `days` days, today included. Days without classes are zero-filled.
pub fn trainer_activity(
    conn: &Connection,
    trainer_id: i64,
    days: u32,
    today: NaiveDate,
) -> AppResult<Vec<TrainerActivity>> {
    get_trainer(conn, trainer_id)?;
    check_window(days)?;
    if days == 0 {
        return Ok(Vec::new());
    }
    let start = days_before(today, days - 1)?;

    let mut stmt = conn.prepare(
        "SELECT s.schedule_date,
                COALESCE(SUM(CASE WHEN mc.attendance_status = 'Present' THEN 1 ELSE 0 END), 0),
                AVG(mc.rating)
         FROM class_schedule s
         JOIN member_class mc ON mc.schedule_id = s.schedule_id
         WHERE s.trainer_id = ?1 AND s.schedule_date BETWEEN ?2 AND ?3
         GROUP BY s.schedule_date",
    )?;
    let mut by_day: BTreeMap<NaiveDate, (i64, Option<f64>)> = stmt
        .query_map(params![trainer_id, start, today], |row| {
            Ok((row.get(0)?, (row.get(1)?, row.get(2)?)))
        })?
        .collect::<Result<_, _>>()?;

    let mut activity = Vec::with_capacity(days as usize);
    let mut day = start;
    while day <= today {
        let (attendance, rating) = by_day.remove(&day).unwrap_or((0, None));
        let satisfaction = round2(rating.unwrap_or(0.0));
        activity.push(TrainerActivity {
            date: day.format("%-d %b").to_string(),
            attendance,
            satisfaction,
            engagement: round2(attendance as f64 * satisfaction / 25.0) * 100.0,
        });
        day += Duration::days(1);
    }

    Ok(activity)
}
