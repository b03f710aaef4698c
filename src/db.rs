use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::entities::{ExpenseTransaction, IncomeTransaction};

/// Event for the audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the gym database file with WAL journaling
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {:?}", path))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- ==================================================================
        -- Members
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS member (
            member_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            birth_date TEXT,
            join_date TEXT NOT NULL,
            membership_type TEXT NOT NULL,
            membership_expiry TEXT,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS member_goal (
            goal_id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL REFERENCES member(member_id),
            goal_type TEXT NOT NULL,
            target_date TEXT,
            initial_value INTEGER,
            target_value INTEGER
        );

        CREATE TABLE IF NOT EXISTS workout_session (
            session_id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER REFERENCES member(member_id),
            session_date TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            notes TEXT
        );

        -- ==================================================================
        -- Trainers and classes
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS trainer (
            trainer_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            join_date TEXT,
            specialization TEXT NOT NULL,
            certification TEXT,
            hourly_rate REAL,
            rating REAL,
            status TEXT NOT NULL,
            bio TEXT
        );

        CREATE TABLE IF NOT EXISTS gym_class (
            class_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            difficulty_level TEXT,
            trainer_id INTEGER REFERENCES trainer(trainer_id),
            max_capacity INTEGER,
            location TEXT
        );

        CREATE TABLE IF NOT EXISTS class_schedule (
            schedule_id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_id INTEGER NOT NULL REFERENCES gym_class(class_id),
            schedule_date TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            trainer_id INTEGER NOT NULL REFERENCES trainer(trainer_id),
            status TEXT NOT NULL DEFAULT 'scheduled'
        );

        CREATE TABLE IF NOT EXISTS member_class (
            member_class_id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL REFERENCES member(member_id),
            schedule_id INTEGER NOT NULL REFERENCES class_schedule(schedule_id),
            attendance_status TEXT NOT NULL,
            rating REAL
        );

        -- ==================================================================
        -- Finance
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS income_transaction (
            income_id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            transaction_date TEXT NOT NULL,
            income_type TEXT NOT NULL,
            amount REAL NOT NULL,
            payment_method TEXT NOT NULL,
            member_id INTEGER REFERENCES member(member_id),
            description TEXT,
            reference_id INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS expense_transaction (
            expense_id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            transaction_date TEXT NOT NULL,
            expense_category TEXT NOT NULL,
            amount REAL NOT NULL,
            payment_method TEXT NOT NULL,
            vendor_name TEXT,
            description TEXT,
            receipt_number TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS budget_allocation (
            budget_id INTEGER PRIMARY KEY AUTOINCREMENT,
            budget_year INTEGER NOT NULL,
            budget_month INTEGER NOT NULL,
            category TEXT NOT NULL,
            allocated_amount REAL NOT NULL,
            actual_amount REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS financial_target (
            target_id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_year INTEGER NOT NULL,
            target_month INTEGER NOT NULL,
            target_type TEXT NOT NULL,
            target_value REAL NOT NULL,
            actual_value REAL NOT NULL DEFAULT 0
        );

        -- ==================================================================
        -- Feedback
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS feedback (
            feedback_id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER REFERENCES member(member_id),
            feedback_date TEXT NOT NULL,
            feedback_type TEXT NOT NULL,
            content TEXT NOT NULL,
            rating REAL,
            sentiment TEXT NOT NULL,
            sentiment_score REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS feedback_topic (
            topic_id INTEGER PRIMARY KEY AUTOINCREMENT,
            feedback_id INTEGER NOT NULL REFERENCES feedback(feedback_id),
            topic TEXT NOT NULL,
            sentiment_score REAL NOT NULL DEFAULT 0,
            confidence REAL NOT NULL DEFAULT 0
        );

        -- ==================================================================
        -- Products and sales
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS product_category (
            category_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            color_code TEXT
        );

        CREATE TABLE IF NOT EXISTS product (
            product_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            brand TEXT,
            category_id INTEGER REFERENCES product_category(category_id),
            price REAL NOT NULL,
            cost_price REAL NOT NULL,
            current_stock INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS sale (
            sale_id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER REFERENCES member(member_id),
            sale_date TEXT NOT NULL,
            total_amount REAL NOT NULL,
            payment_method TEXT NOT NULL DEFAULT 'cash',
            status TEXT NOT NULL DEFAULT 'completed'
        );

        CREATE TABLE IF NOT EXISTS sale_item (
            sale_item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            sale_id INTEGER NOT NULL REFERENCES sale(sale_id),
            product_id INTEGER NOT NULL REFERENCES product(product_id),
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL,
            subtotal REAL NOT NULL
        );

        -- ==================================================================
        -- Inventory
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS equipment_category (
            category_id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS equipment (
            equipment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category_id INTEGER REFERENCES equipment_category(category_id),
            purchase_date TEXT,
            purchase_price REAL,
            status TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            location TEXT
        );

        CREATE TABLE IF NOT EXISTS backup_equipment (
            backup_id INTEGER PRIMARY KEY AUTOINCREMENT,
            equipment_id INTEGER NOT NULL REFERENCES equipment(equipment_id),
            quantity INTEGER NOT NULL DEFAULT 0
        );

        -- ==================================================================
        -- Chatbot
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS chat_session (
            session_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT,
            session_start TEXT NOT NULL,
            last_activity TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS chat_message (
            message_id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES chat_session(session_id),
            message_type TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            context_data TEXT
        );

        -- ==================================================================
        -- Events Table (audit trail)
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- ==================================================================
        -- Indexes
        -- ==================================================================
        CREATE INDEX IF NOT EXISTS idx_income_date ON income_transaction(transaction_date);
        CREATE INDEX IF NOT EXISTS idx_income_type ON income_transaction(income_type);
        CREATE INDEX IF NOT EXISTS idx_expense_date ON expense_transaction(transaction_date);
        CREATE INDEX IF NOT EXISTS idx_expense_category ON expense_transaction(expense_category);
        CREATE INDEX IF NOT EXISTS idx_member_join ON member(join_date);
        CREATE INDEX IF NOT EXISTS idx_feedback_date ON feedback(feedback_date);
        CREATE INDEX IF NOT EXISTS idx_sale_date ON sale(sale_date);
        CREATE INDEX IF NOT EXISTS idx_chat_message_session ON chat_message(session_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
        ",
    )?;

    Ok(())
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// Load income transactions from a CSV file.
///
/// Expected headers: `date,income_type,amount,payment_method,member_id,description`
pub fn load_income_csv(csv_path: &Path) -> Result<Vec<IncomeTransaction>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut transactions = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let tx: IncomeTransaction =
            result.with_context(|| format!("Failed to deserialize income row {}", line + 2))?;
        tx.validate()
            .with_context(|| format!("Invalid income row {}", line + 2))?;
        transactions.push(tx);
    }

    Ok(transactions)
}

/// Load expense transactions from a CSV file.
///
/// Expected headers: `date,expense_category,amount,payment_method,vendor_name,description,receipt_number`
pub fn load_expense_csv(csv_path: &Path) -> Result<Vec<ExpenseTransaction>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut transactions = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let tx: ExpenseTransaction =
            result.with_context(|| format!("Failed to deserialize expense row {}", line + 2))?;
        tx.validate()
            .with_context(|| format!("Invalid expense row {}", line + 2))?;
        transactions.push(tx);
    }

    Ok(transactions)
}

/// Outcome of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

pub fn insert_income(conn: &Connection, transactions: &[IncomeTransaction]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for tx in transactions {
        let hash = tx.compute_idempotency_hash();

        match tx.insert_with_hash(conn, &hash) {
            Ok(_) => {
                summary.inserted += 1;

                let event = Event::new(
                    "income_imported",
                    "income_transaction",
                    &hash,
                    serde_json::json!({
                        "income_type": tx.income_type,
                        "amount": tx.amount,
                        "date": tx.transaction_date.to_string(),
                    }),
                    "csv_importer",
                );
                if let Err(e) = insert_event(conn, &event) {
                    tracing::warn!(error = %e, "failed to record import event");
                }
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "income import finished"
    );

    Ok(summary)
}

pub fn insert_expenses(
    conn: &Connection,
    transactions: &[ExpenseTransaction],
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for tx in transactions {
        let hash = tx.compute_idempotency_hash();

        match tx.insert_with_hash(conn, &hash) {
            Ok(_) => {
                summary.inserted += 1;

                let event = Event::new(
                    "expense_imported",
                    "expense_transaction",
                    &hash,
                    serde_json::json!({
                        "expense_category": tx.expense_category,
                        "amount": tx.amount,
                        "date": tx.transaction_date.to_string(),
                    }),
                    "csv_importer",
                );
                if let Err(e) = insert_event(conn, &event) {
                    tracing::warn!(error = %e, "failed to record import event");
                }
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "expense import finished"
    );

    Ok(summary)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;

    Ok(count)
}

// ============================================================================
// TEST FIXTURES
// ============================================================================
