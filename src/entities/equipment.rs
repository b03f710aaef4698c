// 🔧 Equipment Rows - gym floor inventory

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentStatus {
    Good,
    Broken,
    InMaintenance,
    NeedsReplacement,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Good => "Good",
            EquipmentStatus::Broken => "Broken",
            EquipmentStatus::InMaintenance => "In Maintenance",
            EquipmentStatus::NeedsReplacement => "Needs Replacement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentCategory {
    pub category_id: i64,
    pub category_name: String,
}

impl EquipmentCategory {
    /// Insert a category by name, returning the existing id if it is already there
    pub fn insert_named(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT category_id FROM equipment_category WHERE category_name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO equipment_category (category_name) VALUES (?1)",
            [name],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub equipment_id: i64,
    pub name: String,
    pub category_id: Option<i64>,
    pub purchase_date: Option<NaiveDate>,
    /// Unit price
    pub purchase_price: Option<f64>,
    pub status: String,
    pub quantity: i64,
    pub location: Option<String>,
}

impl Equipment {
    pub const COLUMNS: &'static str = "equipment_id, name, category_id, purchase_date, \
                                       purchase_price, status, quantity, location";

    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO equipment (
                name, category_id, purchase_date, purchase_price, status, quantity, location
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.name,
                self.category_id,
                self.purchase_date,
                self.purchase_price,
                self.status,
                self.quantity,
                self.location,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Columns in [`Equipment::COLUMNS`] order
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Equipment {
            equipment_id: row.get(0)?,
            name: row.get(1)?,
            category_id: row.get(2)?,
            purchase_date: row.get(3)?,
            purchase_price: row.get(4)?,
            status: row.get(5)?,
            quantity: row.get(6)?,
            location: row.get(7)?,
        })
    }

    pub fn find(conn: &Connection, equipment_id: i64) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM equipment WHERE equipment_id = ?1", Self::COLUMNS),
            [equipment_id],
            Self::from_row,
        )
        .optional()
    }
}

/// Spare units kept in storage for an equipment line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEquipment {
    pub backup_id: i64,
    pub equipment_id: i64,
    pub quantity: i64,
}

impl BackupEquipment {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO backup_equipment (equipment_id, quantity) VALUES (?1, ?2)",
            params![self.equipment_id, self.quantity],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
