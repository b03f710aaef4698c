// 🔧 Inventory Dashboard - equipment condition, spare stock and value

use crate::db::{insert_event, Event};
use crate::entities::{Equipment, EquipmentStatus};
use crate::error::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Unit counts, not equipment lines: every figure sums `quantity`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_equipment: i64,
    pub total_active_equipment: i64,
    pub total_broken_equipment: i64,
    pub total_in_maintenance_equipment: i64,
    pub total_replacement_needed_equipment: i64,
    pub total_backup_stock: i64,
    /// Sum of purchase price times quantity
    pub total_equipment_value: f64,
}

pub fn inventory_summary(conn: &Connection) -> AppResult<InventorySummary> {
    let units_with = |status: EquipmentStatus| -> AppResult<i64> {
        let units: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM equipment WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(units)
    };

    let (total_equipment, total_equipment_value): (i64, f64) = conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0),
                COALESCE(SUM(COALESCE(purchase_price, 0) * quantity), 0.0)
         FROM equipment",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let total_backup_stock: i64 = conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0) FROM backup_equipment",
        [],
        |row| row.get(0),
    )?;

    Ok(InventorySummary {
        total_equipment,
        total_active_equipment: units_with(EquipmentStatus::Good)?,
        total_broken_equipment: units_with(EquipmentStatus::Broken)?,
        total_in_maintenance_equipment: units_with(EquipmentStatus::InMaintenance)?,
        total_replacement_needed_equipment: units_with(EquipmentStatus::NeedsReplacement)?,
        total_backup_stock,
        total_equipment_value,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentCategoryData {
    pub name: String,
    pub units: i64,
    pub value: f64,
}

/// Units and value per equipment category; uncategorised items are "Other"
pub fn category_distribution(conn: &Connection) -> AppResult<Vec<EquipmentCategoryData>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(c.category_name, 'Other') AS name,
                SUM(e.quantity),
                SUM(COALESCE(e.purchase_price, 0) * e.quantity)
         FROM equipment e
         LEFT JOIN equipment_category c ON c.category_id = e.category_id
         GROUP BY name
         ORDER BY SUM(e.quantity) DESC, name",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(EquipmentCategoryData {
                name: row.get(0)?,
                units: row.get(1)?,
                value: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// BACKUP STOCK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupWithdrawal {
    pub equipment: Equipment,
    pub taken: i64,
    pub remaining_backup: i64,
}

/// Move `quantity` spare units of an equipment line out of backup storage.
///
/// Unknown equipment is a 404; a missing backup row or too little spare
/// stock is a 400 and leaves the stock untouched. Each withdrawal is
/// recorded in the audit trail under `actor`.
pub fn take_from_backup(
    conn: &Connection,
    equipment_id: i64,
    quantity: i64,
    actor: &str,
) -> AppResult<BackupWithdrawal> {
    if quantity < 1 {
        return Err(AppError::invalid_input(format!(
            "quantity must be at least 1, got {}",
            quantity
        )));
    }

    let equipment = Equipment::find(conn, equipment_id)?
        .ok_or_else(|| AppError::not_found(format!("equipment {}", equipment_id)))?;

    // Conditional decrement so stock can never go negative
    let updated = conn.execute(
        "UPDATE backup_equipment SET quantity = quantity - ?1
         WHERE backup_id = (SELECT backup_id FROM backup_equipment
                            WHERE equipment_id = ?2 ORDER BY backup_id LIMIT 1)
           AND quantity >= ?1",
        params![quantity, equipment_id],
    )?;
    if updated == 0 {
        warn!(equipment_id, quantity, "backup withdrawal refused");
        return Err(AppError::invalid_input(
            "Not enough stock in backup or backup item not found",
        ));
    }

    let remaining_backup: i64 = conn
        .query_row(
            "SELECT quantity FROM backup_equipment
             WHERE equipment_id = ?1 ORDER BY backup_id LIMIT 1",
            [equipment_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let event = Event::new(
        "taken_from_backup",
        "equipment",
        &equipment_id.to_string(),
        serde_json::json!({
            "quantity": quantity,
            "remaining_backup": remaining_backup,
            "note": format!("Taken {} unit(s) from backup stock.", quantity),
        }),
        actor,
    );
    if let Err(e) = insert_event(conn, &event) {
        warn!(error = %e, "failed to record backup withdrawal");
    }

    info!(equipment_id, quantity, remaining_backup, "took units from backup");

    Ok(BackupWithdrawal {
        equipment,
        taken: quantity,
        remaining_backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{empty_db, seeded_db};
    use crate::db::get_events_for_entity;

    #[test]
    fn test_inventory_summary() {
        let conn = seeded_db();
        let summary = inventory_summary(&conn).unwrap();

        assert_eq!(summary.total_equipment, 5);
        assert_eq!(summary.total_active_equipment, 3);
        assert_eq!(summary.total_broken_equipment, 2);
        assert_eq!(summary.total_in_maintenance_equipment, 0);
        assert_eq!(summary.total_backup_stock, 1);
        assert_eq!(summary.total_equipment_value, 6600.0);
    }

    #[test]
    fn test_inventory_summary_empty() {
        let summary = inventory_summary(&empty_db()).unwrap();
        assert_eq!(summary.total_equipment, 0);
        assert_eq!(summary.total_equipment_value, 0.0);
    }

    #[test]
    fn test_category_distribution() {
        let conn = seeded_db();
        let categories = category_distribution(&conn).unwrap();

        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Cardio");
        assert_eq!(categories[0].units, 3);
        assert_eq!(categories[0].value, 6000.0);
        assert_eq!(categories[1].name, "Free Weights");
    }

    #[test]
    fn test_take_from_backup() {
        let conn = seeded_db();

        // Treadmill (id 1) has one spare unit
        let taken = take_from_backup(&conn, 1, 1, "Manager").unwrap();
        assert_eq!(taken.equipment.name, "Treadmill");
        assert_eq!(taken.taken, 1);
        assert_eq!(taken.remaining_backup, 0);
        assert_eq!(inventory_summary(&conn).unwrap().total_backup_stock, 0);

        let events = get_events_for_entity(&conn, "equipment", "1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "taken_from_backup");
        assert_eq!(events[0].actor, "Manager");
        assert_eq!(events[0].data["quantity"], 1);
    }

    #[test]
    fn test_take_from_backup_refusals() {
        let conn = seeded_db();

        let too_many = take_from_backup(&conn, 1, 2, "Manager").unwrap_err();
        assert_eq!(too_many.status_code(), 400);
        assert_eq!(inventory_summary(&conn).unwrap().total_backup_stock, 1);

        // Dumbbell Set has no backup row
        assert_eq!(take_from_backup(&conn, 2, 1, "Manager").unwrap_err().status_code(), 400);
        assert_eq!(take_from_backup(&conn, 99, 1, "Manager").unwrap_err().status_code(), 404);
        assert_eq!(take_from_backup(&conn, 1, 0, "Manager").unwrap_err().status_code(), 400);

        assert!(get_events_for_entity(&conn, "equipment", "1").unwrap().is_empty());
    }
}
