// 🛒 Product Rows - shop catalogue and sales

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub category_id: i64,
    /// "Supplements", "Equipment", "Apparel", ...
    pub name: String,
    pub description: Option<String>,
    pub color_code: Option<String>,
}

impl ProductCategory {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO product_category (name, description, color_code) VALUES (?1, ?2, ?3)",
            params![self.name, self.description, self.color_code],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub category_id: Option<i64>,
    pub price: f64,
    pub cost_price: f64,
    pub current_stock: i64,
    /// "active" or "discontinued"
    pub status: String,
}

impl Product {
    pub const COLUMNS: &'static str =
        "product_id, name, brand, category_id, price, cost_price, current_stock, status";

    pub fn margin_per_unit(&self) -> f64 {
        self.price - self.cost_price
    }

    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO product (
                name, brand, category_id, price, cost_price, current_stock, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.name,
                self.brand,
                self.category_id,
                self.price,
                self.cost_price,
                self.current_stock,
                self.status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Columns in [`Product::COLUMNS`] order
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            product_id: row.get(0)?,
            name: row.get(1)?,
            brand: row.get(2)?,
            category_id: row.get(3)?,
            price: row.get(4)?,
            cost_price: row.get(5)?,
            current_stock: row.get(6)?,
            status: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub sale_id: i64,
    pub member_id: Option<i64>,
    pub sale_date: NaiveDate,
    pub total_amount: f64,
    pub payment_method: String,
    /// "completed", "refunded", "pending"
    pub status: String,
}

impl Sale {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO sale (member_id, sale_date, total_amount, payment_method, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.member_id,
                self.sale_date,
                self.total_amount,
                self.payment_method,
                self.status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub sale_item_id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
}

impl SaleItem {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO sale_item (sale_id, product_id, quantity, unit_price, subtotal)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.sale_id,
                self.product_id,
                self.quantity,
                self.unit_price,
                self.subtotal,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
