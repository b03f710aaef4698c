// 💰 Finance Rows - income, expenses, budgets and targets
//
// Category columns are stored as plain text. The enums below are the set of
// values the importers accept and the aggregations branch on.

use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

// ============================================================================
// INCOME TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    Membership,
    PersonalTraining,
    ClassFee,
    ProductSale,
}

impl IncomeType {
    pub const ALL: [IncomeType; 4] = [
        IncomeType::Membership,
        IncomeType::PersonalTraining,
        IncomeType::ClassFee,
        IncomeType::ProductSale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeType::Membership => "membership",
            IncomeType::PersonalTraining => "personal_training",
            IncomeType::ClassFee => "class_fee",
            IncomeType::ProductSale => "product_sale",
        }
    }
}

impl FromStr for IncomeType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IncomeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::invalid_input(format!("unknown income type: {}", s)))
    }
}

// ============================================================================
// EXPENSE CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Equipment,
    StaffSalary,
    Marketing,
    Maintenance,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::Rent,
        ExpenseCategory::Utilities,
        ExpenseCategory::Equipment,
        ExpenseCategory::StaffSalary,
        ExpenseCategory::Marketing,
        ExpenseCategory::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Utilities => "utilities",
            ExpenseCategory::Equipment => "equipment",
            ExpenseCategory::StaffSalary => "staff_salary",
            ExpenseCategory::Marketing => "marketing",
            ExpenseCategory::Maintenance => "maintenance",
        }
    }
}

impl FromStr for ExpenseCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExpenseCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::invalid_input(format!("unknown expense category: {}", s)))
    }
}

fn check_amount(amount: f64) -> AppResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::invalid_input(format!(
            "amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}

// ============================================================================
// INCOME TRANSACTION
// ============================================================================

/// One row of `income_transaction`. Also the CSV import shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTransaction {
    #[serde(default)]
    pub income_id: i64,

    #[serde(rename = "date")]
    pub transaction_date: NaiveDate,

    pub income_type: String,
    pub amount: f64,
    pub payment_method: String,

    #[serde(default)]
    pub member_id: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,

    /// Id of the sale or class booking that produced this income
    #[serde(default)]
    pub reference_id: Option<i64>,
}

impl IncomeTransaction {
    pub fn validate(&self) -> AppResult<()> {
        self.income_type.parse::<IncomeType>()?;
        check_amount(self.amount)
    }

    /// Compute idempotency hash for duplicate detection on re-import
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}{}{}{}{}",
            self.transaction_date,
            self.income_type,
            self.amount,
            self.payment_method,
            self.description.as_deref().unwrap_or("")
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn insert_with_hash(&self, conn: &Connection, hash: &str) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO income_transaction (
                idempotency_hash, transaction_date, income_type, amount,
                payment_method, member_id, description, reference_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                hash,
                self.transaction_date,
                self.income_type,
                self.amount,
                self.payment_method,
                self.member_id,
                self.description,
                self.reference_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Columns: income_id, transaction_date, income_type, amount,
    /// payment_method, member_id, description, reference_id
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(IncomeTransaction {
            income_id: row.get(0)?,
            transaction_date: row.get(1)?,
            income_type: row.get(2)?,
            amount: row.get(3)?,
            payment_method: row.get(4)?,
            member_id: row.get(5)?,
            description: row.get(6)?,
            reference_id: row.get(7)?,
        })
    }
}

// ============================================================================
// EXPENSE TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseTransaction {
    #[serde(default)]
    pub expense_id: i64,

    #[serde(rename = "date")]
    pub transaction_date: NaiveDate,

    pub expense_category: String,
    pub amount: f64,
    pub payment_method: String,

    #[serde(default)]
    pub vendor_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub receipt_number: Option<String>,
}

impl ExpenseTransaction {
    pub fn validate(&self) -> AppResult<()> {
        self.expense_category.parse::<ExpenseCategory>()?;
        check_amount(self.amount)
    }

    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}{}{}{}{}{}",
            self.transaction_date,
            self.expense_category,
            self.amount,
            self.payment_method,
            self.vendor_name.as_deref().unwrap_or(""),
            self.receipt_number
                .as_deref()
                .or(self.description.as_deref())
                .unwrap_or("")
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn insert_with_hash(&self, conn: &Connection, hash: &str) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO expense_transaction (
                idempotency_hash, transaction_date, expense_category, amount,
                payment_method, vendor_name, description, receipt_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                hash,
                self.transaction_date,
                self.expense_category,
                self.amount,
                self.payment_method,
                self.vendor_name,
                self.description,
                self.receipt_number,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Columns: expense_id, transaction_date, expense_category, amount,
    /// payment_method, vendor_name, description, receipt_number
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ExpenseTransaction {
            expense_id: row.get(0)?,
            transaction_date: row.get(1)?,
            expense_category: row.get(2)?,
            amount: row.get(3)?,
            payment_method: row.get(4)?,
            vendor_name: row.get(5)?,
            description: row.get(6)?,
            receipt_number: row.get(7)?,
        })
    }
}

// ============================================================================
// BUDGETS AND TARGETS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub budget_id: i64,
    pub budget_year: i32,
    pub budget_month: u32,
    pub category: String,
    pub allocated_amount: f64,
    pub actual_amount: f64,
}

impl BudgetAllocation {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO budget_allocation (
                budget_year, budget_month, category, allocated_amount, actual_amount
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.budget_year,
                self.budget_month,
                self.category,
                self.allocated_amount,
                self.actual_amount,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BudgetAllocation {
            budget_id: row.get(0)?,
            budget_year: row.get(1)?,
            budget_month: row.get(2)?,
            category: row.get(3)?,
            allocated_amount: row.get(4)?,
            actual_amount: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTarget {
    pub target_id: i64,
    pub target_year: i32,
    pub target_month: u32,
    /// e.g. "revenue", "profit", "new_members"
    pub target_type: String,
    pub target_value: f64,
    pub actual_value: f64,
}

impl FinancialTarget {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO financial_target (
                target_year, target_month, target_type, target_value, actual_value
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.target_year,
                self.target_month,
                self.target_type,
                self.target_value,
                self.actual_value,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(FinancialTarget {
            target_id: row.get(0)?,
            target_year: row.get(1)?,
            target_month: row.get(2)?,
            target_type: row.get(3)?,
            target_value: row.get(4)?,
            actual_value: row.get(5)?,
        })
    }
}
