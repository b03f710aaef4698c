// Entity Models - one file per stored aggregate
//
// Each row type knows its own columns: `insert` writes a row and returns the
// new rowid, `from_row` maps a SELECT in `COLUMNS` order back into the struct.

pub mod chat;
pub mod equipment;
pub mod feedback;
pub mod finance;
pub mod member;
pub mod product;
pub mod trainer;

pub use chat::{ChatMessage, ChatSession, MessageType};
pub use equipment::{BackupEquipment, Equipment, EquipmentCategory, EquipmentStatus};
pub use feedback::{Feedback, FeedbackTopic, Sentiment};
pub use finance::{
    BudgetAllocation, ExpenseCategory, ExpenseTransaction, FinancialTarget, IncomeTransaction,
    IncomeType,
};
pub use member::{Member, MemberGoal, WorkoutSession};
pub use product::{Product, ProductCategory, Sale, SaleItem};
pub use trainer::{ClassSchedule, GymClass, MemberClass, Trainer};
