// Gym Insight - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod assumptions;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod logging;

// Dashboards
pub mod feedback;
pub mod finance;
pub mod inventory;
pub mod members;
pub mod products;
pub mod trainers;

// Forecasting and language-model features
pub mod chatbot;
pub mod forecast;
pub mod insight_cache;
pub mod insights;
pub mod llm;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use assumptions::{BusinessAssumptions, ElasticityTable, SeasonalityTable};
pub use config::{Config, LlmConfig};
pub use db::{
    count_rows, get_events_for_entity, insert_event, insert_expenses, insert_income,
    load_expense_csv, load_income_csv, open, setup_database, Event, ImportSummary,
};
pub use error::{AppError, AppResult, ForecastError};
pub use forecast::{
    forecast, CashFlowForecast, FinancialForecast, ForecastPoint, HistoricalPeriod,
};
pub use chatbot::{ChatbotService, Intent, IntentClassifier};
pub use insight_cache::{Clock, InsightCache, ManualClock, SystemClock};
pub use llm::{GroqClient, LlmClient};
pub use logging::init_tracing;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
