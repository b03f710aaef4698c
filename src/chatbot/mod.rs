// 🤖 Chatbot - intent routing over dashboard data plus a language model

pub mod intent;
pub mod service;

pub use intent::{Classification, Intent, IntentClassifier, IntentRule};
pub use service::{ChatRequest, ChatResponse, ChatbotService, PreparedTurn, FALLBACK_REPLY};
