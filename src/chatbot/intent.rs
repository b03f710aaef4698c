// 🧭 Intent Rules - keyword routing for chat messages
// Ordered rules, case-insensitive substring match, first match wins

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    MemberInfo,
    TrainerInfo,
    InventoryInfo,
    FinanceInfo,
    FeedbackInfo,
    ProductInfo,
    GeneralStats,
    Greeting,
    Help,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::MemberInfo => "member_info",
            Intent::TrainerInfo => "trainer_info",
            Intent::InventoryInfo => "inventory_info",
            Intent::FinanceInfo => "finance_info",
            Intent::FeedbackInfo => "feedback_info",
            Intent::ProductInfo => "product_info",
            Intent::GeneralStats => "general_stats",
            Intent::Greeting => "greeting",
            Intent::Help => "help",
            Intent::General => "general",
        }
    }

    /// Names of the data sets consulted to answer this intent
    pub fn data_sources(&self) -> &'static [&'static str] {
        match self {
            Intent::MemberInfo => &["members"],
            Intent::TrainerInfo => &["trainers"],
            Intent::InventoryInfo => &["inventory"],
            Intent::FinanceInfo => &["finance"],
            Intent::FeedbackInfo => &["feedback"],
            Intent::ProductInfo => &["products"],
            Intent::GeneralStats => &["members", "trainers", "inventory", "finance"],
            Intent::Greeting | Intent::Help | Intent::General => &[],
        }
    }
}

// ============================================================================
// RULES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRule {
    pub intent: Intent,
    /// Lowercase substrings; any one of them selects the rule
    pub patterns: Vec<String>,
}

impl IntentRule {
    pub fn new(intent: Intent, patterns: &[&str]) -> Self {
        IntentRule {
            intent,
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Patterns found in an already-lowercased message
    fn matched_in(&self, message_lower: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|p| message_lower.contains(p.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl IntentClassifier {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        IntentClassifier { rules }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn classify(&self, message: &str) -> Classification {
        let message_lower = message.to_lowercase();

        for rule in &self.rules {
            let keywords = rule.matched_in(&message_lower);
            if !keywords.is_empty() {
                return Classification {
                    intent: rule.intent,
                    keywords,
                };
            }
        }

        Classification {
            intent: Intent::General,
            keywords: Vec::new(),
        }
    }
}

impl Default for IntentClassifier {
    /// Indonesian and English keywords used by the gym dashboard
    fn default() -> Self {
        IntentClassifier::new(vec![
            IntentRule::new(Intent::MemberInfo, &["member", "anggota", "pelanggan", "user"]),
            IntentRule::new(Intent::TrainerInfo, &["trainer", "pelatih", "instruktur"]),
            IntentRule::new(
                Intent::InventoryInfo,
                &["alat", "equipment", "inventori", "peralatan"],
            ),
            IntentRule::new(
                Intent::FinanceInfo,
                &["keuangan", "pendapatan", "pengeluaran", "finance", "revenue"],
            ),
            IntentRule::new(Intent::FeedbackInfo, &["feedback", "ulasan", "review", "keluhan"]),
            IntentRule::new(
                Intent::ProductInfo,
                &["produk", "product", "suplemen", "penjualan"],
            ),
            IntentRule::new(
                Intent::GeneralStats,
                &["statistik", "ringkasan", "overview", "total"],
            ),
            IntentRule::new(Intent::Greeting, &["halo", "hai", "hello", "hi", "selamat"]),
            IntentRule::new(Intent::Help, &["bantuan", "help", "apa yang bisa"]),
        ])
    }
}
