//! Product recommendations from chat behaviour
//!
//! User messages are scanned for category keywords and purchase-intent
//! phrases. The resulting profile ranks products from a static JSON catalog.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use supportbot_core::{ChatMessage, Role};

pub const INTENT_MATCH_DIVISOR: f64 = 3.0;
pub const HIGH_ENGAGEMENT_MESSAGE_COUNT: usize = 10;
pub const MEDIUM_ENGAGEMENT_MESSAGE_COUNT: usize = 4;
pub const MAX_RECOMMENDATIONS: usize = 3;
pub const CATEGORY_MATCH_WEIGHT: f64 = 2.0;
pub const RATING_WEIGHT: f64 = 1.0;
pub const STOCK_AVAILABILITY_WEIGHT: f64 = 0.5;
pub const HIGH_PURCHASE_INTENT_THRESHOLD: f64 = 0.5;
pub const MIN_MESSAGES_FOR_RECOMMENDATION: usize = 2;
pub const ENGAGED_USER_RECOMMENDATION_INTERVAL: usize = 5;

const TOP_INTERESTS: usize = 3;

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "electronics",
        &["laptop", "phone", "tablet", "computer", "headphones", "speaker", "camera", "tv", "monitor"],
    ),
    (
        "fashion",
        &["shirt", "dress", "jeans", "shoes", "jacket", "clothing", "apparel", "fashion"],
    ),
    ("home", &["furniture", "decor", "kitchen", "bedding", "appliances", "home"]),
    ("sports", &["fitness", "gym", "yoga", "sports", "exercise", "workout"]),
    ("books", &["book", "novel", "magazine", "reading", "literature"]),
    ("beauty", &["cosmetics", "skincare", "makeup", "beauty", "fragrance"]),
    ("toys", &["toy", "game", "kids", "children", "baby"]),
];

const PURCHASE_INTENT_SIGNALS: &[&str] = &[
    "buy",
    "purchase",
    "looking for",
    "need",
    "want",
    "interested in",
    "price",
    "cost",
    "how much",
    "available",
    "in stock",
    "delivery",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub fn from_message_count(count: usize) -> Self {
        if count > HIGH_ENGAGEMENT_MESSAGE_COUNT {
            EngagementLevel::High
        } else if count > MEDIUM_ENGAGEMENT_MESSAGE_COUNT {
            EngagementLevel::Medium
        } else {
            EngagementLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

/// What the chat so far says about the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub top_interests: Vec<String>,
    pub all_interests: BTreeMap<String, usize>,
    pub purchase_intent: f64,
    pub engagement_level: EngagementLevel,
}

/// Keyword-based analysis of user messages
#[derive(Debug, Clone, Copy, Default)]
pub struct BehaviorAnalyzer;

impl BehaviorAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Categories mentioned in `message`, in table order
    pub fn extract_product_interests(&self, message: &str) -> Vec<&'static str> {
        let lower = message.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(category, _)| *category)
            .collect()
    }

    /// Share of intent signals present, `matches / 3` capped at 1.0
    pub fn detect_purchase_intent(&self, message: &str) -> f64 {
        let lower = message.to_lowercase();
        let matches = PURCHASE_INTENT_SIGNALS
            .iter()
            .filter(|signal| lower.contains(*signal))
            .count();
        (matches as f64 / INTENT_MATCH_DIVISOR).min(1.0)
    }

    pub fn analyze_chat_history(&self, history: &[ChatMessage]) -> UserProfile {
        // Insertion order breaks ties between equally frequent categories
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        let mut total_intent = 0.0;
        let mut user_messages = 0;

        for message in history.iter().filter(|m| m.role == Role::User) {
            for interest in self.extract_product_interests(&message.content) {
                match counts.iter_mut().find(|(category, _)| *category == interest) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((interest, 1)),
                }
            }
            total_intent += self.detect_purchase_intent(&message.content);
            user_messages += 1;
        }

        let average = if user_messages > 0 {
            total_intent / user_messages as f64
        } else {
            0.0
        };

        let mut ranked = counts.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        UserProfile {
            top_interests: ranked
                .iter()
                .take(TOP_INTERESTS)
                .map(|(category, _)| category.to_string())
                .collect(),
            all_interests: counts
                .into_iter()
                .map(|(category, count)| (category.to_string(), count))
                .collect(),
            purchase_intent: (average * 100.0).round() / 100.0,
            engagement_level: EngagementLevel::from_message_count(user_messages),
        }
    }
}

/// Catalog entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub description: String,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock == "in-stock"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub product: Product,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    products: Vec<Product>,
}

/// Ranks catalog products against a user profile
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    analyzer: BehaviorAnalyzer,
    products: Vec<Product>,
}

impl RecommendationEngine {
    /// Load `{"products": [...]}` from `path`; a missing or invalid catalog is empty
    pub async fn load(path: &Path) -> Self {
        let products = match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str::<Catalog>(&raw) {
                Ok(catalog) => catalog.products,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "error loading product catalog");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "product catalog not found");
                Vec::new()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "error loading product catalog");
                Vec::new()
            }
        };

        Self::from_products(products)
    }

    pub fn from_products(products: Vec<Product>) -> Self {
        Self {
            analyzer: BehaviorAnalyzer::new(),
            products,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn analyze_user_behavior(&self, history: &[ChatMessage]) -> UserProfile {
        self.analyzer.analyze_chat_history(history)
    }

    /// Best products for `profile`, at most `limit` (default 3)
    ///
    /// Without interests the first catalog entries are returned unscored.
    pub fn get_product_recommendations(
        &self,
        profile: &UserProfile,
        limit: Option<usize>,
    ) -> Vec<Recommendation> {
        let limit = limit.unwrap_or(MAX_RECOMMENDATIONS);

        if profile.top_interests.is_empty() {
            return self
                .products
                .iter()
                .take(limit)
                .map(|product| Recommendation {
                    product: product.clone(),
                    relevance_score: None,
                })
                .collect();
        }

        let mut recommended: Vec<Recommendation> = self
            .products
            .iter()
            .filter(|product| {
                let category = product.category.to_lowercase();
                profile
                    .top_interests
                    .iter()
                    .any(|interest| category.contains(interest.as_str()))
            })
            .map(|product| Recommendation {
                product: product.clone(),
                relevance_score: Some(self.calculate_relevance(product, profile)),
            })
            .collect();

        recommended.sort_by(|a, b| {
            let score = b
                .relevance_score
                .unwrap_or(0.0)
                .partial_cmp(&a.relevance_score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal);
            score.then_with(|| {
                b.product
                    .rating
                    .partial_cmp(&a.product.rating)
                    .unwrap_or(Ordering::Equal)
            })
        });
        recommended.truncate(limit);
        recommended
    }

    pub fn calculate_relevance(&self, product: &Product, profile: &UserProfile) -> f64 {
        let category = product.category.to_lowercase();

        let mut score: f64 = profile
            .all_interests
            .iter()
            .filter(|(interest, _)| category.contains(interest.as_str()))
            .map(|(_, count)| *count as f64 * CATEGORY_MATCH_WEIGHT)
            .sum();

        score += product.rating / 5.0 * RATING_WEIGHT;
        if product.in_stock() {
            score += STOCK_AVAILABILITY_WEIGHT;
        }

        score * (1.0 + profile.purchase_intent)
    }

    pub fn should_show_recommendations(&self, profile: &UserProfile, messages_since_last: usize) -> bool {
        if profile.purchase_intent > HIGH_PURCHASE_INTENT_THRESHOLD
            && messages_since_last >= MIN_MESSAGES_FOR_RECOMMENDATION
        {
            return true;
        }

        profile.engagement_level == EngagementLevel::High
            && messages_since_last >= ENGAGED_USER_RECOMMENDATION_INTERVAL
    }
}
