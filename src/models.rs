use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Other(String),
}

impl RiskLevel {
    // Canonical names match case-insensitively; anything else is tagged
    // with the ingested string kept verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Other(raw.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Overridden,
    Other(String),
}

impl Decision {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "approved" => Decision::Approved,
            "overridden" => Decision::Overridden,
            _ => Decision::Other(raw.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Decision::Approved => "approved",
            Decision::Overridden => "overridden",
            Decision::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub trust_score: f64,
    pub risk_level: Option<RiskLevel>,
    pub decision: Decision,
    pub query_log_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QueryLogRecord {
    pub id: Uuid,
    pub question: String,
    pub model_tier: i16,
    pub model_used: String,
    pub trust_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub hallucination_score: Option<f64>,
    pub cache_hit: bool,
    pub cost_saved_percentage: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelCounts {
    pub llm1: i64,
    pub llm2: i64,
    pub llm3: i64,
}

// Pre-aggregated by the store; consumed as-is, never recomputed client-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total_queries: i64,
    pub cache_hit_rate: f64,
    pub avg_hallucination_score: f64,
    pub avg_cost_saved: f64,
    pub model_distribution: ModelCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSlice {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub index: usize,
    pub trust_score: f64,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSlice {
    pub name: String,
    pub value: usize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskOutcome {
    pub risk: String,
    pub approved: usize,
    pub overridden: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub approved: usize,
    pub overridden: usize,
    pub by_risk: Vec<RiskOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub summary: UsageSummary,
    pub model_distribution: Vec<ModelSlice>,
    pub average_trust_score: Option<f64>,
    pub trust_trend: Vec<TrendPoint>,
    pub risk_distribution: Vec<RiskSlice>,
    pub total_feedback: usize,
    pub feedback: FeedbackStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_parse_is_case_insensitive() {
        assert_eq!(RiskLevel::parse("HIGH"), RiskLevel::High);
        assert_eq!(RiskLevel::parse(" Medium "), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse("low"), RiskLevel::Low);
    }

    #[test]
    fn unrecognized_risk_keeps_raw_string() {
        assert_eq!(
            RiskLevel::parse("Severe"),
            RiskLevel::Other("Severe".to_string())
        );
        assert_eq!(RiskLevel::parse("Severe").label(), "Severe");
    }

    #[test]
    fn decision_parse_tags_unknown_values() {
        assert_eq!(Decision::parse("approved"), Decision::Approved);
        assert_eq!(Decision::parse("Overridden"), Decision::Overridden);
        assert_eq!(
            Decision::parse("escalated"),
            Decision::Other("escalated".to_string())
        );
    }
}
