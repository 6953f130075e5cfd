use crate::models::{
    DashboardSnapshot, Decision, FeedbackRecord, FeedbackStats, ModelSlice, QueryLogRecord,
    RiskLevel, RiskOutcome, RiskSlice, TrendPoint, UsageSummary,
};

pub fn model_distribution(summary: &UsageSummary) -> Vec<ModelSlice> {
    vec![
        ModelSlice {
            name: "LLM-1 (Fast)".to_string(),
            value: summary.model_distribution.llm1,
        },
        ModelSlice {
            name: "LLM-2 (Concept)".to_string(),
            value: summary.model_distribution.llm2,
        },
        ModelSlice {
            name: "LLM-3 (Deep)".to_string(),
            value: summary.model_distribution.llm3,
        },
    ]
}

// Input is newest-first; the trend runs oldest-first with 1-based indexes.
pub fn trust_trend(history: &[QueryLogRecord]) -> Vec<TrendPoint> {
    history
        .iter()
        .filter_map(|q| q.trust_score.map(|score| (score, q.question.as_str())))
        .rev()
        .enumerate()
        .map(|(i, (score, question))| TrendPoint {
            index: i + 1,
            trust_score: score,
            question: truncate_question(question),
        })
        .collect()
}

pub fn truncate_question(question: &str) -> String {
    let mut label: String = question.chars().take(30).collect();
    if question.chars().count() > 30 {
        label.push('…');
    }
    label
}

pub fn risk_distribution(history: &[QueryLogRecord]) -> Vec<RiskSlice> {
    let mut high = 0usize;
    let mut medium = 0usize;
    let mut low = 0usize;

    for query in history {
        // NULL defaults to medium; unrecognized tags count toward no bucket.
        match query.risk_level.as_ref().unwrap_or(&RiskLevel::Medium) {
            RiskLevel::High => high += 1,
            RiskLevel::Medium => medium += 1,
            RiskLevel::Low => low += 1,
            RiskLevel::Other(_) => {}
        }
    }

    vec![
        RiskSlice {
            name: "High Risk".to_string(),
            value: high,
            color: "hsl(0, 80%, 55%)".to_string(),
        },
        RiskSlice {
            name: "Medium Risk".to_string(),
            value: medium,
            color: "hsl(45, 90%, 50%)".to_string(),
        },
        RiskSlice {
            name: "Low Risk".to_string(),
            value: low,
            color: "hsl(142, 70%, 45%)".to_string(),
        },
    ]
}

pub fn feedback_stats(feedback: &[FeedbackRecord]) -> FeedbackStats {
    // The totals match strictly: a decision outside the two canonical values
    // lands in neither count.
    let approved = feedback
        .iter()
        .filter(|f| f.decision == Decision::Approved)
        .count();
    let overridden = feedback
        .iter()
        .filter(|f| f.decision == Decision::Overridden)
        .count();

    // Per-risk buckets keep the first-insertion order of distinct keys and
    // fall back binarily: anything that is not an approval is an override.
    let mut by_risk: Vec<RiskOutcome> = Vec::new();
    for entry in feedback {
        let risk = entry
            .risk_level
            .as_ref()
            .map(RiskLevel::label)
            .unwrap_or("unknown");
        let index = match by_risk.iter().position(|bucket| bucket.risk == risk) {
            Some(index) => index,
            None => {
                by_risk.push(RiskOutcome {
                    risk: risk.to_string(),
                    approved: 0,
                    overridden: 0,
                });
                by_risk.len() - 1
            }
        };
        if entry.decision == Decision::Approved {
            by_risk[index].approved += 1;
        } else {
            by_risk[index].overridden += 1;
        }
    }

    FeedbackStats {
        approved,
        overridden,
        by_risk,
    }
}

pub fn average_trust(history: &[QueryLogRecord]) -> Option<f64> {
    let scores: Vec<f64> = history.iter().filter_map(|q| q.trust_score).collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

pub fn build_dashboard(
    summary: &UsageSummary,
    history: &[QueryLogRecord],
    feedback: &[FeedbackRecord],
) -> DashboardSnapshot {
    DashboardSnapshot {
        summary: summary.clone(),
        model_distribution: model_distribution(summary),
        average_trust_score: average_trust(history),
        trust_trend: trust_trend(history),
        risk_distribution: risk_distribution(history),
        total_feedback: feedback.len(),
        feedback: feedback_stats(feedback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelCounts;
    use chrono::Utc;
    use uuid::Uuid;

    fn query(trust_score: Option<f64>, risk_level: Option<RiskLevel>, question: &str) -> QueryLogRecord {
        QueryLogRecord {
            id: Uuid::new_v4(),
            question: question.to_string(),
            model_tier: 1,
            model_used: "t5-base".to_string(),
            trust_score,
            risk_level,
            hallucination_score: Some(0.1),
            cache_hit: false,
            cost_saved_percentage: 0.0,
            created_at: Utc::now(),
        }
    }

    fn feedback(risk_level: Option<RiskLevel>, decision: Decision) -> FeedbackRecord {
        FeedbackRecord {
            id: Uuid::new_v4(),
            question: "Is the answer grounded?".to_string(),
            answer: "Yes, with citations.".to_string(),
            trust_score: 72.0,
            risk_level,
            decision,
            query_log_id: None,
            created_at: Utc::now(),
        }
    }

    fn summary() -> UsageSummary {
        UsageSummary {
            total_queries: 12,
            cache_hit_rate: 25.0,
            avg_hallucination_score: 0.18,
            avg_cost_saved: 40.0,
            model_distribution: ModelCounts {
                llm1: 7,
                llm2: 3,
                llm3: 2,
            },
        }
    }

    #[test]
    fn model_slices_follow_declared_order() {
        let slices = model_distribution(&summary());
        let names: Vec<&str> = slices.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["LLM-1 (Fast)", "LLM-2 (Concept)", "LLM-3 (Deep)"]);
        assert_eq!(slices[0].value, 7);
        assert_eq!(slices[1].value, 3);
        assert_eq!(slices[2].value, 2);
    }

    #[test]
    fn trend_reverses_newest_first_input() {
        // Newest first, as the store returns them.
        let history = vec![
            query(Some(80.0), None, "a"),
            query(None, None, "b"),
            query(Some(60.0), None, "c"),
        ];

        let trend = trust_trend(&history);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].index, 1);
        assert_eq!(trend[0].trust_score, 60.0);
        assert_eq!(trend[0].question, "c");
        assert_eq!(trend[1].index, 2);
        assert_eq!(trend[1].trust_score, 80.0);
        assert_eq!(trend[1].question, "a");
    }

    #[test]
    fn trend_indexes_increase_from_one() {
        let history: Vec<QueryLogRecord> = (0..6)
            .map(|i| {
                let score = if i % 2 == 0 { Some(50.0 + i as f64) } else { None };
                query(score, None, "q")
            })
            .collect();

        let trend = trust_trend(&history);
        assert_eq!(trend.len(), 3);
        for (i, point) in trend.iter().enumerate() {
            assert_eq!(point.index, i + 1);
        }
    }

    #[test]
    fn question_labels_truncate_past_thirty_chars() {
        let exact = "x".repeat(30);
        assert_eq!(truncate_question(&exact), exact);

        let boundary = "x".repeat(31);
        let label = truncate_question(&boundary);
        assert_eq!(label.chars().count(), 31);
        assert!(label.starts_with(&"x".repeat(30)));
        assert!(label.ends_with('…'));

        // Counting is per character, not per byte.
        let accented = "é".repeat(31);
        let accented_label = truncate_question(&accented);
        assert_eq!(accented_label.chars().count(), 31);
        assert!(accented_label.ends_with('…'));

        assert_eq!(truncate_question("short"), "short");
    }

    #[test]
    fn risk_buckets_skip_unrecognized_levels() {
        let history = vec![
            query(None, Some(RiskLevel::High), "a"),
            query(None, Some(RiskLevel::Medium), "b"),
            query(None, None, "c"),
            query(None, Some(RiskLevel::Other("critical".to_string())), "d"),
            query(None, Some(RiskLevel::Low), "e"),
        ];

        let buckets = risk_distribution(&history);
        let names: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["High Risk", "Medium Risk", "Low Risk"]);
        assert_eq!(buckets[0].value, 1);
        // NULL defaulted to medium.
        assert_eq!(buckets[1].value, 2);
        assert_eq!(buckets[2].value, 1);

        // The shortfall against the input length is exactly the
        // unrecognized-level count.
        let counted: usize = buckets.iter().map(|b| b.value).sum();
        assert_eq!(history.len() - counted, 1);
    }

    #[test]
    fn risk_buckets_are_zeroed_for_empty_input() {
        let buckets = risk_distribution(&[]);
        assert_eq!(buckets.len(), 3);
        assert!(buckets.iter().all(|b| b.value == 0));
    }

    #[test]
    fn feedback_totals_match_strictly_but_buckets_fall_back() {
        let entries = vec![
            feedback(Some(RiskLevel::High), Decision::Approved),
            feedback(Some(RiskLevel::High), Decision::Overridden),
            feedback(Some(RiskLevel::High), Decision::Other("escalated".to_string())),
        ];

        let stats = feedback_stats(&entries);
        // The escalated entry counts in neither total...
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.overridden, 1);
        // ...but in the per-risk map it falls back to the override side.
        assert_eq!(stats.by_risk.len(), 1);
        assert_eq!(stats.by_risk[0].approved, 1);
        assert_eq!(stats.by_risk[0].overridden, 2);
    }

    #[test]
    fn by_risk_keeps_first_insertion_order() {
        let entries = vec![
            feedback(Some(RiskLevel::High), Decision::Approved),
            feedback(Some(RiskLevel::High), Decision::Overridden),
            feedback(None, Decision::Approved),
            feedback(Some(RiskLevel::Low), Decision::Approved),
        ];

        let stats = feedback_stats(&entries);
        assert_eq!(stats.approved, 3);
        assert_eq!(stats.overridden, 1);

        let expected = vec![
            RiskOutcome { risk: "high".to_string(), approved: 1, overridden: 1 },
            RiskOutcome { risk: "unknown".to_string(), approved: 1, overridden: 0 },
            RiskOutcome { risk: "low".to_string(), approved: 1, overridden: 0 },
        ];
        assert_eq!(stats.by_risk, expected);
    }

    #[test]
    fn unrecognized_risk_becomes_its_own_bucket() {
        let entries = vec![
            feedback(Some(RiskLevel::Other("Severe".to_string())), Decision::Approved),
            feedback(Some(RiskLevel::Other("Severe".to_string())), Decision::Overridden),
        ];

        let stats = feedback_stats(&entries);
        assert_eq!(stats.by_risk.len(), 1);
        assert_eq!(stats.by_risk[0].risk, "Severe");
        assert_eq!(stats.by_risk[0].approved, 1);
        assert_eq!(stats.by_risk[0].overridden, 1);
    }

    #[test]
    fn average_trust_uses_sentinel_for_empty_sets() {
        assert_eq!(average_trust(&[]), None);

        let unscored = vec![query(None, None, "a"), query(None, None, "b")];
        assert_eq!(average_trust(&unscored), None);

        let scored = vec![
            query(Some(90.0), None, "a"),
            query(None, None, "b"),
            query(Some(70.0), None, "c"),
        ];
        let avg = average_trust(&scored).unwrap();
        assert!((avg - 80.0).abs() < 1e-9);
    }

    #[test]
    fn derivations_are_deterministic() {
        let history = vec![
            query(Some(88.0), Some(RiskLevel::Low), "repeatable"),
            query(None, Some(RiskLevel::Other("odd".to_string())), "again"),
        ];
        let entries = vec![feedback(None, Decision::Approved)];

        let first = build_dashboard(&summary(), &history, &entries);
        let second = build_dashboard(&summary(), &history, &entries);
        assert_eq!(first, second);
        assert_eq!(first.total_feedback, 1);
    }
}
