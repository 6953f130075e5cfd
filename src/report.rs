use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::aggregate;
use crate::models::{FeedbackRecord, QueryLogRecord, UsageSummary};

pub fn build_report(
    generated_at: DateTime<Utc>,
    summary: &UsageSummary,
    history: &[QueryLogRecord],
    feedback: &[FeedbackRecord],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cascade Trust Analytics Report");
    let _ = writeln!(
        output,
        "Generated {}",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total queries: {}", summary.total_queries);
    let _ = writeln!(output, "- Cache hit rate: {:.1}%", summary.cache_hit_rate);
    let _ = writeln!(
        output,
        "- Avg hallucination score: {:.2}",
        summary.avg_hallucination_score
    );
    let _ = writeln!(output, "- Avg cost saved: {:.1}%", summary.avg_cost_saved);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Model Usage");

    let slices = aggregate::model_distribution(summary);
    let total: i64 = slices.iter().map(|s| s.value).sum();
    if total == 0 {
        let _ = writeln!(output, "No queries recorded.");
    } else {
        for slice in slices.iter() {
            let _ = writeln!(
                output,
                "- {}: {} queries ({:.1}%)",
                slice.name,
                slice.value,
                slice.value as f64 * 100.0 / total as f64
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Queries");

    if history.is_empty() {
        let _ = writeln!(output, "No queries recorded.");
    } else {
        // Newest-first, like the store returns them.
        for query in history.iter().take(10) {
            let hallucination = query
                .hallucination_score
                .map(|score| format!("{score:.2}"))
                .unwrap_or_else(|| "—".to_string());
            let _ = writeln!(
                output,
                "- {} [{} (tier {})] hallucination {}, cache {}, saved {:.0}%",
                aggregate::truncate_question(&query.question),
                query.model_used,
                query.model_tier,
                hallucination,
                if query.cache_hit { "⚡" } else { "—" },
                query.cost_saved_percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trust & Feedback");

    match aggregate::average_trust(history) {
        Some(avg) => {
            let _ = writeln!(output, "- Average trust score: {avg:.1}");
        }
        None => {
            let _ = writeln!(output, "- Average trust score: —");
        }
    }

    let trend = aggregate::trust_trend(history);
    if trend.is_empty() {
        let _ = writeln!(output, "- Trust trend: no scored queries.");
    } else {
        let _ = writeln!(output, "- Trust trend (oldest first, last 10):");
        let skip = trend.len().saturating_sub(10);
        for point in trend.iter().skip(skip) {
            let _ = writeln!(
                output,
                "  {}. {:.0} — {}",
                point.index, point.trust_score, point.question
            );
        }
    }

    let _ = writeln!(output, "- Risk distribution:");
    for slice in aggregate::risk_distribution(history) {
        let _ = writeln!(output, "  - {}: {}", slice.name, slice.value);
    }

    let stats = aggregate::feedback_stats(feedback);
    let _ = writeln!(
        output,
        "- Review outcomes: {} approved, {} overridden",
        stats.approved, stats.overridden
    );
    if !stats.by_risk.is_empty() {
        let _ = writeln!(output, "- Outcomes by risk level:");
        for outcome in stats.by_risk.iter() {
            let _ = writeln!(
                output,
                "  - {}: {} approved / {} overridden",
                outcome.risk, outcome.approved, outcome.overridden
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Human Feedback");

    if feedback.is_empty() {
        let _ = writeln!(output, "No feedback recorded.");
    } else {
        // Input comes newest-first from the store; keep that order.
        for entry in feedback.iter().take(10) {
            let _ = writeln!(
                output,
                "- [{}] {} ({}, trust {:.0}): {}",
                entry.decision.label(),
                aggregate::truncate_question(&entry.question),
                entry
                    .risk_level
                    .as_ref()
                    .map(|r| r.label())
                    .unwrap_or("unknown"),
                entry.trust_score,
                entry.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Decision, ModelCounts, RiskLevel};
    use uuid::Uuid;

    fn summary() -> UsageSummary {
        UsageSummary {
            total_queries: 10,
            cache_hit_rate: 30.0,
            avg_hallucination_score: 0.12,
            avg_cost_saved: 45.0,
            model_distribution: ModelCounts {
                llm1: 6,
                llm2: 3,
                llm3: 1,
            },
        }
    }

    #[test]
    fn empty_inputs_render_placeholder_lines() {
        let report = build_report(Utc::now(), &summary(), &[], &[]);
        assert!(report.contains("Average trust score: —"));
        assert!(report.contains("no scored queries"));
        assert!(report.contains("No feedback recorded."));
        assert!(report.contains("No queries recorded."));
        assert!(report.contains("High Risk: 0"));
    }

    #[test]
    fn recent_queries_list_the_newest_rows() {
        let history: Vec<QueryLogRecord> = (0..12)
            .map(|i| QueryLogRecord {
                id: Uuid::new_v4(),
                question: format!("question {i}"),
                model_tier: 1,
                model_used: "llm1-fast".to_string(),
                trust_score: Some(80.0),
                risk_level: None,
                hallucination_score: if i == 0 { None } else { Some(0.07) },
                cache_hit: i == 0,
                cost_saved_percentage: 64.0,
                created_at: Utc::now(),
            })
            .collect();

        let report = build_report(Utc::now(), &summary(), &history, &[]);
        assert!(report.contains("## Recent Queries"));
        // Ten newest rows only, newest first.
        assert!(report.contains("- question 0 [llm1-fast (tier 1)]"));
        assert!(report.contains("- question 9 "));
        assert!(!report.contains("- question 10 "));
        // Cache marker and the dash for a missing hallucination score.
        assert!(report.contains("hallucination —, cache ⚡, saved 64%"));
        assert!(report.contains("hallucination 0.07, cache —, saved 64%"));
    }

    #[test]
    fn report_includes_outcomes_and_recent_rows() {
        let feedback = vec![FeedbackRecord {
            id: Uuid::new_v4(),
            question: "Is the cap twelve months of fees?".to_string(),
            answer: "Yes.".to_string(),
            trust_score: 58.0,
            risk_level: Some(RiskLevel::High),
            decision: Decision::Overridden,
            query_log_id: None,
            created_at: Utc::now(),
        }];
        let history = vec![QueryLogRecord {
            id: Uuid::new_v4(),
            question: "Is the cap twelve months of fees?".to_string(),
            model_tier: 3,
            model_used: "llm3-deep".to_string(),
            trust_score: Some(58.0),
            risk_level: Some(RiskLevel::High),
            hallucination_score: Some(0.3),
            cache_hit: false,
            cost_saved_percentage: 0.0,
            created_at: Utc::now(),
        }];

        let report = build_report(Utc::now(), &summary(), &history, &feedback);
        assert!(report.contains("Average trust score: 58.0"));
        assert!(report.contains("0 approved, 1 overridden"));
        assert!(report.contains("high: 0 approved / 1 overridden"));
        assert!(report.contains("[overridden]"));
        assert!(report.contains("LLM-1 (Fast): 6 queries (60.0%)"));
    }
}
