use anyhow::Context;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Decision, FeedbackRecord, ModelCounts, QueryLogRecord, RiskLevel, UsageSummary,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let queries = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "What is the refund window for annual plans?",
            1_i16,
            "llm1-fast",
            Some(82.0_f64),
            Some("low"),
            Some(0.08_f64),
            true,
            64.0_f64,
            now - Duration::minutes(45),
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Summarize the liability clause in section 12 of the vendor contract",
            3_i16,
            "llm3-deep",
            Some(58.0),
            Some("high"),
            Some(0.31),
            false,
            0.0,
            now - Duration::minutes(30),
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "How do I rotate the API signing key?",
            2_i16,
            "llm2-concept",
            None,
            None,
            Some(0.15),
            false,
            22.0,
            now - Duration::minutes(12),
        ),
        (
            Uuid::parse_str("8b1c9e2d-6f3a-4c5b-9d7e-1a2b3c4d5e6f")?,
            "Does the SLA cover scheduled maintenance windows?",
            1_i16,
            "llm1-fast",
            Some(91.0),
            Some("medium"),
            Some(0.05),
            true,
            71.0,
            now - Duration::minutes(5),
        ),
    ];

    for (
        id,
        question,
        model_tier,
        model_used,
        trust_score,
        risk_level,
        hallucination_score,
        cache_hit,
        cost_saved_percentage,
        created_at,
    ) in queries
    {
        sqlx::query(
            r#"
            INSERT INTO trust_analytics.query_logs
            (id, question, model_tier, model_used, trust_score, risk_level,
             hallucination_score, cache_hit, cost_saved_percentage, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(question)
        .bind(model_tier)
        .bind(model_used)
        .bind(trust_score)
        .bind(risk_level)
        .bind(hallucination_score)
        .bind(cache_hit)
        .bind(cost_saved_percentage)
        .bind(created_at)
        .execute(pool)
        .await?;
    }

    let feedback = vec![
        (
            Uuid::parse_str("a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d")?,
            "Summarize the liability clause in section 12 of the vendor contract",
            "The clause caps liability at twelve months of fees, excluding gross negligence.",
            58.0_f64,
            Some("high"),
            "overridden",
            Some(Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?),
            now - Duration::minutes(25),
        ),
        (
            Uuid::parse_str("b2c3d4e5-f6a7-4b8c-9d0e-1f2a3b4c5d6e")?,
            "How do I rotate the API signing key?",
            "Use the console's Credentials page; old keys stay valid for 24 hours.",
            66.0,
            None,
            "approved",
            Some(Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?),
            now - Duration::minutes(10),
        ),
        (
            Uuid::parse_str("c3d4e5f6-a7b8-4c9d-0e1f-2a3b4c5d6e7f")?,
            "What is the refund window for annual plans?",
            "Thirty days from the invoice date, prorated after that.",
            82.0,
            Some("low"),
            "approved",
            Some(Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?),
            now - Duration::minutes(40),
        ),
    ];

    for (id, question, answer, trust_score, risk_level, decision, query_log_id, created_at) in
        feedback
    {
        sqlx::query(
            r#"
            INSERT INTO trust_analytics.human_feedback
            (id, question, answer, trust_score, risk_level, decision, query_log_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(question)
        .bind(answer)
        .bind(trust_score)
        .bind(risk_level)
        .bind(decision)
        .bind(query_log_id)
        .bind(created_at)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_feedback(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<FeedbackRecord>> {
    let rows = sqlx::query(
        "SELECT id, question, answer, trust_score, risk_level, decision, \
         query_log_id, created_at \
         FROM trust_analytics.human_feedback \
         ORDER BY created_at DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch human feedback")?;

    let mut records = Vec::new();
    for row in rows {
        let risk_level: Option<String> = row.get("risk_level");
        let decision: String = row.get("decision");
        records.push(FeedbackRecord {
            id: row.get("id"),
            question: row.get("question"),
            answer: row.get("answer"),
            trust_score: row.get("trust_score"),
            risk_level: risk_level.as_deref().map(RiskLevel::parse),
            decision: Decision::parse(&decision),
            query_log_id: row.get("query_log_id"),
            created_at: row.get("created_at"),
        });
    }

    Ok(records)
}

pub async fn fetch_query_logs(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<QueryLogRecord>> {
    let rows = sqlx::query(
        "SELECT id, question, model_tier, model_used, trust_score, risk_level, \
         hallucination_score, cache_hit, cost_saved_percentage, created_at \
         FROM trust_analytics.query_logs \
         ORDER BY created_at DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch query logs")?;

    let mut records = Vec::new();
    for row in rows {
        let risk_level: Option<String> = row.get("risk_level");
        records.push(QueryLogRecord {
            id: row.get("id"),
            question: row.get("question"),
            model_tier: row.get("model_tier"),
            model_used: row.get("model_used"),
            trust_score: row.get("trust_score"),
            risk_level: risk_level.as_deref().map(RiskLevel::parse),
            hallucination_score: row.get("hallucination_score"),
            cache_hit: row.get("cache_hit"),
            cost_saved_percentage: row.get("cost_saved_percentage"),
            created_at: row.get("created_at"),
        });
    }

    Ok(records)
}

// The pre-aggregated stats the store hands to the dashboard; one row,
// computed server-side so the client never recounts the full table.
pub async fn fetch_usage_summary(pool: &PgPool) -> anyhow::Result<UsageSummary> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total_queries, \
         COUNT(*) FILTER (WHERE model_tier = 1) AS llm1, \
         COUNT(*) FILTER (WHERE model_tier = 2) AS llm2, \
         COUNT(*) FILTER (WHERE model_tier = 3) AS llm3, \
         COALESCE(AVG(CASE WHEN cache_hit THEN 100.0 ELSE 0.0 END)::float8, 0) AS cache_hit_rate, \
         COALESCE(AVG(hallucination_score), 0) AS avg_hallucination_score, \
         COALESCE(AVG(cost_saved_percentage), 0) AS avg_cost_saved \
         FROM trust_analytics.query_logs",
    )
    .fetch_one(pool)
    .await
    .context("failed to fetch usage summary")?;

    Ok(UsageSummary {
        total_queries: row.get("total_queries"),
        cache_hit_rate: row.get("cache_hit_rate"),
        avg_hallucination_score: row.get("avg_hallucination_score"),
        avg_cost_saved: row.get("avg_cost_saved"),
        model_distribution: ModelCounts {
            llm1: row.get("llm1"),
            llm2: row.get("llm2"),
            llm3: row.get("llm3"),
        },
    })
}

pub fn export_feedback_csv(
    records: &[FeedbackRecord],
    out: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Serialize)]
    struct CsvRow<'a> {
        id: Uuid,
        question: &'a str,
        answer: &'a str,
        trust_score: f64,
        risk_level: &'a str,
        decision: &'a str,
        query_log_id: Option<Uuid>,
        created_at: chrono::DateTime<Utc>,
    }

    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to open {} for writing", out.display()))?;

    for record in records {
        writer.serialize(CsvRow {
            id: record.id,
            question: &record.question,
            answer: &record.answer,
            trust_score: record.trust_score,
            risk_level: record
                .risk_level
                .as_ref()
                .map(RiskLevel::label)
                .unwrap_or(""),
            decision: record.decision.label(),
            query_log_id: record.query_log_id,
            created_at: record.created_at,
        })?;
    }

    writer.flush()?;
    Ok(records.len())
}

pub fn export_query_logs_csv(
    records: &[QueryLogRecord],
    out: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Serialize)]
    struct CsvRow<'a> {
        id: Uuid,
        question: &'a str,
        model_tier: i16,
        model_used: &'a str,
        trust_score: Option<f64>,
        risk_level: &'a str,
        hallucination_score: Option<f64>,
        cache_hit: bool,
        cost_saved_percentage: f64,
        created_at: chrono::DateTime<Utc>,
    }

    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to open {} for writing", out.display()))?;

    for record in records {
        writer.serialize(CsvRow {
            id: record.id,
            question: &record.question,
            model_tier: record.model_tier,
            model_used: &record.model_used,
            trust_score: record.trust_score,
            risk_level: record
                .risk_level
                .as_ref()
                .map(RiskLevel::label)
                .unwrap_or(""),
            hallucination_score: record.hallucination_score,
            cache_hit: record.cache_hit,
            cost_saved_percentage: record.cost_saved_percentage,
            created_at: record.created_at,
        })?;
    }

    writer.flush()?;
    Ok(records.len())
}
