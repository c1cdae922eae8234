//! CSV export of the latest grades.

use std::collections::HashMap;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{AgentRepository, GradeRepository};

pub const CSV_HEADER: [&str; 12] = [
    "Bot Name",
    "Owner Name",
    "Overall",
    "Objective (35%)",
    "Quality (30%)",
    "Human (20%)",
    "Volume (15%)",
    "Total Messages",
    "Total Conversations",
    "Human Interactions",
    "Reasoning",
    "Graded At",
];

const UNKNOWN: &str = "Unknown";

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let row: Vec<String> = fields.into_iter().map(|f| csv_field(f.as_ref())).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

/// Latest grade of every agent, best overall first, as CSV text.
pub async fn export_csv(grades: &dyn GradeRepository, agents: &dyn AgentRepository) -> DomainResult<String> {
    let latest = grades.latest_per_agent().await?;
    let names: HashMap<_, _> = agents
        .list()
        .await?
        .into_iter()
        .map(|a| (a.id, (a.name, a.owner_name)))
        .collect();

    let mut out = String::new();
    push_row(&mut out, CSV_HEADER);
    for g in &latest {
        let (name, owner) = names
            .get(&g.agent_id)
            .map_or((UNKNOWN, UNKNOWN), |(n, o)| (n.as_str(), o.as_str()));
        push_row(
            &mut out,
            [
                name.to_string(),
                owner.to_string(),
                format!("{:.1}", g.overall_score),
                format!("{:.1}", g.objective_score),
                format!("{:.1}", g.quality_score),
                format!("{:.1}", g.human_score),
                format!("{:.1}", g.volume_score),
                g.total_messages.to_string(),
                g.total_conversations.to_string(),
                g.human_interactions.to_string(),
                g.reasoning.clone(),
                g.created_at.to_rfc3339(),
            ],
        );
    }

    tracing::debug!(rows = latest.len(), "grades exported");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAgentRepository, SqliteGradeRepository};
    use crate::domain::models::{NewGrade, RubricScores};
    use crate::services::test_support::create_agent;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[tokio::test]
    async fn test_export_latest_grades_best_first() {
        let pool = create_migrated_test_pool().await.unwrap();
        let agents = SqliteAgentRepository::new(pool.clone());
        let grades = SqliteGradeRepository::new(pool);
        let alpha = create_agent(&agents, "Alpha").await;
        let beta = create_agent(&agents, "Beta").await;

        let grade = |agent_id, run: &str, score: f64, reasoning: &str| NewGrade {
            agent_id,
            run_id: run.to_string(),
            scores: RubricScores { objective: score, quality: score, human: score, volume: score },
            reasoning: reasoning.to_string(),
            total_messages: 4,
            total_conversations: 1,
            human_interactions: 0,
        };
        grades.create(&grade(alpha.id, "r1", 90.0, "old")).await.unwrap();
        grades.create(&grade(beta.id, "r1", 60.0, "Good, mostly")).await.unwrap();
        grades.create(&grade(alpha.id, "r2", 40.0, "slipped")).await.unwrap();

        let csv = export_csv(&grades, &agents).await.unwrap();
        let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Bot Name,Owner Name,Overall,Objective (35%)"));
        assert!(lines[1].starts_with("Beta,owner,60.0,60.0,"));
        assert!(lines[1].contains("\"Good, mostly\""));
        assert!(lines[2].starts_with("Alpha,owner,40.0,"));
        assert!(lines[2].contains("slipped"));
    }
}
