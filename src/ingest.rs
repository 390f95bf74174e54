use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::cache::SnapshotCache;
use crate::entity::{EntityKind, FormValues};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

fn form(pairs: &[(&str, &str)]) -> FormValues {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Loads a small realistic data set. Does nothing unless the store is empty,
/// so running it twice does not duplicate records.
pub async fn seed(cache: &SnapshotCache) -> anyhow::Result<bool> {
    if !cache.snapshot().await?.is_empty() {
        info!("store already holds records; skipping seed");
        return Ok(false);
    }

    let employees = [
        ("Avery Lee", "avery.lee@example.com", "Platform", "45"),
        ("Jules Moreno", "jules.moreno@example.com", "Design", "38.5"),
        ("Kiara Patel", "kiara.patel@example.com", "Data", "52"),
    ];
    let mut employee_ids = Vec::new();
    for (name, email, team, rate) in employees {
        let input = EntityKind::Employee.parse_form(&form(&[
            ("name", name),
            ("email", email),
            ("team", team),
            ("hourly_rate", rate),
        ]))?;
        employee_ids.push(cache.create(&input).await?.id());
    }

    let projects = [
        ("Atlas Migration", "Northwind", "18000", "2026-01-05", "2026-06-30"),
        ("Borealis Portal", "Contoso", "9500", "2026-02-01", "2026-04-30"),
    ];
    let mut project_ids = Vec::new();
    for (name, company, budget, start, end) in projects {
        let input = EntityKind::Project.parse_form(&form(&[
            ("name", name),
            ("company", company),
            ("budget", budget),
            ("start_date", start),
            ("end_date", end),
        ]))?;
        project_ids.push(cache.create(&input).await?.id());
    }

    let activities = [
        ("2026-01-26", "Schema inventory", "analysis", "180", 0, 0),
        ("2026-01-27", "Sprint planning", "meeting", "60", 1, 0),
        ("2026-01-29", "Data backfill scripts", "development", "240", 2, 0),
        ("2026-02-03", "Landing page wireframes", "design", "150", 1, 1),
        ("2026-02-04", "Auth integration", "development", "210", 0, 1),
        ("2026-02-10", "Usage dashboards", "development", "120", 2, 1),
    ];
    for (date, description, kind, minutes, employee, project) in activities {
        let employee_id = employee_ids[employee].to_string();
        let project_id = project_ids[project].to_string();
        let input = EntityKind::Activity.parse_form(&form(&[
            ("date", date),
            ("description", description),
            ("kind", kind),
            ("minutes", minutes),
            ("employee_id", employee_id.as_str()),
            ("project_id", project_id.as_str()),
        ]))?;
        cache.create(&input).await?;
    }

    info!(
        employees = employee_ids.len(),
        projects = project_ids.len(),
        activities = activities.len(),
        "seed data inserted"
    );
    Ok(true)
}

/// Imports activities from a CSV file with the columns
/// `date, description, kind, minutes, employee_email, project_name`.
/// Rows that reference unknown records or fail validation are skipped.
pub async fn import_csv(cache: &SnapshotCache, csv_path: &Path) -> anyhow::Result<ImportSummary> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        date: String,
        description: String,
        kind: String,
        minutes: String,
        employee_email: String,
        project_name: String,
    }

    let snapshot = cache.snapshot().await?;
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary::default();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed CSV row at line {line}"))?;

        let Some(employee) = snapshot
            .employees
            .iter()
            .find(|e| e.email.eq_ignore_ascii_case(row.employee_email.trim()))
        else {
            warn!(line, email = %row.employee_email, "unknown employee; row skipped");
            summary.skipped += 1;
            continue;
        };
        let Some(project) = snapshot
            .projects
            .iter()
            .find(|p| p.name == row.project_name.trim())
        else {
            warn!(line, project = %row.project_name, "unknown project; row skipped");
            summary.skipped += 1;
            continue;
        };

        let employee_id = employee.id.to_string();
        let project_id = project.id.to_string();
        let input = match EntityKind::Activity.parse_form(&form(&[
            ("date", row.date.as_str()),
            ("description", row.description.as_str()),
            ("kind", row.kind.as_str()),
            ("minutes", row.minutes.as_str()),
            ("employee_id", employee_id.as_str()),
            ("project_id", project_id.as_str()),
        ])) {
            Ok(input) => input,
            Err(errors) => {
                warn!(line, %errors, "invalid activity; row skipped");
                summary.skipped += 1;
                continue;
            }
        };

        cache.create(&input).await?;
        summary.inserted += 1;
    }

    info!(inserted = summary.inserted, skipped = summary.skipped, "import finished");
    Ok(summary)
}
