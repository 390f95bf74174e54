use std::fmt::Write;

use crate::aggregate::{employee_summaries, project_aggregates};
use crate::cache::Snapshot;
use crate::models::{ChartPoint, Charts, ProfitabilityPoint, WorkloadChart, WorkloadPoint};
use crate::workload::employee_workload;

/// Two-decimal rounding applied when values leave for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn build_charts(snapshot: &Snapshot) -> Charts {
    let aggregates = project_aggregates(
        &snapshot.projects,
        &snapshot.activities,
        &snapshot.employees,
    );
    let workload = employee_workload(&snapshot.employees, &snapshot.activities);

    Charts {
        project_costs: aggregates
            .iter()
            .map(|a| ChartPoint {
                name: a.name.clone(),
                value: round2(a.cost),
            })
            .collect(),
        project_profitability: aggregates
            .iter()
            .map(|a| ProfitabilityPoint {
                name: a.name.clone(),
                budget: round2(a.budget),
                cost: round2(a.cost),
                profitability: round2(a.profitability),
            })
            .collect(),
        project_hours: aggregates
            .iter()
            .map(|a| ChartPoint {
                name: a.name.clone(),
                value: round2(a.hours),
            })
            .collect(),
        employee_workload: WorkloadChart {
            data: workload
                .employees
                .into_iter()
                .map(|employee| WorkloadPoint {
                    name: employee.name,
                    hours_by_week: employee
                        .hours_by_week
                        .into_iter()
                        .map(|(week, hours)| (week, round2(hours)))
                        .collect(),
                    total: round2(employee.total),
                })
                .collect(),
            weeks: workload.weeks,
        },
    }
}

pub fn build_report(snapshot: &Snapshot) -> String {
    let charts = build_charts(snapshot);
    let summaries = employee_summaries(&snapshot.employees, &snapshot.activities);

    let mut output = String::new();

    let _ = writeln!(output, "# Workforce Dashboard Report");
    let _ = writeln!(
        output,
        "Generated from {} employees, {} projects and {} activities",
        snapshot.employees.len(),
        snapshot.projects.len(),
        snapshot.activities.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Project Costs");

    if charts.project_costs.is_empty() {
        let _ = writeln!(output, "No projects recorded.");
    } else {
        for point in charts.project_costs.iter() {
            let _ = writeln!(output, "- {}: {:.2}", point.name, point.value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Project Profitability");

    if charts.project_profitability.is_empty() {
        let _ = writeln!(output, "No projects recorded.");
    } else {
        for point in charts.project_profitability.iter() {
            let _ = writeln!(
                output,
                "- {}: budget {:.2}, cost {:.2}, profitability {:.2}",
                point.name, point.budget, point.cost, point.profitability
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Project Hours");

    if charts.project_hours.is_empty() {
        let _ = writeln!(output, "No projects recorded.");
    } else {
        for point in charts.project_hours.iter() {
            let _ = writeln!(output, "- {}: {:.2} h", point.name, point.value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Employee Workload");

    let workload = &charts.employee_workload;
    if workload.data.is_empty() {
        let _ = writeln!(output, "No employees recorded.");
    } else {
        let mut header = String::from("| Employee |");
        let mut rule = String::from("| --- |");
        for week in workload.weeks.iter() {
            let _ = write!(header, " {week} |");
            rule.push_str(" ---: |");
        }
        let _ = writeln!(output, "{header} Total | Projects |");
        let _ = writeln!(output, "{rule} ---: | ---: |");

        for (point, summary) in workload.data.iter().zip(summaries.iter()) {
            let mut row = format!("| {} |", point.name);
            for week in workload.weeks.iter() {
                let hours = point.hours_by_week.get(week).copied().unwrap_or(0.0);
                let _ = write!(row, " {hours:.2} |");
            }
            let _ = writeln!(
                output,
                "{row} {:.2} | {} |",
                point.total, summary.project_count
            );
        }
    }

    output
}
