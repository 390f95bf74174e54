use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::entity::EntityKind;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub team: String,
    pub hourly_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub company: String,
    pub budget: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Activity {
    pub id: i64,
    pub description: String,
    pub kind: String,
    pub minutes: i32,
    pub employee_id: i64,
    pub project_id: i64,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub name: String,
    pub email: String,
    pub team: String,
    pub hourly_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub company: String,
    pub budget: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub description: String,
    pub kind: String,
    pub minutes: i32,
    pub employee_id: i64,
    pub project_id: i64,
    pub date: NaiveDate,
}

/// A stored record of any kind, as returned by create, update and list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Employee(Employee),
    Project(Project),
    Activity(Activity),
}

impl Entity {
    pub fn id(&self) -> i64 {
        match self {
            Entity::Employee(employee) => employee.id,
            Entity::Project(project) => project.id,
            Entity::Activity(activity) => activity.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Employee(_) => EntityKind::Employee,
            Entity::Project(_) => EntityKind::Project,
            Entity::Activity(_) => EntityKind::Activity,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Employee(e) => write!(
                f,
                "#{} {} <{}> team {} at {:.2}/h",
                e.id, e.name, e.email, e.team, e.hourly_rate
            ),
            Entity::Project(p) => write!(
                f,
                "#{} {} ({}) budget {:.2}, {} to {}",
                p.id, p.name, p.company, p.budget, p.start_date, p.end_date
            ),
            Entity::Activity(a) => write!(
                f,
                "#{} {} [{}] {} min on {} by {} for {}",
                a.id,
                a.description,
                a.kind,
                a.minutes,
                a.date,
                a.employee_name.as_deref().unwrap_or("unknown employee"),
                a.project_name.as_deref().unwrap_or("unknown project"),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAggregate {
    pub project_id: i64,
    pub name: String,
    pub budget: f64,
    pub cost: f64,
    pub hours: f64,
    pub profitability: f64,
    pub activity_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeSummary {
    pub employee_id: i64,
    pub name: String,
    pub total_hours: f64,
    pub project_count: usize,
}

/// Week-of-year bucket, rendered as `Semana {n}`. Orders by week number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekLabel(pub u32);

impl fmt::Display for WeekLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Semana {}", self.0)
    }
}

impl Serialize for WeekLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeWorkload {
    pub employee_id: i64,
    pub name: String,
    pub hours_by_week: BTreeMap<WeekLabel, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workload {
    pub employees: Vec<EmployeeWorkload>,
    pub weeks: Vec<WeekLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityPoint {
    pub name: String,
    pub budget: f64,
    pub cost: f64,
    pub profitability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadPoint {
    pub name: String,
    #[serde(flatten)]
    pub hours_by_week: BTreeMap<WeekLabel, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadChart {
    pub data: Vec<WorkloadPoint>,
    pub weeks: Vec<WeekLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Charts {
    pub project_costs: Vec<ChartPoint>,
    pub project_profitability: Vec<ProfitabilityPoint>,
    pub project_hours: Vec<ChartPoint>,
    pub employee_workload: WorkloadChart,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_json_names_references_only_when_joined() {
        let mut activity = Activity {
            id: 3,
            description: "Review".to_string(),
            kind: "meeting".to_string(),
            minutes: 45,
            employee_id: 1,
            project_id: 2,
            date: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
            employee_name: None,
            project_name: None,
        };

        let bare = serde_json::to_value(&activity).unwrap();
        assert_eq!(bare["date"], "2026-02-02");
        assert!(bare.get("employee_name").is_none());
        assert!(bare.get("project_name").is_none());

        activity.employee_name = Some("Avery Chen".to_string());
        let joined = serde_json::to_value(Entity::Activity(activity)).unwrap();
        assert_eq!(joined["employee_name"], "Avery Chen");
        assert!(joined.get("project_name").is_none());
    }
}
