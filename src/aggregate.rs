use std::collections::{HashMap, HashSet};

use crate::models::{Activity, Employee, EmployeeSummary, Project, ProjectAggregate};

pub fn activity_hours(minutes: i32) -> f64 {
    f64::from(minutes) / 60.0
}

/// Sum of `minutes / 60 * hourly_rate` over `activities`. Activities whose
/// employee is not in `employees` contribute nothing. Not rounded.
pub fn activities_cost<'a, I>(activities: I, employees: &[Employee]) -> f64
where
    I: IntoIterator<Item = &'a Activity>,
{
    let mut rates: HashMap<i64, f64> = HashMap::with_capacity(employees.len());
    for employee in employees {
        rates.entry(employee.id).or_insert(employee.hourly_rate);
    }

    activities
        .into_iter()
        .filter_map(|activity| {
            rates
                .get(&activity.employee_id)
                .map(|rate| activity_hours(activity.minutes) * rate)
        })
        .sum()
}

/// One aggregate per project, in the order `projects` is given.
pub fn project_aggregates(
    projects: &[Project],
    activities: &[Activity],
    employees: &[Employee],
) -> Vec<ProjectAggregate> {
    let mut by_project: HashMap<i64, Vec<&Activity>> = HashMap::new();
    for activity in activities {
        by_project.entry(activity.project_id).or_default().push(activity);
    }

    projects
        .iter()
        .map(|project| {
            let project_activities = by_project
                .get(&project.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let cost = activities_cost(project_activities.iter().copied(), employees);
            let minutes: i64 = project_activities
                .iter()
                .map(|activity| i64::from(activity.minutes))
                .sum();

            ProjectAggregate {
                project_id: project.id,
                name: project.name.clone(),
                budget: project.budget,
                cost,
                hours: minutes as f64 / 60.0,
                profitability: project.budget - cost,
                activity_count: project_activities.len(),
            }
        })
        .collect()
}

pub fn employee_summaries(employees: &[Employee], activities: &[Activity]) -> Vec<EmployeeSummary> {
    employees
        .iter()
        .map(|employee| {
            let mut total_hours = 0.0;
            let mut projects = HashSet::new();
            for activity in activities.iter().filter(|a| a.employee_id == employee.id) {
                total_hours += activity_hours(activity.minutes);
                projects.insert(activity.project_id);
            }

            EmployeeSummary {
                employee_id: employee.id,
                name: employee.name.clone(),
                total_hours,
                project_count: projects.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn employee(id: i64, hourly_rate: f64) -> Employee {
        Employee {
            id,
            name: format!("Employee {id}"),
            email: format!("employee{id}@example.com"),
            team: "Platform".to_string(),
            hourly_rate,
        }
    }

    fn project(id: i64, budget: f64) -> Project {
        Project {
            id,
            name: format!("Project {id}"),
            company: "Acme".to_string(),
            budget,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        }
    }

    fn activity(id: i64, employee_id: i64, project_id: i64, minutes: i32) -> Activity {
        Activity {
            id,
            description: "Work".to_string(),
            kind: "development".to_string(),
            minutes,
            employee_id,
            project_id,
            date: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
            employee_name: None,
            project_name: None,
        }
    }

    #[test]
    fn ninety_minutes_at_twenty_per_hour_costs_thirty() {
        let cost = activities_cost(&[activity(1, 1, 1, 90)], &[employee(1, 20.0)]);
        assert!((cost - 30.0).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs_cost_nothing() {
        let employees = vec![employee(1, 20.0)];
        let activities = vec![activity(1, 1, 1, 60)];
        assert_eq!(activities_cost(&[], &employees), 0.0);
        assert_eq!(activities_cost(&activities, &[]), 0.0);
    }

    #[test]
    fn unknown_employee_contributes_zero() {
        let employees = vec![employee(1, 20.0)];
        let with_orphan = vec![activity(1, 1, 1, 60), activity(2, 99, 1, 10_000)];
        assert!((activities_cost(&with_orphan, &employees) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn cost_is_additive_over_activities() {
        let employees = vec![employee(1, 17.35), employee(2, 48.9), employee(3, 0.0)];
        let activities = vec![
            activity(1, 1, 1, 25),
            activity(2, 2, 1, 95),
            activity(3, 3, 2, 40),
            activity(4, 7, 2, 30),
            activity(5, 2, 3, 0),
            activity(6, 1, 3, -15),
        ];

        let whole = activities_cost(&activities, &employees);
        let parts: f64 = activities
            .iter()
            .map(|a| activities_cost(std::iter::once(a), &employees))
            .sum();
        assert!((whole - parts).abs() < 1e-9);
    }

    #[test]
    fn cost_is_not_rounded_while_accumulating() {
        let employees = vec![employee(1, 10.0)];
        let activities: Vec<Activity> = (0..3).map(|i| activity(i, 1, 1, 1)).collect();
        let cost = activities_cost(&activities, &employees);
        assert!((cost - 0.5).abs() < 1e-9);
    }

    #[test]
    fn profitability_is_budget_minus_cost() {
        let employees = vec![employee(1, 50.0)];
        let projects = vec![project(1, 1000.0), project(2, 1000.0)];
        let activities = vec![activity(1, 1, 1, 300)];

        let aggregates = project_aggregates(&projects, &activities, &employees);
        assert_eq!(aggregates[0].cost, 250.0);
        assert_eq!(aggregates[0].profitability, 750.0);
        assert_eq!(aggregates[0].hours, 5.0);
        assert_eq!(aggregates[0].activity_count, 1);

        assert_eq!(aggregates[1].cost, 0.0);
        assert_eq!(aggregates[1].hours, 0.0);
        assert_eq!(aggregates[1].profitability, 1000.0);
        assert_eq!(aggregates[1].activity_count, 0);
    }

    #[test]
    fn profitability_goes_negative_when_over_budget() {
        let aggregates = project_aggregates(
            &[project(1, 100.0)],
            &[activity(1, 1, 1, 600)],
            &[employee(1, 30.0)],
        );
        assert_eq!(aggregates[0].profitability, -200.0);
    }

    #[test]
    fn aggregates_follow_project_input_order() {
        let projects = vec![project(3, 10.0), project(1, 20.0), project(2, 30.0)];
        let aggregates = project_aggregates(&projects, &[], &[]);
        let ids: Vec<i64> = aggregates.iter().map(|a| a.project_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn summaries_count_hours_and_distinct_projects() {
        let employees = vec![employee(1, 20.0), employee(2, 20.0)];
        let activities = vec![
            activity(1, 1, 1, 30),
            activity(2, 1, 1, 30),
            activity(3, 1, 2, 60),
        ];

        let summaries = employee_summaries(&employees, &activities);
        assert_eq!(summaries[0].total_hours, 2.0);
        assert_eq!(summaries[0].project_count, 2);
        assert_eq!(summaries[1].total_hours, 0.0);
        assert_eq!(summaries[1].project_count, 0);
    }
}
