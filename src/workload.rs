use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};

use crate::aggregate::activity_hours;
use crate::models::{Activity, Employee, EmployeeWorkload, WeekLabel, Workload};

/// Week of year under the "week containing Thursday" convention: move the
/// date to the Thursday of its Monday-start week, then count 7-day blocks
/// from January 1 of that Thursday's year. At the edges of the calendar
/// range the date itself stands in for its Thursday.
pub fn week_number(date: NaiveDate) -> u32 {
    let weekday = i64::from(date.weekday().number_from_monday());
    let thursday = date
        .checked_add_signed(Duration::days(4 - weekday))
        .unwrap_or(date);
    (thursday.ordinal0() + 1).div_ceil(7)
}

pub fn week_label(date: NaiveDate) -> WeekLabel {
    WeekLabel(week_number(date))
}

/// Hours per employee per week. Weeks are keyed by number only, so the same
/// week of different years shares a bucket.
pub fn employee_workload(employees: &[Employee], activities: &[Activity]) -> Workload {
    let labelled: Vec<(WeekLabel, &Activity)> = activities
        .iter()
        .map(|activity| (week_label(activity.date), activity))
        .collect();

    let weeks: Vec<WeekLabel> = labelled
        .iter()
        .map(|(week, _)| *week)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let employees = employees
        .iter()
        .map(|employee| {
            let mut hours_by_week: BTreeMap<WeekLabel, f64> = BTreeMap::new();
            let mut total = 0.0;
            for (week, activity) in labelled
                .iter()
                .filter(|(_, activity)| activity.employee_id == employee.id)
            {
                let hours = activity_hours(activity.minutes);
                *hours_by_week.entry(*week).or_insert(0.0) += hours;
                total += hours;
            }

            EmployeeWorkload {
                employee_id: employee.id,
                name: employee.name.clone(),
                hours_by_week,
                total,
            }
        })
        .collect();

    Workload { employees, weeks }
}
