use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ValidationErrors;
use crate::models::{Entity, NewActivity, NewEmployee, NewProject};

/// Raw form submission: field name to the value as typed by the user.
pub type FormValues = BTreeMap<String, String>;

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Four-digit years only; chrono alone accepts signed years out to ±262142.
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum EntityKind {
    #[value(alias = "employees")]
    Employee,
    #[value(alias = "projects")]
    Project,
    #[value(alias = "activities")]
    Activity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Email,
    Number,
    Date,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    NonNegativeNumber,
    PositiveInteger,
    Date,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub field_type: FieldType,
    pub rule: Rule,
}

const fn field(name: &'static str, label: &'static str, field_type: FieldType, rule: Rule) -> FieldSpec {
    FieldSpec {
        name,
        label,
        field_type,
        rule,
    }
}

const EMPLOYEE_FIELDS: &[FieldSpec] = &[
    field("name", "Name", FieldType::Text, Rule::Required),
    field("email", "Email", FieldType::Email, Rule::Email),
    field("team", "Team", FieldType::Text, Rule::Required),
    field("hourly_rate", "Hourly rate", FieldType::Number, Rule::NonNegativeNumber),
];

const PROJECT_FIELDS: &[FieldSpec] = &[
    field("name", "Name", FieldType::Text, Rule::Required),
    field("company", "Company", FieldType::Text, Rule::Required),
    field("budget", "Budget", FieldType::Number, Rule::NonNegativeNumber),
    field("start_date", "Start date", FieldType::Date, Rule::Date),
    field("end_date", "End date", FieldType::Date, Rule::Date),
];

const ACTIVITY_FIELDS: &[FieldSpec] = &[
    field("date", "Date", FieldType::Date, Rule::Date),
    field("description", "Description", FieldType::Text, Rule::Required),
    field("kind", "Type", FieldType::Text, Rule::Required),
    field("minutes", "Minutes", FieldType::Number, Rule::PositiveInteger),
    field("employee_id", "Employee", FieldType::Select, Rule::Reference),
    field("project_id", "Project", FieldType::Select, Rule::Reference),
];

/// Validated create/update payload for one kind of record.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityInput {
    Employee(NewEmployee),
    Project(NewProject),
    Activity(NewActivity),
}

impl EntityInput {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityInput::Employee(_) => EntityKind::Employee,
            EntityInput::Project(_) => EntityKind::Project,
            EntityInput::Activity(_) => EntityKind::Activity,
        }
    }
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Employee, EntityKind::Project, EntityKind::Activity];

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Employee => "employee",
            EntityKind::Project => "project",
            EntityKind::Activity => "activity",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            EntityKind::Employee => "/api/employees",
            EntityKind::Project => "/api/projects",
            EntityKind::Activity => "/api/activities",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            EntityKind::Employee => EMPLOYEE_FIELDS,
            EntityKind::Project => PROJECT_FIELDS,
            EntityKind::Activity => ACTIVITY_FIELDS,
        }
    }

    /// Validates a form submission against this kind's field table and
    /// builds the typed payload. All violations are reported at once.
    pub fn parse_form(self, form: &FormValues) -> Result<EntityInput, ValidationErrors> {
        let mut parser = FormParser::new(self, form);

        let input = match self {
            EntityKind::Employee => {
                let name = parser.text("name");
                let email = parser.text("email");
                let team = parser.text("team");
                let hourly_rate = parser.number("hourly_rate");

                let (Some(name), Some(email), Some(team), Some(hourly_rate)) =
                    (name, email, team, hourly_rate)
                else {
                    return Err(parser.errors);
                };
                EntityInput::Employee(NewEmployee {
                    name,
                    email,
                    team,
                    hourly_rate,
                })
            }
            EntityKind::Project => {
                let name = parser.text("name");
                let company = parser.text("company");
                let budget = parser.number("budget");
                let start_date = parser.date("start_date");
                let end_date = parser.date("end_date");

                if let (Some(start), Some(end)) = (start_date, end_date) {
                    if end < start {
                        parser
                            .errors
                            .add("end_date", "End date must not be before start date");
                    }
                }

                let (Some(name), Some(company), Some(budget), Some(start_date), Some(end_date)) =
                    (name, company, budget, start_date, end_date)
                else {
                    return Err(parser.errors);
                };
                EntityInput::Project(NewProject {
                    name,
                    company,
                    budget,
                    start_date,
                    end_date,
                })
            }
            EntityKind::Activity => {
                let date = parser.date("date");
                let description = parser.text("description");
                let kind = parser.text("kind");
                let minutes = parser.integer("minutes");
                let employee_id = parser.reference("employee_id");
                let project_id = parser.reference("project_id");

                let (
                    Some(date),
                    Some(description),
                    Some(kind),
                    Some(minutes),
                    Some(employee_id),
                    Some(project_id),
                ) = (date, description, kind, minutes, employee_id, project_id)
                else {
                    return Err(parser.errors);
                };
                EntityInput::Activity(NewActivity {
                    description,
                    kind,
                    minutes,
                    employee_id,
                    project_id,
                    date,
                })
            }
        };

        parser.finish().map(|()| input)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
        };
        f.write_str(name)
    }
}

impl Rule {
    pub fn describe(self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Email => "valid email address",
            Rule::NonNegativeNumber => "number >= 0",
            Rule::PositiveInteger => "whole number > 0",
            Rule::Date => "date (YYYY-MM-DD)",
            Rule::Reference => "id of an existing record",
        }
    }
}

struct FormParser<'a> {
    kind: EntityKind,
    form: &'a FormValues,
    errors: ValidationErrors,
}

impl<'a> FormParser<'a> {
    fn new(kind: EntityKind, form: &'a FormValues) -> Self {
        let mut errors = ValidationErrors::new();
        for name in form.keys() {
            if name != "id" && !kind.fields().iter().any(|spec| spec.name == name) {
                errors.add(name.clone(), format!("unknown {kind} field"));
            }
        }
        Self { kind, form, errors }
    }

    fn spec(&self, name: &'static str) -> FieldSpec {
        self.kind
            .fields()
            .iter()
            .copied()
            .find(|spec| spec.name == name)
            .unwrap_or(field(name, name, FieldType::Text, Rule::Required))
    }

    /// Trimmed raw value; records a "required" error when blank.
    fn present(&mut self, spec: FieldSpec) -> Option<&'a str> {
        let value = self.form.get(spec.name).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            self.errors.add(spec.name, format!("{} is required", spec.label));
            None
        } else {
            Some(value)
        }
    }

    fn text(&mut self, name: &'static str) -> Option<String> {
        let spec = self.spec(name);
        let value = self.present(spec)?;
        if spec.rule == Rule::Email && !EMAIL_RE.is_match(value) {
            self.errors.add(spec.name, "Invalid email address");
            return None;
        }
        Some(value.to_string())
    }

    fn number(&mut self, name: &'static str) -> Option<f64> {
        let spec = self.spec(name);
        let value = self.present(spec)?;
        match value.parse::<f64>() {
            Ok(number) if !number.is_finite() => {
                self.errors.add(spec.name, format!("{} must be a number", spec.label));
                None
            }
            Ok(number) if spec.rule == Rule::NonNegativeNumber && number < 0.0 => {
                self.errors
                    .add(spec.name, format!("{} must not be negative", spec.label));
                None
            }
            Ok(number) => Some(number),
            Err(_) => {
                self.errors.add(spec.name, format!("{} must be a number", spec.label));
                None
            }
        }
    }

    fn integer(&mut self, name: &'static str) -> Option<i32> {
        let spec = self.spec(name);
        let value = self.present(spec)?;
        match value.parse::<i32>() {
            Ok(number) if number > 0 => Some(number),
            Ok(_) => {
                self.errors.add(spec.name, format!("{} must be positive", spec.label));
                None
            }
            Err(_) => {
                self.errors
                    .add(spec.name, format!("{} must be a whole number", spec.label));
                None
            }
        }
    }

    fn reference(&mut self, name: &'static str) -> Option<i64> {
        let spec = self.spec(name);
        let value = self.present(spec)?;
        match value.parse::<i64>() {
            Ok(id) if id > 0 => Some(id),
            _ => {
                self.errors
                    .add(spec.name, format!("{} must be a valid id", spec.label));
                None
            }
        }
    }

    fn date(&mut self, name: &'static str) -> Option<NaiveDate> {
        let spec = self.spec(name);
        let value = self.present(spec)?;
        match NaiveDate::parse_from_str(value, DATE_FORMAT) {
            Ok(date) if YEARS.contains(&date.year()) => Some(date),
            _ => {
                self.errors.add(
                    spec.name,
                    format!("{} must be a date in YYYY-MM-DD format", spec.label),
                );
                None
            }
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Flattens a JSON object body into form values. Numbers are kept in their
/// textual form so the field rules apply to them like to typed input; nulls
/// count as missing.
pub fn form_from_json(body: &Value) -> Result<FormValues, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let Some(object) = body.as_object() else {
        errors.add("body", "expected a JSON object");
        return Err(errors);
    };

    let mut form = FormValues::new();
    for (key, value) in object {
        match value {
            Value::String(text) => {
                form.insert(key.clone(), text.clone());
            }
            Value::Number(number) => {
                form.insert(key.clone(), number.to_string());
            }
            Value::Null => {}
            _ => errors.add(key.clone(), "expected a string or a number"),
        }
    }

    if errors.is_empty() {
        Ok(form)
    } else {
        Err(errors)
    }
}

impl Entity {
    /// Current field values, in the shape `parse_form` accepts. Used to
    /// overlay a partial edit onto the stored record.
    pub fn to_form(&self) -> FormValues {
        let pairs: Vec<(&str, String)> = match self {
            Entity::Employee(e) => vec![
                ("name", e.name.clone()),
                ("email", e.email.clone()),
                ("team", e.team.clone()),
                ("hourly_rate", e.hourly_rate.to_string()),
            ],
            Entity::Project(p) => vec![
                ("name", p.name.clone()),
                ("company", p.company.clone()),
                ("budget", p.budget.to_string()),
                ("start_date", p.start_date.format(DATE_FORMAT).to_string()),
                ("end_date", p.end_date.format(DATE_FORMAT).to_string()),
            ],
            Entity::Activity(a) => vec![
                ("date", a.date.format(DATE_FORMAT).to_string()),
                ("description", a.description.clone()),
                ("kind", a.kind.clone()),
                ("minutes", a.minutes.to_string()),
                ("employee_id", a.employee_id.to_string()),
                ("project_id", a.project_id.to_string()),
            ],
        };
        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}
