use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::entity::{EntityInput, EntityKind};
use crate::error::StoreError;
use crate::models::{Activity, Employee, Entity, NewActivity, Project};

/// Record store holding employees, projects and activities.
///
/// Deleting an employee or project also deletes every activity that
/// references it; implementations perform both deletions atomically and
/// report how many activities went with the parent.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_employees(&self) -> Result<Vec<Employee>, StoreError>;

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Activities with the names of the employee and project they reference.
    async fn list_activities(&self) -> Result<Vec<Activity>, StoreError>;

    async fn create(&self, input: &EntityInput) -> Result<Entity, StoreError>;

    /// Replaces every field of record `id` of the input's kind.
    async fn update(&self, id: i64, input: &EntityInput) -> Result<Entity, StoreError>;

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<u64, StoreError>;
}

/// In-process store with the same semantics as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    employees: Vec<Employee>,
    projects: Vec<Project>,
    activities: Vec<Activity>,
    last_employee_id: i64,
    last_project_id: i64,
    last_activity_id: i64,
}

impl Tables {
    fn check_references(&self, activity: &NewActivity) -> Result<(), StoreError> {
        if !self.employees.iter().any(|e| e.id == activity.employee_id) {
            return Err(StoreError::MissingReference {
                kind: EntityKind::Employee,
                id: activity.employee_id,
            });
        }
        if !self.projects.iter().any(|p| p.id == activity.project_id) {
            return Err(StoreError::MissingReference {
                kind: EntityKind::Project,
                id: activity.project_id,
            });
        }
        Ok(())
    }

    fn with_names(&self, activity: &Activity) -> Activity {
        let mut activity = activity.clone();
        activity.employee_name = self
            .employees
            .iter()
            .find(|e| e.id == activity.employee_id)
            .map(|e| e.name.clone());
        activity.project_name = self
            .projects
            .iter()
            .find(|p| p.id == activity.project_id)
            .map(|p| p.name.clone());
        activity
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_employees(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(self.tables.lock().await.employees.clone())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.tables.lock().await.projects.clone())
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .activities
            .iter()
            .map(|activity| tables.with_names(activity))
            .collect())
    }

    async fn create(&self, input: &EntityInput) -> Result<Entity, StoreError> {
        let mut tables = self.tables.lock().await;
        let entity = match input {
            EntityInput::Employee(new) => {
                tables.last_employee_id += 1;
                let employee = Employee {
                    id: tables.last_employee_id,
                    name: new.name.clone(),
                    email: new.email.clone(),
                    team: new.team.clone(),
                    hourly_rate: new.hourly_rate,
                };
                tables.employees.push(employee.clone());
                Entity::Employee(employee)
            }
            EntityInput::Project(new) => {
                tables.last_project_id += 1;
                let project = Project {
                    id: tables.last_project_id,
                    name: new.name.clone(),
                    company: new.company.clone(),
                    budget: new.budget,
                    start_date: new.start_date,
                    end_date: new.end_date,
                };
                tables.projects.push(project.clone());
                Entity::Project(project)
            }
            EntityInput::Activity(new) => {
                tables.check_references(new)?;
                tables.last_activity_id += 1;
                let activity = Activity {
                    id: tables.last_activity_id,
                    description: new.description.clone(),
                    kind: new.kind.clone(),
                    minutes: new.minutes,
                    employee_id: new.employee_id,
                    project_id: new.project_id,
                    date: new.date,
                    employee_name: None,
                    project_name: None,
                };
                tables.activities.push(activity.clone());
                Entity::Activity(tables.with_names(&activity))
            }
        };
        Ok(entity)
    }

    async fn update(&self, id: i64, input: &EntityInput) -> Result<Entity, StoreError> {
        let mut tables = self.tables.lock().await;
        let not_found = StoreError::NotFound {
            kind: input.kind(),
            id,
        };

        match input {
            EntityInput::Employee(new) => {
                let employee = tables
                    .employees
                    .iter_mut()
                    .find(|e| e.id == id)
                    .ok_or(not_found)?;
                employee.name = new.name.clone();
                employee.email = new.email.clone();
                employee.team = new.team.clone();
                employee.hourly_rate = new.hourly_rate;
                Ok(Entity::Employee(employee.clone()))
            }
            EntityInput::Project(new) => {
                let project = tables
                    .projects
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or(not_found)?;
                project.name = new.name.clone();
                project.company = new.company.clone();
                project.budget = new.budget;
                project.start_date = new.start_date;
                project.end_date = new.end_date;
                Ok(Entity::Project(project.clone()))
            }
            EntityInput::Activity(new) => {
                if !tables.activities.iter().any(|a| a.id == id) {
                    return Err(not_found);
                }
                tables.check_references(new)?;
                let activity = tables
                    .activities
                    .iter_mut()
                    .find(|a| a.id == id)
                    .ok_or(StoreError::NotFound {
                        kind: EntityKind::Activity,
                        id,
                    })?;
                activity.description = new.description.clone();
                activity.kind = new.kind.clone();
                activity.minutes = new.minutes;
                activity.employee_id = new.employee_id;
                activity.project_id = new.project_id;
                activity.date = new.date;
                let updated = activity.clone();
                Ok(Entity::Activity(tables.with_names(&updated)))
            }
        }
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let exists = match kind {
            EntityKind::Employee => tables.employees.iter().any(|e| e.id == id),
            EntityKind::Project => tables.projects.iter().any(|p| p.id == id),
            EntityKind::Activity => tables.activities.iter().any(|a| a.id == id),
        };
        if !exists {
            return Err(StoreError::NotFound { kind, id });
        }

        let before = tables.activities.len();
        match kind {
            EntityKind::Employee => {
                tables.activities.retain(|a| a.employee_id != id);
                tables.employees.retain(|e| e.id != id);
            }
            EntityKind::Project => {
                tables.activities.retain(|a| a.project_id != id);
                tables.projects.retain(|p| p.id != id);
            }
            EntityKind::Activity => {
                tables.activities.retain(|a| a.id != id);
                return Ok(0);
            }
        }
        Ok((before - tables.activities.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEmployee, NewProject};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_employee(name: &str) -> EntityInput {
        EntityInput::Employee(NewEmployee {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            team: "Platform".to_string(),
            hourly_rate: 30.0,
        })
    }

    fn new_project(name: &str) -> EntityInput {
        EntityInput::Project(NewProject {
            name: name.to_string(),
            company: "Acme".to_string(),
            budget: 5000.0,
            start_date: date(2026, 1, 1),
            end_date: date(2026, 6, 30),
        })
    }

    fn new_activity(employee_id: i64, project_id: i64, minutes: i32) -> EntityInput {
        EntityInput::Activity(NewActivity {
            description: "Sprint work".to_string(),
            kind: "development".to_string(),
            minutes,
            employee_id,
            project_id,
            date: date(2026, 2, 3),
        })
    }

    #[tokio::test]
    async fn deleting_project_cascades_to_its_activities() {
        let store = MemoryStore::new();
        let avery = store.create(&new_employee("Avery")).await.unwrap().id();
        let atlas = store.create(&new_project("Atlas")).await.unwrap().id();
        let borealis = store.create(&new_project("Borealis")).await.unwrap().id();
        for minutes in [30, 60, 90] {
            store.create(&new_activity(avery, atlas, minutes)).await.unwrap();
        }
        store.create(&new_activity(avery, borealis, 15)).await.unwrap();

        let cascaded = store.delete(EntityKind::Project, atlas).await.unwrap();
        assert_eq!(cascaded, 3);

        let activities = store.list_activities().await.unwrap();
        assert_eq!(activities.len(), 1);
        assert!(activities.iter().all(|a| a.project_id != atlas));
        let projects = store.list_projects().await.unwrap();
        assert!(projects.iter().all(|p| p.id != atlas));
    }

    #[tokio::test]
    async fn deleting_employee_cascades_to_their_activities() {
        let store = MemoryStore::new();
        let avery = store.create(&new_employee("Avery")).await.unwrap().id();
        let jules = store.create(&new_employee("Jules")).await.unwrap().id();
        let atlas = store.create(&new_project("Atlas")).await.unwrap().id();
        store.create(&new_activity(avery, atlas, 30)).await.unwrap();
        store.create(&new_activity(jules, atlas, 30)).await.unwrap();

        assert_eq!(store.delete(EntityKind::Employee, avery).await.unwrap(), 1);
        let remaining = store.list_activities().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].employee_id, jules);
    }

    #[tokio::test]
    async fn deleting_missing_record_changes_nothing() {
        let store = MemoryStore::new();
        let avery = store.create(&new_employee("Avery")).await.unwrap().id();
        let atlas = store.create(&new_project("Atlas")).await.unwrap().id();
        store.create(&new_activity(avery, atlas, 30)).await.unwrap();

        let err = store.delete(EntityKind::Project, 42).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                kind: EntityKind::Project,
                id: 42
            }
        ));
        assert_eq!(store.list_activities().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn activities_carry_reference_names() {
        let store = MemoryStore::new();
        let avery = store.create(&new_employee("Avery")).await.unwrap().id();
        let atlas = store.create(&new_project("Atlas")).await.unwrap().id();
        let created = store.create(&new_activity(avery, atlas, 45)).await.unwrap();

        match created {
            Entity::Activity(activity) => {
                assert_eq!(activity.employee_name.as_deref(), Some("Avery"));
                assert_eq!(activity.project_name.as_deref(), Some("Atlas"));
            }
            other => panic!("unexpected entity {other:?}"),
        }

        store
            .update(avery, &new_employee("Avery Lee"))
            .await
            .unwrap();
        let listed = store.list_activities().await.unwrap();
        assert_eq!(listed[0].employee_name.as_deref(), Some("Avery Lee"));
    }

    #[tokio::test]
    async fn activity_must_reference_existing_records() {
        let store = MemoryStore::new();
        let avery = store.create(&new_employee("Avery")).await.unwrap().id();

        let err = store.create(&new_activity(avery, 9, 30)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingReference {
                kind: EntityKind::Project,
                id: 9
            }
        ));
        assert!(store.list_activities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update(5, &new_project("Atlas")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                kind: EntityKind::Project,
                id: 5
            }
        ));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        let first = store.create(&new_employee("Avery")).await.unwrap().id();
        store.delete(EntityKind::Employee, first).await.unwrap();
        let second = store.create(&new_employee("Jules")).await.unwrap().id();
        assert!(second > first);
    }
}
