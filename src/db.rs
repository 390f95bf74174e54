use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::entity::{EntityInput, EntityKind};
use crate::error::StoreError;
use crate::models::{Activity, Employee, Entity, Project};
use crate::store::RecordStore;

const ACTIVITY_SELECT: &str = r#"
    SELECT a.id, a.description, a.kind, a.minutes, a.employee_id, a.project_id, a.date,
           e.name AS employee_name, p.name AS project_name
    FROM workforce_dashboard.activities a
    LEFT JOIN workforce_dashboard.employees e ON e.id = a.employee_id
    LEFT JOIN workforce_dashboard.projects p ON p.id = a.project_id
"#;

/// Joins the row produced by a `written` CTE with the names it references,
/// so an activity write and its read-back are one statement.
const WRITTEN_ACTIVITY: &str = r#"
    SELECT w.id, w.description, w.kind, w.minutes, w.employee_id, w.project_id, w.date,
           e.name AS employee_name, p.name AS project_name
    FROM written w
    LEFT JOIN workforce_dashboard.employees e ON e.id = w.employee_id
    LEFT JOIN workforce_dashboard.projects p ON p.id = w.project_id
"#;

const ACTIVITY_INSERT: &str = r#"
    INSERT INTO workforce_dashboard.activities
    (description, kind, minutes, employee_id, project_id, date)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

const ACTIVITY_UPDATE: &str = r#"
    UPDATE workforce_dashboard.activities
    SET description = $1, kind = $2, minutes = $3,
        employee_id = $4, project_id = $5, date = $6
    WHERE id = $7
"#;

fn activity_write_query(write: &str) -> String {
    format!("WITH written AS ({write} RETURNING *) {WRITTEN_ACTIVITY}")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a foreign-key violation on an activity write to the reference that
/// is missing.
fn write_error(err: sqlx::Error, input: &EntityInput) -> StoreError {
    let EntityInput::Activity(activity) = input else {
        return StoreError::Database(err);
    };
    let Some(db_err) = err.as_database_error() else {
        return StoreError::Database(err);
    };
    if !db_err.is_foreign_key_violation() {
        return StoreError::Database(err);
    }

    if db_err
        .constraint()
        .is_some_and(|name| name.contains("employee"))
    {
        StoreError::MissingReference {
            kind: EntityKind::Employee,
            id: activity.employee_id,
        }
    } else {
        StoreError::MissingReference {
            kind: EntityKind::Project,
            id: activity.project_id,
        }
    }
}

async fn delete_dependents(
    tx: &mut Transaction<'_, Postgres>,
    kind: EntityKind,
    id: i64,
) -> Result<u64, sqlx::Error> {
    let query = match kind {
        EntityKind::Employee => "DELETE FROM workforce_dashboard.activities WHERE employee_id = $1",
        EntityKind::Project => "DELETE FROM workforce_dashboard.activities WHERE project_id = $1",
        EntityKind::Activity => return Ok(0),
    };
    let result = sqlx::query(query).bind(id).execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list_employees(&self) -> Result<Vec<Employee>, StoreError> {
        let employees = sqlx::query_as::<_, Employee>(
            "SELECT id, name, email, team, hourly_rate FROM workforce_dashboard.employees ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT id, name, company, budget, start_date, end_date \
             FROM workforce_dashboard.projects ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, StoreError> {
        let query = format!("{ACTIVITY_SELECT} ORDER BY a.id");
        let activities = sqlx::query_as::<_, Activity>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(activities)
    }

    async fn create(&self, input: &EntityInput) -> Result<Entity, StoreError> {
        let entity = match input {
            EntityInput::Employee(new) => {
                let employee = sqlx::query_as::<_, Employee>(
                    r#"
                    INSERT INTO workforce_dashboard.employees (name, email, team, hourly_rate)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, name, email, team, hourly_rate
                    "#,
                )
                .bind(&new.name)
                .bind(&new.email)
                .bind(&new.team)
                .bind(new.hourly_rate)
                .fetch_one(&self.pool)
                .await?;
                Entity::Employee(employee)
            }
            EntityInput::Project(new) => {
                let project = sqlx::query_as::<_, Project>(
                    r#"
                    INSERT INTO workforce_dashboard.projects
                    (name, company, budget, start_date, end_date)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, name, company, budget, start_date, end_date
                    "#,
                )
                .bind(&new.name)
                .bind(&new.company)
                .bind(new.budget)
                .bind(new.start_date)
                .bind(new.end_date)
                .fetch_one(&self.pool)
                .await?;
                Entity::Project(project)
            }
            EntityInput::Activity(new) => {
                let query = activity_write_query(ACTIVITY_INSERT);
                let activity = sqlx::query_as::<_, Activity>(&query)
                    .bind(&new.description)
                    .bind(&new.kind)
                    .bind(new.minutes)
                    .bind(new.employee_id)
                    .bind(new.project_id)
                    .bind(new.date)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|err| write_error(err, input))?;
                Entity::Activity(activity)
            }
        };

        debug!(kind = %entity.kind(), id = entity.id(), "record created");
        Ok(entity)
    }

    async fn update(&self, id: i64, input: &EntityInput) -> Result<Entity, StoreError> {
        let not_found = StoreError::NotFound {
            kind: input.kind(),
            id,
        };

        let entity = match input {
            EntityInput::Employee(new) => sqlx::query_as::<_, Employee>(
                r#"
                UPDATE workforce_dashboard.employees
                SET name = $1, email = $2, team = $3, hourly_rate = $4
                WHERE id = $5
                RETURNING id, name, email, team, hourly_rate
                "#,
            )
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.team)
            .bind(new.hourly_rate)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Entity::Employee),
            EntityInput::Project(new) => sqlx::query_as::<_, Project>(
                r#"
                UPDATE workforce_dashboard.projects
                SET name = $1, company = $2, budget = $3, start_date = $4, end_date = $5
                WHERE id = $6
                RETURNING id, name, company, budget, start_date, end_date
                "#,
            )
            .bind(&new.name)
            .bind(&new.company)
            .bind(new.budget)
            .bind(new.start_date)
            .bind(new.end_date)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Entity::Project),
            EntityInput::Activity(new) => {
                let query = activity_write_query(ACTIVITY_UPDATE);
                sqlx::query_as::<_, Activity>(&query)
                    .bind(&new.description)
                    .bind(&new.kind)
                    .bind(new.minutes)
                    .bind(new.employee_id)
                    .bind(new.project_id)
                    .bind(new.date)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|err| write_error(err, input))?
                    .map(Entity::Activity)
            }
        };

        let entity = entity.ok_or(not_found)?;
        debug!(kind = %entity.kind(), id, "record updated");
        Ok(entity)
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let cascaded = delete_dependents(&mut tx, kind, id).await?;

        let query = match kind {
            EntityKind::Employee => "DELETE FROM workforce_dashboard.employees WHERE id = $1",
            EntityKind::Project => "DELETE FROM workforce_dashboard.projects WHERE id = $1",
            EntityKind::Activity => "DELETE FROM workforce_dashboard.activities WHERE id = $1",
        };
        let result = sqlx::query(query).bind(id).execute(&mut *tx).await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound { kind, id });
        }

        tx.commit().await?;
        info!(%kind, id, cascaded, "record deleted");
        Ok(cascaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_writes_read_back_names_in_the_same_statement() {
        for write in [ACTIVITY_INSERT, ACTIVITY_UPDATE] {
            let query = activity_write_query(write);
            assert!(query.trim_start().starts_with("WITH written AS ("));
            assert!(query.contains("RETURNING *)"));
            assert!(query.contains("FROM written w"));
            assert!(query.contains("e.name AS employee_name"));
            assert!(query.contains("p.name AS project_name"));
            assert!(!query.contains(';'));
        }
        assert!(activity_write_query(ACTIVITY_UPDATE).contains("WHERE id = $7"));
    }
}
