use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::entity::{EntityInput, EntityKind};
use crate::error::StoreError;
use crate::models::{Activity, Employee, Entity, Project};
use crate::store::RecordStore;

/// The three record lists as fetched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub employees: Vec<Employee>,
    pub projects: Vec<Project>,
    pub activities: Vec<Activity>,
}

impl Snapshot {
    pub fn entities(&self, kind: EntityKind) -> Vec<Entity> {
        match kind {
            EntityKind::Employee => self.employees.iter().cloned().map(Entity::Employee).collect(),
            EntityKind::Project => self.projects.iter().cloned().map(Entity::Project).collect(),
            EntityKind::Activity => self.activities.iter().cloned().map(Entity::Activity).collect(),
        }
    }

    pub fn find(&self, kind: EntityKind, id: i64) -> Option<Entity> {
        match kind {
            EntityKind::Employee => self
                .employees
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .map(Entity::Employee),
            EntityKind::Project => self
                .projects
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .map(Entity::Project),
            EntityKind::Activity => self
                .activities
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .map(Entity::Activity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty() && self.projects.is_empty() && self.activities.is_empty()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    snapshot: Option<Arc<Snapshot>>,
}

/// Caches the latest snapshot of a record store. Every mutation made
/// through the cache drops the snapshot, so the next read refetches.
pub struct SnapshotCache {
    store: Arc<dyn RecordStore>,
    state: RwLock<CacheState>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, StoreError> {
        let generation = {
            let state = self.state.read().await;
            if let Some(snapshot) = &state.snapshot {
                return Ok(Arc::clone(snapshot));
            }
            state.generation
        };

        let snapshot = Arc::new(self.fetch().await?);

        let mut state = self.state.write().await;
        if state.generation == generation {
            state.snapshot = Some(Arc::clone(&snapshot));
        } else {
            // A mutation landed while fetching; this result may predate it.
            debug!(generation, current = state.generation, "discarding stale snapshot");
        }
        Ok(snapshot)
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.snapshot = None;
    }

    pub async fn create(&self, input: &EntityInput) -> Result<Entity, StoreError> {
        let result = self.store.create(input).await;
        self.invalidate().await;
        result
    }

    pub async fn update(&self, id: i64, input: &EntityInput) -> Result<Entity, StoreError> {
        let result = self.store.update(id, input).await;
        self.invalidate().await;
        result
    }

    pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<u64, StoreError> {
        let result = self.store.delete(kind, id).await;
        self.invalidate().await;
        result
    }

    async fn fetch(&self) -> Result<Snapshot, StoreError> {
        let (employees, projects, activities) = tokio::try_join!(
            self.store.list_employees(),
            self.store.list_projects(),
            self.store.list_activities(),
        )?;
        debug!(
            employees = employees.len(),
            projects = projects.len(),
            activities = activities.len(),
            "fetched snapshot"
        );
        Ok(Snapshot {
            employees,
            projects,
            activities,
        })
    }
}
