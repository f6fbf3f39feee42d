//! Durable pause/drain intent, surviving process restarts.

use crate::domain::model::{ActivityRecord, Key};
use async_trait::async_trait;

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn load(&self, key: &Key) -> Result<Option<ActivityRecord>, crate::domain::DatabaseError>;

    async fn load_all(&self) -> Result<Vec<ActivityRecord>, crate::domain::DatabaseError>;

    async fn save(&self, record: &ActivityRecord) -> Result<(), crate::domain::DatabaseError>;

    async fn delete(&self, key: &Key) -> Result<(), crate::domain::DatabaseError>;
}
