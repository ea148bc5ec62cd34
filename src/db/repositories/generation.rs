use crate::entities::{generations, prelude::*};
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

/// Fields of a generation record before it is stored. Missing `id` and
/// `created_at` are filled in on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGeneration {
    pub id: Option<String>,
    pub prediction_id: Option<String>,
    pub image_url: String,
    pub video_url: String,
    pub prompt: String,
    pub model: Option<String>,
    pub duration: Option<i32>,
    pub resolution: Option<String>,
    pub created_at: Option<String>,
}

impl NewGeneration {
    fn into_active_model(self) -> generations::ActiveModel {
        generations::ActiveModel {
            id: Set(self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())),
            prediction_id: Set(self.prediction_id),
            image_url: Set(self.image_url),
            video_url: Set(self.video_url),
            prompt: Set(self.prompt),
            model: Set(self.model),
            duration: Set(self.duration),
            resolution: Set(self.resolution),
            created_at: Set(self.created_at.unwrap_or_else(now_timestamp)),
        }
    }
}

#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct GenerationRepository {
    conn: DatabaseConnection,
}

impl GenerationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<generations::Model>> {
        let rows = Generations::find()
            .order_by_desc(generations::Column::CreatedAt)
            .order_by_desc(generations::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: &str) -> Result<Option<generations::Model>> {
        Ok(Generations::find_by_id(id.to_string()).one(&self.conn).await?)
    }

    pub async fn find_by_prediction_id(
        &self,
        prediction_id: &str,
    ) -> Result<Option<generations::Model>> {
        let row = Generations::find()
            .filter(generations::Column::PredictionId.eq(prediction_id))
            .one(&self.conn)
            .await?;
        Ok(row)
    }

    pub async fn add(&self, generation: NewGeneration) -> Result<generations::Model> {
        let model = Generations::insert(generation.into_active_model())
            .exec_with_returning(&self.conn)
            .await?;
        Ok(model)
    }

    /// Returns `false` when no record had this id.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = Generations::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn clear(&self) -> Result<u64> {
        let result = Generations::delete_many().exec(&self.conn).await?;
        Ok(result.rows_affected)
    }

    /// Inserts records whose id is not already stored. Returns how many were added.
    pub async fn import(&self, generations: Vec<NewGeneration>) -> Result<usize> {
        let ids: Vec<String> = generations.iter().filter_map(|g| g.id.clone()).collect();

        let existing: std::collections::HashSet<String> = if ids.is_empty() {
            std::collections::HashSet::new()
        } else {
            Generations::find()
                .filter(generations::Column::Id.is_in(ids))
                .all(&self.conn)
                .await?
                .into_iter()
                .map(|m| m.id)
                .collect()
        };

        let mut seen = std::collections::HashSet::new();
        let fresh: Vec<generations::ActiveModel> = generations
            .into_iter()
            .filter(|g| {
                g.id.as_ref()
                    .is_none_or(|id| !existing.contains(id) && seen.insert(id.clone()))
            })
            .map(NewGeneration::into_active_model)
            .collect();

        let count = fresh.len();
        if count > 0 {
            Generations::insert_many(fresh).exec(&self.conn).await?;
        }

        Ok(count)
    }
}
