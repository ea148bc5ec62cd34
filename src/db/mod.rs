use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::generations::Model as Generation;
pub use repositories::generation::{NewGeneration, now_timestamp};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let path_str = db_url.trim_start_matches("sqlite:");
        if !path_str.starts_with(":memory:") {
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn generation_repo(&self) -> repositories::generation::GenerationRepository {
        repositories::generation::GenerationRepository::new(self.conn.clone())
    }

    pub async fn list_generations(&self) -> Result<Vec<Generation>> {
        self.generation_repo().list().await
    }

    pub async fn get_generation(&self, id: &str) -> Result<Option<Generation>> {
        self.generation_repo().get(id).await
    }

    pub async fn find_generation_by_prediction(
        &self,
        prediction_id: &str,
    ) -> Result<Option<Generation>> {
        self.generation_repo()
            .find_by_prediction_id(prediction_id)
            .await
    }

    pub async fn add_generation(&self, generation: NewGeneration) -> Result<Generation> {
        self.generation_repo().add(generation).await
    }

    pub async fn delete_generation(&self, id: &str) -> Result<bool> {
        self.generation_repo().delete(id).await
    }

    pub async fn clear_generations(&self) -> Result<u64> {
        self.generation_repo().clear().await
    }

    pub async fn import_generations(&self, generations: Vec<NewGeneration>) -> Result<usize> {
        self.generation_repo().import(generations).await
    }
}
