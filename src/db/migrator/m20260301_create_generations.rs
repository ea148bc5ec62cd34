use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Generations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Generations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Generations::PredictionId).string().unique_key())
                    .col(ColumnDef::new(Generations::ImageUrl).text().not_null())
                    .col(ColumnDef::new(Generations::VideoUrl).text().not_null())
                    .col(ColumnDef::new(Generations::Prompt).text().not_null())
                    .col(ColumnDef::new(Generations::Model).string())
                    .col(ColumnDef::new(Generations::Duration).integer())
                    .col(ColumnDef::new(Generations::Resolution).string())
                    .col(ColumnDef::new(Generations::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_generations_created_at")
                    .table(Generations::Table)
                    .col(Generations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Generations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Generations {
    Table,
    Id,
    PredictionId,
    ImageUrl,
    VideoUrl,
    Prompt,
    Model,
    Duration,
    Resolution,
    CreatedAt,
}
