use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_documents_data
             ON documents USING GIN (data jsonb_path_ops)",
        )
        .await?;

        // List views sort on createdAt within one collection.
        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection_created
             ON documents (collection, (data -> 'createdAt') DESC, id DESC)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_documents_status
             ON documents (collection, (data -> 'status'))",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP INDEX IF EXISTS idx_documents_status")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS idx_documents_collection_created")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS idx_documents_data")
            .await?;

        Ok(())
    }
}
