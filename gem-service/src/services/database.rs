use crate::models::{Gem, GemChanges, GemId};
use crate::services::store::{GemStore, UpdateOutcome};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    Client as MongoClient, Collection, Database,
};
use service_core::error::AppError;

pub const GEMS_COLLECTION: &str = "hidden_gems";

#[derive(Clone)]
pub struct GemDb {
    client: MongoClient,
    db: Database,
}

impl GemDb {
    /// Connect and ping once, so an unreachable server fails here rather than
    /// on the first request.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        let gem_db = Self { client, db };
        gem_db.ping().await?;
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(gem_db)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB ping failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn gems(&self) -> Collection<Document> {
        self.db.collection(GEMS_COLLECTION)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl GemStore for GemDb {
    async fn list(&self) -> Result<Vec<Gem>, AppError> {
        let cursor = self.gems().find(doc! {}, None).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Gem::from).collect())
    }

    async fn find(&self, id: GemId) -> Result<Option<Gem>, AppError> {
        let document = self
            .gems()
            .find_one(doc! { "_id": id.object_id() }, None)
            .await?;
        Ok(document.map(Gem::from))
    }

    async fn insert(&self, gem: &Gem) -> Result<GemId, AppError> {
        let result = self.gems().insert_one(gem.document(), None).await?;
        result
            .inserted_id
            .as_object_id()
            .map(GemId::from)
            .ok_or_else(|| {
                AppError::DatabaseError(
                    "Database error".to_string(),
                    anyhow::anyhow!("insert returned non-ObjectId id {}", result.inserted_id),
                )
            })
    }

    async fn update(&self, id: GemId, changes: GemChanges) -> Result<UpdateOutcome, AppError> {
        let filter = doc! { "_id": id.object_id() };

        // `$set` with an empty document is rejected by the server.
        if changes.is_empty() {
            let matched = self.gems().count_documents(filter, None).await?;
            return Ok(UpdateOutcome::from_counts(matched, 0));
        }

        let update = doc! { "$set": changes.into_document() };
        let result = self.gems().update_one(filter, update, None).await?;
        Ok(UpdateOutcome::from_counts(
            result.matched_count,
            result.modified_count,
        ))
    }

    async fn delete(&self, id: GemId) -> Result<bool, AppError> {
        let result = self
            .gems()
            .delete_one(doc! { "_id": id.object_id() }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.ping().await
    }
}
