//! WhatsApp id mapping repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::WhatsAppMappingDbModel;
use crate::{Error, Result};

#[async_trait]
pub trait WhatsAppMappingRepository: Send + Sync {
    async fn put_mapping(&self, mapping: &WhatsAppMappingDbModel) -> Result<()>;

    /// Internal message id for a provider message id.
    async fn get_message_id(&self, provider_message_id: &str) -> Result<String>;
}

pub struct SqlxWhatsAppMappingRepository {
    pool: SqlitePool,
}

impl SqlxWhatsAppMappingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WhatsAppMappingRepository for SqlxWhatsAppMappingRepository {
    async fn put_mapping(&self, mapping: &WhatsAppMappingDbModel) -> Result<()> {
        // A repeated "accepted" event replaces the row.
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO whatsapp_message_mapping (provider_message_id, message_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&mapping.provider_message_id)
        .bind(&mapping.message_id)
        .bind(mapping.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_message_id(&self, provider_message_id: &str) -> Result<String> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT message_id FROM whatsapp_message_mapping WHERE provider_message_id = ?",
        )
        .bind(provider_message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id,)| id)
            .ok_or_else(|| Error::not_found("WhatsAppMapping", provider_message_id))
    }
}
