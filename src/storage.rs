// ABOUTME: Database storage layer for user accounts and owner-scoped encrypted secret records
// ABOUTME: Every secret query is filtered by the verified owner; missing rows become StorageError::NotFound

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use sea_orm_migration::MigratorTrait;
use thiserror::Error;

use crate::entities::{secret, user, SecretKind};
use crate::migration::Migrator;
use crate::types::{Owner, SecretSummary};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no matching record")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Encrypted row contents as handed back to the orchestrator.
#[derive(Debug, Clone)]
pub struct StoredSecret {
    pub id: i32,
    pub label: String,
    pub note: String,
    pub ciphertext: Vec<u8>,
}

impl From<secret::Model> for StoredSecret {
    fn from(model: secret::Model) -> Self {
        Self {
            id: model.id,
            label: model.label,
            note: model.note,
            ciphertext: model.ciphertext,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSecret {
    pub kind: SecretKind,
    pub label: String,
    pub note: String,
    pub ciphertext: Vec<u8>,
}

pub struct Storage {
    pub db: DatabaseConnection,
}

impl Storage {
    /// Connects and brings the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let db = Database::connect(database_url).await?;
        Migrator::up(&db, None).await?;

        tracing::info!("Database ready");
        Ok(Self { db })
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        self.db.ping().await?;
        Ok(())
    }

    pub async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<user::Model, StorageError> {
        let user = user::ActiveModel {
            login: Set(login.to_string()),
            password_hash: Set(password_hash.to_string()),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };

        user.insert(&self.db).await.map_err(classify)
    }

    pub async fn find_user_by_login(&self, login: &str) -> Result<user::Model, StorageError> {
        user::Entity::find()
            .filter(user::Column::Login.eq(login))
            .one(&self.db)
            .await?
            .ok_or(StorageError::NotFound)
    }

    pub async fn find_user_by_id(&self, user_id: i32) -> Result<user::Model, StorageError> {
        user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(StorageError::NotFound)
    }

    pub async fn list_secret_summaries(
        &self,
        owner: &Owner,
    ) -> Result<Vec<SecretSummary>, StorageError> {
        let summaries = secret::Entity::find()
            .select_only()
            .column(secret::Column::Id)
            .column(secret::Column::Kind)
            .column(secret::Column::Label)
            .column(secret::Column::Note)
            .filter(secret::Column::OwnerId.eq(owner.id()))
            .order_by_asc(secret::Column::Id)
            .into_model::<SecretSummary>()
            .all(&self.db)
            .await?;

        Ok(summaries)
    }

    /// Returns the id assigned by the database.
    pub async fn create_secret(
        &self,
        owner: &Owner,
        new_secret: NewSecret,
    ) -> Result<i32, StorageError> {
        let file_label = match new_secret.kind {
            SecretKind::File if !new_secret.label.is_empty() => Some(new_secret.label.clone()),
            _ => None,
        };

        let row = secret::ActiveModel {
            owner_id: Set(owner.id()),
            kind: Set(new_secret.kind),
            label: Set(new_secret.label),
            note: Set(new_secret.note),
            file_label: Set(file_label),
            ciphertext: Set(new_secret.ciphertext),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };

        let inserted = row.insert(&self.db).await.map_err(classify)?;
        Ok(inserted.id)
    }

    /// Owner, id and kind must all match; anything else is NotFound.
    pub async fn fetch_secret(
        &self,
        owner: &Owner,
        id: i32,
        kind: SecretKind,
    ) -> Result<StoredSecret, StorageError> {
        secret::Entity::find()
            .filter(secret::Column::OwnerId.eq(owner.id()))
            .filter(secret::Column::Id.eq(id))
            .filter(secret::Column::Kind.eq(kind))
            .one(&self.db)
            .await?
            .map(StoredSecret::from)
            .ok_or(StorageError::NotFound)
    }

    pub async fn find_file_by_label(
        &self,
        owner: &Owner,
        label: &str,
    ) -> Result<StoredSecret, StorageError> {
        secret::Entity::find()
            .filter(secret::Column::OwnerId.eq(owner.id()))
            .filter(secret::Column::Kind.eq(SecretKind::File))
            .filter(secret::Column::FileLabel.eq(label))
            .one(&self.db)
            .await?
            .map(StoredSecret::from)
            .ok_or(StorageError::NotFound)
    }

    pub async fn file_label_taken(&self, owner: &Owner, label: &str) -> Result<bool, StorageError> {
        match self.find_file_by_label(owner, label).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn classify(err: DbErr) -> StorageError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StorageError::AlreadyExists,
        _ => StorageError::Database(err),
    }
}
