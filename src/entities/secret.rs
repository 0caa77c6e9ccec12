// ABOUTME: Secret entity: one polymorphic table of encrypted payloads discriminated by kind
// ABOUTME: file_label is populated only for labelled files and is unique per owner

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "secrets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner_id: i32,
    pub kind: SecretKind,
    pub label: String,
    #[sea_orm(column_type = "Text")]
    pub note: String,
    pub file_label: Option<String>,
    pub ciphertext: Vec<u8>,
    pub created_at: i64,
}

/// Selects which plaintext structure a row's ciphertext opens to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum SecretKind {
    #[sea_orm(string_value = "password")]
    Password,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "file")]
    File,
}

impl SecretKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SecretKind::Password => "password",
            SecretKind::Card => "card",
            SecretKind::Text => "text",
            SecretKind::File => "file",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
