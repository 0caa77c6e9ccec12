// ABOUTME: Initial migration creating the users table and the polymorphic secrets table
// ABOUTME: Adds the owner/kind lookup index and the per-owner unique file label index

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Login).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::CreatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Secrets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Secrets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Secrets::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Secrets::Kind).text().not_null())
                    .col(ColumnDef::new(Secrets::Label).string().not_null().default(""))
                    .col(ColumnDef::new(Secrets::Note).text().not_null().default(""))
                    .col(ColumnDef::new(Secrets::FileLabel).string())
                    .col(ColumnDef::new(Secrets::Ciphertext).blob().not_null())
                    .col(ColumnDef::new(Secrets::CreatedAt).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_secrets_owner_id")
                            .from(Secrets::Table, Secrets::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_secrets_owner_kind")
                    .table(Secrets::Table)
                    .col(Secrets::OwnerId)
                    .col(Secrets::Kind)
                    .to_owned(),
            )
            .await?;

        // NULL file labels never collide, so only labelled files are constrained.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_secrets_owner_file_label")
                    .table(Secrets::Table)
                    .col(Secrets::OwnerId)
                    .col(Secrets::FileLabel)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Secrets::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Login,
    PasswordHash,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Secrets {
    Table,
    Id,
    OwnerId,
    Kind,
    Label,
    Note,
    FileLabel,
    Ciphertext,
    CreatedAt,
}
