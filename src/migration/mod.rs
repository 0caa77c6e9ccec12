// ABOUTME: SeaORM migration module for database schema management
// ABOUTME: Applied at startup; every step is idempotent so restarts are safe

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250301_000001_create_users_and_secrets::Migration)]
    }
}

pub mod m20250301_000001_create_users_and_secrets;
