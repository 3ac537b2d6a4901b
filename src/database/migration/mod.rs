use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20250801_000001_create_users_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250801_000001_create_users_table::Migration)]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    PlatformUserId,
    Platform,
    Email,
    DisplayName,
    CreatedAt,
    UpdatedAt,
    LastLogin,
}
