use sea_orm_migration::prelude::*;

mod m20240301_000001_create_bulk_actions_table;
mod m20240301_000002_create_push_jobs_table;
mod m20240301_000003_create_contacts_table;

/// Database migrator for SeaORM
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_bulk_actions_table::Migration),
            Box::new(m20240301_000002_create_push_jobs_table::Migration),
            Box::new(m20240301_000003_create_contacts_table::Migration),
        ]
    }
}
