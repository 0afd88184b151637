pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20261001_000001_short_links;
mod m20261001_000002_click_events;
mod m20261001_000003_click_rollups;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_short_links::Migration),
            Box::new(m20261001_000002_click_events::Migration),
            Box::new(m20261001_000003_click_rollups::Migration),
        ]
    }
}
