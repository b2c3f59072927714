pub use sea_orm_migration::prelude::*;

mod m001_registration_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m001_registration_tokens::Migration)]
    }
}
