use sea_orm_migration::prelude::*;

mod m0001_create_models;
mod m0002_create_printers;
mod m0003_create_print_jobs;
mod m0004_create_fleet_events;
mod m0005_create_printer_parameters;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_models::Migration),
            Box::new(m0002_create_printers::Migration),
            Box::new(m0003_create_print_jobs::Migration),
            Box::new(m0004_create_fleet_events::Migration),
            Box::new(m0005_create_printer_parameters::Migration),
        ]
    }
}
