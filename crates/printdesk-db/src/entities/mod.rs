pub mod fleet_events;
pub mod models;
pub mod print_jobs;
pub mod printer_parameters;
pub mod printers;
