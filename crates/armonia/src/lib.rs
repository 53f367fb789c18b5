pub mod app;
pub mod assembly;
pub mod communications;
pub mod config;
pub mod error;
pub mod finances;
pub mod inventory;
pub mod marketplace;
pub mod members;
pub mod messaging;
pub mod notifications;
pub mod payments;
pub mod pqr;
pub mod providers;
pub mod reservations;
pub mod store;
pub mod telemetry;
pub mod tenancy;
