//! Blood bank backend
//!
//! Infraestructura operativa del backend del banco de sangre: cache con
//! respaldo en memoria, conexión resiliente a la base de datos y monitor
//! de rendimiento de las requests HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod middleware;
pub mod monitoring;
pub mod state;
pub mod utils;
