//! Módulo de base de datos
//!
//! Maneja la conexión y operaciones con PostgreSQL

pub mod connection;
pub mod manager;

pub use connection::{ConnectionTarget, Connector, DatabaseError, PgConnector, ServerStats};
pub use manager::{ConnectionEvent, ConnectionStatus, DatabaseManager, DatabaseStats, ReadyState};
