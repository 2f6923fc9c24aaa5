//! Middleware del sistema
//!
//! Este módulo contiene el middleware de medición de rendimiento, cache de
//! respuestas y CORS.

pub mod cache;
pub mod cors;
pub mod performance;

pub use cache::*;
pub use cors::*;
pub use performance::*;
