//! Durable policy rule storage.

pub mod postgres;

pub use postgres::PostgresPolicyAdapter;
