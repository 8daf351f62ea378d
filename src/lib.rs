pub mod aggregation;
pub mod auth;
pub mod config;
pub mod error;
pub mod installments;
pub mod period;
pub mod routes;
pub mod schemas;
pub mod store;
pub mod tracker;
pub mod working_set;
