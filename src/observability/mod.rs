pub mod metrics;
pub mod routes;
