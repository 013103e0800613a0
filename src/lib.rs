// Library for tests to access modules

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod models;
pub mod query;
pub mod routes;
pub mod store;
pub mod sysinfo_repo;
pub mod version;
pub mod worker;
