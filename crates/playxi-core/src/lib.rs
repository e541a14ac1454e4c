// Library root: re-export modules for use by the server binary and tests.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod ledger;
pub mod lineup;
pub mod model;
pub mod propagation;
pub mod protocol;
pub mod provider;
pub mod scoring;
pub mod service;
