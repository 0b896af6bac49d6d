//! Metadata governance for DHIS2 servers: option code renames with rollback,
//! option set naming validation and metadata comparison between servers.

pub mod backup;
pub mod cli;
pub mod config;
pub mod data;
pub mod discrepancy;
pub mod error;
pub mod gateway;
pub mod metadata;
pub mod option_sets;
pub mod rename;
pub mod report;
pub mod repository;
pub mod usecases;

pub use error::{GovernanceError, Result};
