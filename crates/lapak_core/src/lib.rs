//! Core domain logic for the Lapak retail CRM/POS.
//! Every tenant-owned read and write in this crate is scoped by `company_id`.

pub mod access;
pub mod assistant;
pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod report;
pub mod repo;
pub mod rfm;
pub mod service;

pub use access::{AccessError, Actor, Permission};
pub use config::{ConfigError, ConfigOverrides, LapakConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError, LoggingStatus};
pub use model::org::{Company, CompanyId, Employee, Plan, Role, Store};
pub use repo::{RepoError, RepoResult};
pub use rfm::{RfmReport, Segment};

