//! Use-case services for dashboards and the cashier screen.
//!
//! # Responsibility
//! - Enforce role permissions and tenant scope before touching storage.
//! - Orchestrate repository calls into use-case level APIs.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - The tenant used for every repository call comes from
//!   [`crate::access::Actor`], never from caller-supplied records.

use crate::access::AccessError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog_service;
pub mod customer_service;
pub mod org_service;
pub mod pos_service;
pub mod report_service;

/// Error shared by CRUD-style services.
#[derive(Debug)]
pub enum ServiceError {
    Access(AccessError),
    Repo(RepoError),
    /// Write-then-read-back mismatch.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::InconsistentState(_) => None,
        }
    }
}

impl From<AccessError> for ServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
