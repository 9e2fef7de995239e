//! Persistence collaborator boundary.
//!
//! The core never depends on a storage technology; it talks to these traits.
//! Implementations map their backend failures onto [`RepoError`].

pub mod memory;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::Client;

pub use memory::InMemoryRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository connection failed: {0}")]
    Connection(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// CRUD surface over stored clients.
pub trait ClientRepository {
    fn create_client(&self, client: &Client) -> RepoResult<()>;
    fn reconstitute_client(&self, client_id: i64) -> RepoResult<Client>;
    fn list_all_clients(&self) -> RepoResult<Vec<Client>>;
    fn update_client(&self, client: &Client) -> RepoResult<()>;
    fn delete_client(&self, client_id: i64) -> RepoResult<()>;
}

/// One logged heating decision for a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub client_id: i64,
    pub timestamp: NaiveDateTime,
    pub power_w: f64,
}

/// Append/query surface over the decision log.
pub trait DecisionRepository {
    fn create_decision(
        &self,
        client_id: i64,
        timestamp: NaiveDateTime,
        power_w: f64,
    ) -> RepoResult<()>;
    fn list_in_range(
        &self,
        client_id: i64,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepoResult<Vec<Decision>>;
    fn update_decision(
        &self,
        client_id: i64,
        timestamp: NaiveDateTime,
        power_w: f64,
    ) -> RepoResult<()>;
    fn delete_decision(&self, client_id: i64, timestamp: NaiveDateTime) -> RepoResult<()>;
}
