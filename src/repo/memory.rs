use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::domain::Client;
use crate::repo::{ClientRepository, Decision, DecisionRepository, RepoError, RepoResult};

/// Map-backed repository used by tests and single-process deployments.
///
/// Clients are keyed by id, decisions by `(client_id, timestamp)`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    clients: RwLock<BTreeMap<i64, Client>>,
    decisions: RwLock<BTreeMap<(i64, NaiveDateTime), f64>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientRepository for InMemoryRepository {
    fn create_client(&self, client: &Client) -> RepoResult<()> {
        let mut clients = self.clients.write();
        if clients.contains_key(&client.client_id) {
            return Err(RepoError::Integrity(format!(
                "client {} already exists",
                client.client_id
            )));
        }
        clients.insert(client.client_id, client.clone());
        Ok(())
    }

    fn reconstitute_client(&self, client_id: i64) -> RepoResult<Client> {
        self.clients
            .read()
            .get(&client_id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("client {client_id}")))
    }

    fn list_all_clients(&self) -> RepoResult<Vec<Client>> {
        Ok(self.clients.read().values().cloned().collect())
    }

    fn update_client(&self, client: &Client) -> RepoResult<()> {
        let mut clients = self.clients.write();
        match clients.get_mut(&client.client_id) {
            Some(stored) => {
                *stored = client.clone();
                Ok(())
            }
            None => Err(RepoError::NotFound(format!("client {}", client.client_id))),
        }
    }

    fn delete_client(&self, client_id: i64) -> RepoResult<()> {
        let mut clients = self.clients.write();
        if clients.remove(&client_id).is_none() {
            return Err(RepoError::NotFound(format!("client {client_id}")));
        }
        // Cascade: a removed client keeps no decision history
        self.decisions
            .write()
            .retain(|(id, _), _| *id != client_id);
        Ok(())
    }
}

impl DecisionRepository for InMemoryRepository {
    fn create_decision(
        &self,
        client_id: i64,
        timestamp: NaiveDateTime,
        power_w: f64,
    ) -> RepoResult<()> {
        if !self.clients.read().contains_key(&client_id) {
            return Err(RepoError::NotFound(format!("client {client_id}")));
        }
        let mut decisions = self.decisions.write();
        if decisions.contains_key(&(client_id, timestamp)) {
            return Err(RepoError::Integrity(format!(
                "decision for client {client_id} at {timestamp} already exists"
            )));
        }
        decisions.insert((client_id, timestamp), power_w);
        Ok(())
    }

    fn list_in_range(
        &self,
        client_id: i64,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepoResult<Vec<Decision>> {
        Ok(self
            .decisions
            .read()
            .range((client_id, from)..=(client_id, to))
            .map(|(&(id, timestamp), &power_w)| Decision {
                client_id: id,
                timestamp,
                power_w,
            })
            .collect())
    }

    fn update_decision(
        &self,
        client_id: i64,
        timestamp: NaiveDateTime,
        power_w: f64,
    ) -> RepoResult<()> {
        let mut decisions = self.decisions.write();
        match decisions.get_mut(&(client_id, timestamp)) {
            Some(stored) => {
                *stored = power_w;
                Ok(())
            }
            None => Err(RepoError::NotFound(format!(
                "decision for client {client_id} at {timestamp}"
            ))),
        }
    }

    fn delete_decision(&self, client_id: i64, timestamp: NaiveDateTime) -> RepoResult<()> {
        if self
            .decisions
            .write()
            .remove(&(client_id, timestamp))
            .is_none()
        {
            return Err(RepoError::NotFound(format!(
                "decision for client {client_id} at {timestamp}"
            )));
        }
        Ok(())
    }
}
