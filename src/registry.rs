use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::Client;
use crate::config::Config;
use crate::error::StoreError;
use crate::store::{SharedKeyspace, new_shared};

/// Table of logical databases. Keyspaces are created on first use and live
/// until the registry is dropped; every handle on one index shares the same
/// keyspace.
#[derive(Debug, Default)]
pub struct Registry {
    config: Config,
    databases: Mutex<HashMap<usize, SharedKeyspace>>,
}

impl Registry {
    pub fn new(config: Config) -> Arc<Self> {
        tracing::debug!(databases = config.databases, "registry created");
        Arc::new(Self {
            config,
            databases: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve (creating if needed) the keyspace for `db`.
    pub fn keyspace(&self, db: usize) -> Result<SharedKeyspace, StoreError> {
        if db >= self.config.databases {
            return Err(StoreError::DbIndexOutOfRange);
        }
        let mut databases = self.databases.lock().map_err(|_| StoreError::Poisoned)?;
        let keyspace = databases.entry(db).or_insert_with(|| {
            tracing::debug!(db, "keyspace created");
            new_shared()
        });
        Ok(Arc::clone(keyspace))
    }

    /// A command handle bound to database `db`.
    pub fn client(self: &Arc<Self>, db: usize) -> Result<Client, StoreError> {
        let keyspace = self.keyspace(db)?;
        Ok(Client::new(db, keyspace, Arc::clone(self)))
    }

    /// Clear every database created so far.
    pub fn flushall(&self) -> Result<(), StoreError> {
        let keyspaces: Vec<SharedKeyspace> = {
            let databases = self.databases.lock().map_err(|_| StoreError::Poisoned)?;
            databases.values().cloned().collect()
        };
        for keyspace in keyspaces {
            keyspace.write().map_err(|_| StoreError::Poisoned)?.flushdb()?;
        }
        tracing::debug!("all databases flushed");
        Ok(())
    }
}
