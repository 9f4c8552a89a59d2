//! The CLI's secret collection. It is stored as one encrypted blob.

use std::collections::BTreeMap;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{0}' already exists")]
    AlreadyExists(String),

    #[error("secret '{0}' not found")]
    NotFound(String),
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SecretStore {
    secrets: BTreeMap<String, SecretEntry>,
    created: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SecretEntry {
    name: String,
    value: String,
    updated: String,
}

impl SecretEntry {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            updated: Local::now().to_rfc3339(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn updated(&self) -> &str {
        &self.updated
    }
}

impl SecretStore {
    pub fn new() -> Self {
        Self {
            secrets: BTreeMap::new(),
            created: Local::now().to_rfc3339(),
        }
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<(), SecretError> {
        if self.secrets.contains_key(name) {
            return Err(SecretError::AlreadyExists(name.to_string()));
        }
        self.secrets
            .insert(name.to_string(), SecretEntry::new(name, value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(SecretEntry::value)
    }

    pub fn update(&mut self, name: &str, value: &str) -> Result<(), SecretError> {
        match self.secrets.get_mut(name) {
            Some(entry) => {
                *entry = SecretEntry::new(name, value);
                Ok(())
            }
            None => Err(SecretError::NotFound(name.to_string())),
        }
    }

    pub fn remove(&mut self, name: &str) -> Result<(), SecretError> {
        self.secrets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SecretEntry> {
        self.secrets.values()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}
