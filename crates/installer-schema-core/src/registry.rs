use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::descriptor::{is_identifier, EntityDescriptor};
use crate::entity::{Entity, EntityShape};
use crate::error::{RegistryError, SchemaError};
use crate::records::{
    AwsCluster, BaseCluster, Credential, DigitalOceanCluster, Domain, Event, InstanceIp, Prompt,
};

pub type TableDescriptors = Vec<(&'static str, EntityDescriptor)>;

/// A persisted entity and the table it lives in.
#[derive(Debug, Clone, Copy)]
pub struct RegisteredEntity {
    pub table: &'static str,
    pub shape: fn() -> EntityShape,
}

impl RegisteredEntity {
    #[must_use]
    pub fn of<E: Entity>(table: &'static str) -> Self {
        Self { table, shape: E::shape }
    }

    /// Reflect, wrapping failures with the entity and table names.
    ///
    /// # Errors
    /// Returns `SchemaError::Reflection` when the declared shape is malformed.
    pub fn descriptor(&self) -> Result<EntityDescriptor, SchemaError> {
        let shape = (self.shape)();
        EntityDescriptor::reflect(&shape).map_err(|source| SchemaError::Reflection {
            entity: shape.name.to_string(),
            table: self.table.to_string(),
            source,
        })
    }
}

/// Ordered set of every persisted entity. Iteration order is registration order.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<RegisteredEntity>,
}

impl Registry {
    /// # Errors
    /// Returns an error when a table name repeats or is not a plain identifier.
    pub fn new(entries: Vec<RegisteredEntity>) -> Result<Self, RegistryError> {
        let mut tables = BTreeSet::new();
        for entry in &entries {
            if !is_identifier(entry.table) {
                return Err(RegistryError::InvalidTable(entry.table.to_string()));
            }
            if !tables.insert(entry.table) {
                return Err(RegistryError::DuplicateTable(entry.table.to_string()));
            }
        }
        Ok(Self { entries })
    }

    /// Every installer record type.
    #[must_use]
    pub fn installer() -> Self {
        Self {
            entries: vec![
                RegisteredEntity::of::<Credential>("credentials"),
                RegisteredEntity::of::<BaseCluster>("clusters"),
                RegisteredEntity::of::<AwsCluster>("aws_clusters"),
                RegisteredEntity::of::<DigitalOceanCluster>("digital_ocean_clusters"),
                RegisteredEntity::of::<Event>("events"),
                RegisteredEntity::of::<Prompt>("prompts"),
                RegisteredEntity::of::<InstanceIp>("instances"),
                RegisteredEntity::of::<Domain>("domains"),
            ],
        }
    }

    #[must_use]
    pub fn tables(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.table).collect()
    }

    /// Reflect every entity in order, stopping at the first malformed shape.
    ///
    /// # Errors
    /// Returns `SchemaError::Reflection` naming the offending entity.
    pub fn descriptors(&self) -> Result<TableDescriptors, SchemaError> {
        self.entries.iter().map(|entry| Ok((entry.table, entry.descriptor()?))).collect()
    }

    /// SHA-256 over every table and its columns, in registry order.
    ///
    /// # Errors
    /// Returns `SchemaError::Reflection` when any shape is malformed.
    pub fn fingerprint(&self) -> Result<String, SchemaError> {
        let mut hasher = Sha256::new();
        for (table, descriptor) in self.descriptors()? {
            hasher.update(table.as_bytes());
            hasher.update(b"\n");
            for field in descriptor.fields() {
                hasher.update(field.name.as_bytes());
                hasher.update(b":");
                hasher.update(field.storage.as_str().as_bytes());
                if field.indexed {
                    hasher.update(b":indexed");
                }
                hasher.update(b"\n");
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }
}
