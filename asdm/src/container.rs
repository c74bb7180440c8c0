// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

//! The dataset that owns a collection of tables.

use std::path::{Path, PathBuf};

use crate::entity::{Entity, EntityId};

/// The settings of an ASDM dataset that its tables consult.
#[derive(Clone, Debug)]
pub struct Container {
    entity: Entity,
    check_row_uniqueness: bool,
    directory: Option<PathBuf>,
}

impl Default for Container {
    fn default() -> Self {
        Container::new(Entity::new(EntityId::default(), "ASDM"))
    }
}

impl Container {
    /// Create a container with the given entity.
    ///
    /// Row uniqueness is checked by default, and there is no backing
    /// directory.
    pub fn new(entity: Entity) -> Self {
        Container {
            entity,
            check_row_uniqueness: true,
            directory: None,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn set_entity(&mut self, entity: Entity) {
        self.entity = entity;
    }

    /// Whether tables should refuse rows with duplicate keys when loading.
    pub fn check_row_uniqueness(&self) -> bool {
        self.check_row_uniqueness
    }

    pub fn set_check_row_uniqueness(&mut self, check: bool) {
        self.check_row_uniqueness = check;
    }

    /// The directory holding the dataset's table files, used when tables are
    /// loaded on demand.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn set_directory<P: Into<PathBuf>>(&mut self, dir: P) {
        self.directory = Some(dir.into());
    }
}
