// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Entities: the versioned identifiers attached to tables and datasets.

*/

use quick_xml::escape::escape;
use rubbl_core::io::{EndianReader, EndianWriter};
use std::fmt;
use std::io::{Read, Write};

use crate::errors::{AsdmError, Result};
use crate::xml::Element;

/// The prefix that all entity ids carry.
pub const UID_PREFIX: &str = "uid://";

/// A unique identifier of the form `uid://...`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct EntityId(String);

impl EntityId {
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();

        if !id.starts_with(UID_PREFIX) || id.len() == UID_PREFIX.len() {
            return tagfmt_err!("\"{}\" is not a valid entity id", id);
        }

        Ok(EntityId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the id with its `uid://` prefix removed.
    pub fn without_prefix(&self) -> &str {
        &self.0[UID_PREFIX.len()..]
    }
}

impl Default for EntityId {
    fn default() -> Self {
        EntityId("uid://X0/X0/X0".to_owned())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identifier with version information.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entity {
    pub entity_id: EntityId,
    pub entity_id_encrypted: String,
    pub entity_type_name: String,
    pub entity_version: String,
    pub instance_version: String,
}

impl Entity {
    /// Create an entity of the given type, unencrypted and at version 1.
    pub fn new<S: Into<String>>(entity_id: EntityId, type_name: S) -> Self {
        Entity {
            entity_id,
            entity_id_encrypted: "na".to_owned(),
            entity_type_name: type_name.into(),
            entity_version: "1".to_owned(),
            instance_version: "1".to_owned(),
        }
    }

    pub fn to_xml(&self) -> String {
        self.to_xml_tagged("Entity")
    }

    /// Emit this entity as an empty element with the given tag name.
    ///
    /// Tables record the entity of their container with the tag
    /// `ContainerEntity`.
    pub fn to_xml_tagged(&self, tag: &str) -> String {
        format!(
            "<{} entityId='{}' entityIdEncrypted='{}' entityTypeName='{}' schemaVersion='{}' documentVersion='{}'/>",
            tag,
            escape(self.entity_id.as_str()),
            escape(self.entity_id_encrypted.as_str()),
            escape(self.entity_type_name.as_str()),
            escape(self.entity_version.as_str()),
            escape(self.instance_version.as_str()),
        )
    }

    /// Build an entity from the attributes of a parsed element.
    ///
    /// Only `entityId` is mandatory; missing attributes take the values
    /// used by `Entity::new`.
    pub fn from_xml(elem: &Element) -> Result<Self> {
        let id = elem.attribute("entityId").ok_or_else(|| {
            AsdmError::TagFormat(format!("<{}> element has no entityId", elem.name))
        })?;

        let get = |name: &str, default: &str| elem.attribute(name).unwrap_or(default).to_owned();

        Ok(Entity {
            entity_id: EntityId::new(id)?,
            entity_id_encrypted: get("entityIdEncrypted", "na"),
            entity_type_name: get("entityTypeName", ""),
            entity_version: get("schemaVersion", "1"),
            instance_version: get("documentVersion", "1"),
        })
    }

    /// Parse an entity from a standalone XML fragment.
    pub fn from_xml_str(fragment: &str) -> Result<Self> {
        Self::from_xml(&Element::parse(fragment)?)
    }

    pub fn to_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        w.write_string(self.entity_id.as_str())?;
        w.write_string(&self.entity_id_encrypted)?;
        w.write_string(&self.entity_type_name)?;
        w.write_string(&self.entity_version)?;
        w.write_string(&self.instance_version)?;
        Ok(())
    }

    pub fn from_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(Entity {
            entity_id: EntityId::new(r.read_string()?)?,
            entity_id_encrypted: r.read_string()?,
            entity_type_name: r.read_string()?,
            entity_version: r.read_string()?,
            instance_version: r.read_string()?,
        })
    }
}
