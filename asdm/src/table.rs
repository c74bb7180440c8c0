// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Tables: ordered, key-checked collections of rows and their persisted forms.

A `Table` holds its rows in insertion order, which is also the order in which
they are serialized. Tables can be written and read as XML documents and as
two-part MIME messages with a binary payload, and saved to or loaded from a
dataset directory, where a table named `Foo` lives in `Foo.xml` and,
for binary tables, `Foo.bin`.

Uniqueness of the composite key is enforced by a linear scan on insertion.

*/

use rubbl_core::io::{ByteOrder, EndianReader, EndianWriter};
use rubbl_core::notify::NotificationBackend;
use rubbl_core::{rn_note, rn_warning};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::container::Container;
use crate::entity::{Entity, EntityId};
use crate::errors::{AsdmError, Result};
use crate::mime;
use crate::row::{AsdmRow, Presence};
use crate::xml::{decode_document, encode_latin1, Element};

/// A callback that reads the binary data of an attribute that the table's
/// row type does not know about.
pub type UnknownAttributeReader = Box<dyn FnMut(&mut EndianReader<&[u8]>) -> Result<()>>;

/// What to do with rows that cannot be emitted as XML.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PartialEmitPolicy {
    /// Leave incomplete rows out of the document.
    #[default]
    SkipIncompleteRows,

    /// Fail the whole document.
    Strict,
}

/// What to do when a row of an XML document fails to load for a reason other
/// than a duplicate key or uniqueness violation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PartialLoadPolicy {
    /// Stop loading, keep the rows loaded so far, and report success.
    #[default]
    SkipUnrecognizedErrors,

    /// Fail the load.
    Strict,
}

/// A table of an ASDM dataset.
pub struct Table<R: AsdmRow> {
    container: Rc<Container>,
    entity: Entity,
    rows: Vec<R>,
    declared_size: Option<usize>,
    present_in_memory: bool,
    file_as_bin: bool,
    byte_order: ByteOrder,
    version: Option<String>,
    emit_policy: PartialEmitPolicy,
    load_policy: PartialLoadPolicy,
    unknown_readers: HashMap<String, UnknownAttributeReader>,
}

impl<R: AsdmRow> Table<R> {
    /// Create an empty table belonging to *container*.
    pub fn new(container: Rc<Container>) -> Self {
        Table {
            container,
            entity: Entity::new(EntityId::default(), format!("{}Table", R::TABLE_NAME)),
            rows: Vec::new(),
            declared_size: None,
            present_in_memory: true,
            file_as_bin: false,
            byte_order: ByteOrder::machine(),
            version: None,
            emit_policy: PartialEmitPolicy::default(),
            load_policy: PartialLoadPolicy::default(),
            unknown_readers: HashMap::new(),
        }
    }

    /// The name of the table, e.g. `CalAtmosphere`.
    pub fn name(&self) -> &'static str {
        R::TABLE_NAME
    }

    fn root_name(&self) -> String {
        format!("{}Table", R::TABLE_NAME)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn set_entity(&mut self, entity: Entity) {
        self.entity = entity;
    }

    /// The schema version found in the last document that was loaded.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The number of rows in the table.
    ///
    /// If the rows have not been loaded, this is the declared size.
    pub fn size(&self) -> usize {
        if self.present_in_memory {
            self.rows.len()
        } else {
            self.declared_size.unwrap_or(0)
        }
    }

    /// The number of rows that the dataset manifest says this table has.
    pub fn declared_size(&self) -> Option<usize> {
        self.declared_size
    }

    pub fn set_declared_size(&mut self, size: Option<usize>) {
        self.declared_size = size;
    }

    /// Note that this table's rows are on disk, to be loaded on first access
    /// through `get`.
    pub fn set_not_present_in_memory(&mut self, declared_size: usize) {
        self.present_in_memory = false;
        self.declared_size = Some(declared_size);
    }

    pub fn is_present_in_memory(&self) -> bool {
        self.present_in_memory
    }

    /// Whether the table is persisted in binary form.
    pub fn is_file_as_bin(&self) -> bool {
        self.file_as_bin
    }

    pub fn set_file_as_bin(&mut self, as_bin: bool) {
        self.file_as_bin = as_bin;
    }

    /// The byte order used when this table is saved in binary form.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = order;
    }

    pub fn emit_policy(&self) -> PartialEmitPolicy {
        self.emit_policy
    }

    pub fn set_emit_policy(&mut self, policy: PartialEmitPolicy) {
        self.emit_policy = policy;
    }

    pub fn load_policy(&self) -> PartialLoadPolicy {
        self.load_policy
    }

    pub fn set_load_policy(&mut self, policy: PartialLoadPolicy) {
        self.load_policy = policy;
    }

    /// The names of the key attributes.
    pub fn key_names(&self) -> Vec<&'static str> {
        R::attributes()
            .iter()
            .filter(|d| d.presence == Presence::Key)
            .map(|d| d.name)
            .collect()
    }

    /// The names of all attributes, in canonical order.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        R::attributes().iter().map(|d| d.name).collect()
    }

    /// The attribute sequence assumed for binary data that do not declare
    /// their own.
    pub fn default_attribute_names_in_bin(&self) -> Vec<&'static str> {
        self.attribute_names()
    }

    /// Create a new row with default values. It is not part of the table
    /// until it is added.
    ///
    /// Populated rows are built with struct literals, usually completing
    /// `..table.new_row()` or a helper such as `CalAtmosphereRow::with_key`.
    pub fn new_row(&self) -> R {
        R::default()
    }

    /// Create a new row with the same values as *row*.
    pub fn new_row_from(&self, row: &R) -> R {
        row.clone()
    }

    fn has_key_of(&self, row: &R) -> bool {
        let key = row.key();
        self.rows.iter().any(|r| r.compare_key(&key))
    }

    fn push(&mut self, row: R) -> &R {
        self.rows.push(row);
        let i = self.rows.len() - 1;
        &self.rows[i]
    }

    fn duplicate_key(&self) -> AsdmError {
        AsdmError::DuplicateKey {
            table: R::TABLE_NAME.to_owned(),
        }
    }

    /// Add a row, failing if a row with the same key is already present.
    pub fn add(&mut self, row: R) -> Result<&R> {
        if self.has_key_of(&row) {
            return Err(self.duplicate_key());
        }

        Ok(self.push(row))
    }

    /// Add a row, failing if a row with the same key is already present.
    ///
    /// This is the insertion used when loading XML into a dataset that does
    /// not enforce row uniqueness. It still rejects duplicate keys.
    pub fn append_failing_on_duplicate(&mut self, row: R) -> Result<&R> {
        self.add(row)
    }

    /// Add a row during a load from a persisted form.
    ///
    /// Duplicate keys are rejected. The *skip_check_uniqueness* flag is
    /// accepted but currently has no effect.
    pub fn check_and_add(&mut self, row: R, skip_check_uniqueness: bool) -> Result<&R> {
        let _ = skip_check_uniqueness;
        self.add(row)
    }

    /// Add a row without checking its key against the existing rows.
    pub fn append(&mut self, row: R) -> &R {
        self.push(row)
    }

    /// The rows that are in memory, in insertion order.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Get all rows, loading them from the container's directory first if
    /// they are not in memory.
    pub fn get(&mut self, nb: &mut dyn NotificationBackend) -> Result<&[R]> {
        if !self.present_in_memory {
            let dir = match self.container.directory() {
                Some(d) => d.to_owned(),
                None => {
                    return conversion_err!(
                        R::TABLE_NAME,
                        "the rows are not in memory and the container has no directory to load them from"
                    )
                }
            };

            rn_note!(nb, "loading the {} table from \"{}\"", R::TABLE_NAME, dir.display());
            self.set_from_file(&dir, nb)?;
            self.present_in_memory = true;
        }

        Ok(&self.rows)
    }

    /// Find the row with the given key.
    pub fn get_row_by_key(&self, key: &R::Key) -> Option<&R> {
        self.rows.iter().find(|r| r.compare_key(key))
    }

    /// Find a row whose every attribute equals those of *values*.
    pub fn lookup(&self, values: &R) -> Option<&R> {
        self.rows.iter().find(|r| *r == values)
    }

    /// Emit the table as an XML document.
    ///
    /// Rows that lack a usable value for some attribute are left out unless
    /// the emit policy is `Strict`. The document declares ISO-8859-1, so it
    /// should be stored with `xml::encode_latin1`, as `to_file` does.
    pub fn to_xml(&self) -> Result<String> {
        let root = self.root_name();
        let mut buf = String::from("<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n");
        buf.push_str(&format!("<{} {}>\n", root, R::SCHEMA_ATTRIBUTES));
        buf.push_str(&self.entity.to_xml());
        buf.push('\n');
        buf.push_str(&self.container.entity().to_xml_tagged("ContainerEntity"));
        buf.push('\n');

        for row in &self.rows {
            match row.to_xml() {
                Ok(s) => buf.push_str(&s),

                Err(AsdmError::IncompleteRow { .. })
                    if self.emit_policy == PartialEmitPolicy::SkipIncompleteRows => {}

                Err(e) => return Err(e),
            }
        }

        buf.push_str(&format!("</{}>\n", root));
        Ok(buf)
    }

    fn load_xml_row(&mut self, elem: &Element, check_uniqueness: bool) -> Result<()> {
        let mut row = self.new_row();
        row.set_from_xml(elem)?;

        if check_uniqueness {
            self.check_and_add(row, false)?;
        } else {
            self.append_failing_on_duplicate(row)?;
        }

        Ok(())
    }

    /// Load rows from an XML document.
    ///
    /// The document's `Entity` becomes the table's entity. Duplicate keys
    /// are reported as conversion errors. Other problems with a row end the
    /// load, silently unless the load policy is `Strict`. When an error is
    /// returned the table is left as it was.
    pub fn from_xml(&mut self, doc: &str, nb: &mut dyn NotificationBackend) -> Result<()> {
        let root_name = self.root_name();

        let root = Element::parse(doc).map_err(|e| AsdmError::Conversion {
            table: R::TABLE_NAME.to_owned(),
            message: format!("failed to parse the XML document: {}", e),
        })?;

        if root.name != root_name {
            return conversion_err!(
                R::TABLE_NAME,
                "the root element is <{}> rather than <{}>",
                root.name,
                root_name
            );
        }

        let entity = match root.child("Entity") {
            Some(e) => Entity::from_xml(e).map_err(|e| e.into_conversion(R::TABLE_NAME))?,
            None => return conversion_err!(R::TABLE_NAME, "the document has no <Entity> element"),
        };

        if entity.entity_type_name != root_name {
            return conversion_err!(
                R::TABLE_NAME,
                "the document's entity has type \"{}\" rather than \"{}\"",
                entity.entity_type_name,
                root_name
            );
        }

        if root.child("ContainerEntity").is_none() {
            return conversion_err!(
                R::TABLE_NAME,
                "the document has no <ContainerEntity> element"
            );
        }

        let check_uniqueness = self.container.check_row_uniqueness();
        let first_new = self.rows.len();

        for elem in root.children_named("row") {
            match self.load_xml_row(elem, check_uniqueness) {
                Ok(()) => {}

                Err(e @ AsdmError::DuplicateKey { .. })
                | Err(e @ AsdmError::UniquenessViolation { .. }) => {
                    self.rows.truncate(first_new);
                    return Err(e.into_conversion(R::TABLE_NAME));
                }

                Err(e) => match self.load_policy {
                    PartialLoadPolicy::SkipUnrecognizedErrors => {
                        rn_note!(
                            nb,
                            "stopped loading the {} table after {} rows: {}",
                            R::TABLE_NAME,
                            self.rows.len() - first_new,
                            e
                        );
                        break;
                    }

                    PartialLoadPolicy::Strict => {
                        self.rows.truncate(first_new);
                        return Err(e.in_table(R::TABLE_NAME));
                    }
                },
            }
        }

        self.entity = entity;

        if let Some(v) = root.attribute("schemaVersion") {
            self.version = Some(v.to_owned());
        }

        self.report_dimensions(first_new, nb);
        self.file_as_bin = false;
        self.present_in_memory = true;
        Ok(())
    }

    fn report_dimensions(&self, first: usize, nb: &mut dyn NotificationBackend) {
        for (i, row) in self.rows.iter().enumerate().skip(first) {
            for problem in row.dimension_warnings() {
                rn_warning!(nb, "row {} of the {} table: {}", i, R::TABLE_NAME, problem);
            }
        }
    }

    /// The attribute names that appear in this table's binary form: all key
    /// and required attributes, and the optional ones that at least one row
    /// has set.
    pub fn binary_attribute_names(&self) -> Vec<&'static str> {
        R::attributes()
            .iter()
            .filter(|d| {
                d.presence != Presence::Optional || self.rows.iter().any(|r| r.has_attribute(d.name))
            })
            .map(|d| d.name)
            .collect()
    }

    fn mime_xml_part_for(&self, order: ByteOrder, names: &[&str]) -> String {
        let root = self.root_name();
        let mut s = String::from("<?xml version='1.0'  encoding='ISO-8859-1'?>\n");
        s.push_str(&format!("<{} {}>\n", root, R::SCHEMA_ATTRIBUTES));
        s.push_str(&self.entity.to_xml());
        s.push('\n');
        s.push_str(&self.container.entity().to_xml_tagged("ContainerEntity"));
        s.push('\n');
        s.push_str(&format!(
            "<BulkStoreRef file_id='{}' byteOrder='{}' />\n",
            self.entity.entity_id.without_prefix(),
            order
        ));
        s.push_str("<Attributes>\n");

        for name in names {
            s.push_str(&format!("<{}/>\n", name));
        }

        s.push_str("</Attributes>\n");
        s.push_str(&format!("</{}>\n", root));
        s
    }

    /// The XML header that describes this table's binary form.
    pub fn mime_xml_part(&self, order: ByteOrder) -> String {
        self.mime_xml_part_for(order, &self.binary_attribute_names())
    }

    /// Serialize the table as a MIME message with a binary payload.
    pub fn to_mime(&self, order: ByteOrder) -> Result<Vec<u8>> {
        let names = self.binary_attribute_names();
        let mut w = EndianWriter::new(Vec::new(), order);

        w.write_bytes(&encode_latin1(&mime::envelope(self.entity.entity_id.as_str())))?;
        w.write_bytes(&encode_latin1(&self.mime_xml_part_for(order, &names)))?;
        w.write_bytes(mime::BINARY_MARKER)?;

        self.entity.to_bin(&mut w)?;
        self.container.entity().to_bin(&mut w)?;
        w.write_len(self.rows.len())?;

        for row in &self.rows {
            for name in &names {
                row.attribute_to_bin(name, &mut w)
                    .map_err(|e| e.in_table(R::TABLE_NAME))?;
            }
        }

        w.write_bytes(mime::CLOSING)?;
        Ok(w.into_inner())
    }

    /// Load rows from a MIME message.
    ///
    /// The number of rows read is the declared size if there is one; the
    /// count recorded in the message is only used when there is not. A
    /// disagreement between the two is reported as a warning, unless the
    /// recorded count is -1, which producers use to mean "unknown". When an
    /// error is returned the table is left as it was.
    pub fn set_from_mime(&mut self, msg: &[u8], nb: &mut dyn NotificationBackend) -> Result<()> {
        let table = R::TABLE_NAME;
        let parts = mime::split(msg, table)?;
        let header = mime::parse_header(
            &parts.xml_header,
            table,
            &self.root_name(),
            &self.default_attribute_names_in_bin(),
        )?;

        let mut r = EndianReader::new(parts.payload, header.byte_order);

        let entity = Entity::from_bin(&mut r).map_err(|e| e.into_conversion(table))?;
        Entity::from_bin(&mut r).map_err(|e| e.into_conversion(table))?;
        let recorded = r
            .read_i32()
            .map_err(|e| AsdmError::from(e).into_conversion(table))?;

        let n_rows = match self.declared_size {
            Some(declared) => {
                if recorded != -1 && (recorded < 0 || recorded as usize != declared) {
                    rn_warning!(
                        nb,
                        "the {} table should have {} rows but its binary data record {}; reading {}",
                        table,
                        declared,
                        recorded,
                        declared
                    );
                }

                declared
            }

            None => {
                if recorded < 0 {
                    return conversion_err!(
                        table,
                        "the binary data do not record a usable row count ({}) and none was declared",
                        recorded
                    );
                }

                recorded as usize
            }
        };

        let first_new = self.rows.len();

        if let Err(e) = self.read_mime_rows(&mut r, &header.attributes, n_rows) {
            self.rows.truncate(first_new);
            return Err(e.into_conversion(table));
        }

        self.entity = entity;

        if header.schema_version.is_some() {
            self.version = header.schema_version;
        }

        self.report_dimensions(first_new, nb);
        self.file_as_bin = true;
        self.present_in_memory = true;
        Ok(())
    }

    fn read_mime_rows(
        &mut self,
        r: &mut EndianReader<&[u8]>,
        attributes: &[String],
        n_rows: usize,
    ) -> Result<()> {
        let table = R::TABLE_NAME;
        let check_uniqueness = self.container.check_row_uniqueness();

        for _ in 0..n_rows {
            let readers = &mut self.unknown_readers;

            let row = R::from_bin(r, attributes, |name, r| match readers.get_mut(name) {
                Some(f) => f(r),
                None => tagfmt_err!(
                    "the binary data contain the attribute \"{}\", which the {} table does not know",
                    name,
                    table
                ),
            })?;

            if check_uniqueness {
                self.check_and_add(row, false)?;
            } else {
                self.append(row);
            }
        }

        Ok(())
    }

    /// Register a reader for binary data of an attribute that this table
    /// does not know.
    ///
    /// The names of the table's own attributes cannot be registered.
    pub fn set_unknown_attribute_binary_reader<F>(&mut self, name: &str, reader: F) -> Result<()>
    where
        F: FnMut(&mut EndianReader<&[u8]>) -> Result<()> + 'static,
    {
        if R::attributes().iter().any(|d| d.name == name) {
            return conversion_err!(
                R::TABLE_NAME,
                "\"{}\" is an attribute of the table; its reader cannot be replaced",
                name
            );
        }

        self.unknown_readers
            .insert(name.to_owned(), Box::new(reader));
        Ok(())
    }

    /// Test whether a reader is registered for the named unknown attribute.
    pub fn has_unknown_attribute_binary_reader(&self, name: &str) -> bool {
        self.unknown_readers.contains_key(name)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        fs::write(path, data).map_err(|e| AsdmError::Conversion {
            table: R::TABLE_NAME.to_owned(),
            message: format!("could not write \"{}\": {}", path.display(), e),
        })
    }

    /// Save the table in *dir*, creating the directory if needed.
    ///
    /// XML tables are written to `<name>.xml`. Binary tables are written to
    /// `<name>.bin`, and their XML header alone to `<name>.xml`.
    pub fn to_file<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();

        fs::create_dir_all(dir).map_err(|e| AsdmError::Conversion {
            table: R::TABLE_NAME.to_owned(),
            message: format!("could not create the directory \"{}\": {}", dir.display(), e),
        })?;

        let xml_path = dir.join(format!("{}.xml", R::TABLE_NAME));

        if self.file_as_bin {
            let bin_path = dir.join(format!("{}.bin", R::TABLE_NAME));
            self.write_file(&bin_path, &self.to_mime(self.byte_order)?)?;
            self.write_file(&xml_path, &encode_latin1(&self.mime_xml_part(self.byte_order)))
        } else {
            self.write_file(&xml_path, &encode_latin1(&self.to_xml()?))
        }
    }

    /// Load the table from *dir*.
    ///
    /// `<name>.xml` is preferred; `<name>.bin` is used if it is absent.
    pub fn set_from_file<P: AsRef<Path>>(
        &mut self,
        dir: P,
        nb: &mut dyn NotificationBackend,
    ) -> Result<()> {
        let dir = dir.as_ref();

        if dir.join(format!("{}.xml", R::TABLE_NAME)).exists() {
            self.set_from_xml_file(dir, nb)
        } else if dir.join(format!("{}.bin", R::TABLE_NAME)).exists() {
            self.set_from_mime_file(dir, nb)
        } else {
            conversion_err!(
                R::TABLE_NAME,
                "No file found for the {} table in \"{}\"",
                R::TABLE_NAME,
                dir.display()
            )
        }
    }

    /// Load the table from `<name>.xml` in *dir*.
    ///
    /// If that file is only the header of a binary table, the rows are
    /// loaded from `<name>.bin` instead.
    pub fn set_from_xml_file<P: AsRef<Path>>(
        &mut self,
        dir: P,
        nb: &mut dyn NotificationBackend,
    ) -> Result<()> {
        let dir = dir.as_ref();
        let path = dir.join(format!("{}.xml", R::TABLE_NAME));

        let data = fs::read(&path).map_err(|e| AsdmError::Conversion {
            table: R::TABLE_NAME.to_owned(),
            message: format!("could not read \"{}\": {}", path.display(), e),
        })?;

        let text = decode_document(&data).map_err(|e| AsdmError::Conversion {
            table: R::TABLE_NAME.to_owned(),
            message: format!("could not decode \"{}\": {}", path.display(), e),
        })?;

        if text.contains("<BulkStoreRef") {
            self.set_from_mime_file(dir, nb)
        } else {
            self.from_xml(&text, nb)
        }
    }

    /// Load the table from `<name>.bin` in *dir*.
    pub fn set_from_mime_file<P: AsRef<Path>>(
        &mut self,
        dir: P,
        nb: &mut dyn NotificationBackend,
    ) -> Result<()> {
        let path = dir.as_ref().join(format!("{}.bin", R::TABLE_NAME));

        let data = fs::read(&path).map_err(|e| AsdmError::Conversion {
            table: R::TABLE_NAME.to_owned(),
            message: format!("could not read \"{}\": {}", path.display(), e),
        })?;

        self.set_from_mime(&data, nb)
    }
}
