// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Rows of ASDM tables.

Every table type has a row type implementing `AsdmRow`. The trait describes
the table's columns as a list of `AttributeDef`s and lets the engine access
each column by name, which is all that the XML and binary codecs need: a row
is written as its attributes in canonical order, and read back from whatever
sequence of attribute names a particular file declares.

Row types are normally generated with the `asdm_row!` macro, which takes the
column list and produces the struct and the per-attribute dispatch code.

*/

use rubbl_core::io::{EndianReader, EndianWriter};
use std::fmt;
use std::io::{Read, Write};

use crate::errors::{AsdmError, Result};
use crate::xml::Element;

/// How a column relates to the rows of its table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Presence {
    /// Part of the composite key; always present.
    Key,

    /// Always present.
    Required,

    /// May be absent from any given row.
    Optional,
}

/// The broad type of the values in a column.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttributeKind {
    /// A number, string, tag, or time.
    Scalar,

    /// A physical quantity with a unit.
    Quantity,

    /// A value from an enumeration.
    Enum,

    /// An array of any of the above.
    Sequence,
}

/// The description of one column of a table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AttributeDef {
    pub name: &'static str,
    pub presence: Presence,
    pub kind: AttributeKind,
}

/// One record of an ASDM table.
pub trait AsdmRow: Clone + Default + PartialEq + fmt::Debug {
    /// The composite key of the table.
    type Key: Clone + PartialEq + fmt::Debug;

    /// The name of the table, e.g. `CalAtmosphere`.
    const TABLE_NAME: &'static str;

    /// The namespace and schema attributes of the root element of the
    /// table's XML documents.
    const SCHEMA_ATTRIBUTES: &'static str;

    /// Get the columns of the table in canonical order: key attributes, then
    /// required ones, then optional ones.
    fn attributes() -> &'static [AttributeDef];

    fn key(&self) -> Self::Key;

    /// Test whether this row's key equals *key*.
    fn compare_key(&self, key: &Self::Key) -> bool {
        self.key() == *key
    }

    /// Test whether this row has a value for the named attribute.
    ///
    /// Returns false for names that are not attributes of the table.
    fn has_attribute(&self, name: &str) -> bool;

    /// Append the XML element for the named attribute to *out*.
    ///
    /// Absent optional attributes produce nothing.
    fn attribute_to_xml(&self, name: &str, out: &mut String) -> Result<()>;

    /// Set the named attribute from the text content of its XML element.
    ///
    /// Returns `Ok(false)` if the name is not an attribute of the table.
    fn set_from_text(&mut self, name: &str, text: &str) -> Result<bool>;

    /// Write the named attribute to a binary stream.
    ///
    /// Optional attributes are preceded by a presence flag.
    fn attribute_to_bin<W: Write>(&self, name: &str, w: &mut EndianWriter<W>) -> Result<()>;

    /// Read the named attribute from a binary stream.
    ///
    /// Returns `Ok(false)`, having consumed nothing, if the name is not an
    /// attribute of the table.
    fn attribute_from_bin<R: Read>(&mut self, name: &str, r: &mut EndianReader<R>)
        -> Result<bool>;

    /// Describe any inconsistencies between the declared dimensions of this
    /// row and the shapes of its array attributes.
    fn dimension_warnings(&self) -> Vec<String> {
        Vec::new()
    }

    /// Emit this row as a `<row>` element.
    ///
    /// A key or required attribute without a usable value (such as a null
    /// tag) results in an `IncompleteRow` error.
    fn to_xml(&self) -> Result<String> {
        let mut out = String::from("<row> \n");

        for def in Self::attributes() {
            let before = out.len();

            self.attribute_to_xml(def.name, &mut out)
                .map_err(|e| match e {
                    AsdmError::TagFormat(_) => AsdmError::IncompleteRow {
                        table: Self::TABLE_NAME.to_owned(),
                        attribute: def.name.to_owned(),
                    },
                    other => other,
                })?;

            if out.len() > before {
                out.push('\n');
            }
        }

        out.push_str("</row>\n");
        Ok(out)
    }

    /// Set this row's attributes from a parsed `<row>` element.
    ///
    /// Every key and required attribute must be present. Optional attributes
    /// that are absent are left alone, as are unrecognized elements.
    fn set_from_xml(&mut self, row: &Element) -> Result<()> {
        for def in Self::attributes() {
            match row.child(def.name) {
                Some(elem) => {
                    self.set_from_text(def.name, &elem.text)?;
                }

                None if def.presence == Presence::Optional => {}

                None => {
                    return tagfmt_err!(
                        "the <row> element of a {} table has no <{}>",
                        Self::TABLE_NAME,
                        def.name
                    )
                }
            }
        }

        Ok(())
    }

    /// Set this row's attributes from a `<row>...</row>` fragment.
    fn set_from_xml_str(&mut self, fragment: &str) -> Result<()> {
        let elem = Element::parse(fragment)?;

        if elem.name != "row" {
            return tagfmt_err!("expected a <row> element but found <{}>", elem.name);
        }

        self.set_from_xml(&elem)
    }

    /// Write every attribute of the row, in canonical order.
    fn to_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        for def in Self::attributes() {
            self.attribute_to_bin(def.name, w)?;
        }

        Ok(())
    }

    /// Read a row whose attributes appear in the order given by *names*.
    ///
    /// Names that the row type does not know are passed to *unknown*, which
    /// must consume the corresponding data from the stream.
    fn from_bin<R, F>(r: &mut EndianReader<R>, names: &[String], mut unknown: F) -> Result<Self>
    where
        R: Read,
        F: FnMut(&str, &mut EndianReader<R>) -> Result<()>,
    {
        let mut row = Self::default();

        for name in names {
            if !row.attribute_from_bin(name, r)? {
                unknown(name, r)?;
            }
        }

        Ok(row)
    }
}

/// Define a row type.
///
/// The columns are listed in canonical order in three groups. Each entry
/// gives the field name, its Rust type, the attribute name used in files,
/// and its `AttributeKind`. Optional attributes are stored as `Option`s of
/// the listed type.
///
/// ```rust,ignore
/// asdm_row! {
///     /// A row of the Foo table.
///     pub struct FooRow {
///         table = "Foo";
///         schema = "schemaVersion=\"3\"";
///         key {
///             name: String => "name", Scalar;
///         }
///         required {
///             values: Vec<f32> => "values", Sequence;
///         }
///         optional {
///             band: ReceiverBand => "band", Enum;
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! asdm_row {
    (
        $(#[$meta:meta])*
        pub struct $row:ident {
            table = $table:literal;
            schema = $schema:literal;
            key {
                $( $(#[$kmeta:meta])* $kfield:ident : $kty:ty => $kname:literal, $kkind:ident; )*
            }
            required {
                $( $(#[$rmeta:meta])* $rfield:ident : $rty:ty => $rname:literal, $rkind:ident; )*
            }
            optional {
                $( $(#[$ometa:meta])* $ofield:ident : $oty:ty => $oname:literal, $okind:ident; )*
            }
            $( dimension_warnings = $dimcheck:path; )?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct $row {
            $( $(#[$kmeta])* pub $kfield: $kty, )*
            $( $(#[$rmeta])* pub $rfield: $rty, )*
            $( $(#[$ometa])* pub $ofield: Option<$oty>, )*
        }

        impl $row {
            /// Compare the required non-key attributes of this row with the
            /// given values.
            #[allow(clippy::too_many_arguments)]
            pub fn compare_required_value(&self, $( $rfield: &$rty ),* ) -> bool {
                $( self.$rfield == *$rfield )&&*
            }

            /// Test whether this row and *other* agree on all of their
            /// required non-key attributes.
            pub fn equal_by_required_value(&self, other: &Self) -> bool {
                $( self.$rfield == other.$rfield )&&*
            }
        }

        impl $crate::row::AsdmRow for $row {
            type Key = ( $( $kty, )* );

            const TABLE_NAME: &'static str = $table;
            const SCHEMA_ATTRIBUTES: &'static str = $schema;

            fn attributes() -> &'static [$crate::row::AttributeDef] {
                const ATTRIBUTES: &[$crate::row::AttributeDef] = &[
                    $( $crate::row::AttributeDef {
                        name: $kname,
                        presence: $crate::row::Presence::Key,
                        kind: $crate::row::AttributeKind::$kkind,
                    }, )*
                    $( $crate::row::AttributeDef {
                        name: $rname,
                        presence: $crate::row::Presence::Required,
                        kind: $crate::row::AttributeKind::$rkind,
                    }, )*
                    $( $crate::row::AttributeDef {
                        name: $oname,
                        presence: $crate::row::Presence::Optional,
                        kind: $crate::row::AttributeKind::$okind,
                    }, )*
                ];
                ATTRIBUTES
            }

            fn key(&self) -> Self::Key {
                ( $( self.$kfield.clone(), )* )
            }

            fn has_attribute(&self, name: &str) -> bool {
                match name {
                    $( $kname => true, )*
                    $( $rname => true, )*
                    $( $oname => self.$ofield.is_some(), )*
                    _ => false,
                }
            }

            fn attribute_to_xml(&self, name: &str, out: &mut String) -> $crate::errors::Result<()> {
                match name {
                    $( $kname => $crate::values::write_xml_element(out, $kname, &self.$kfield), )*
                    $( $rname => $crate::values::write_xml_element(out, $rname, &self.$rfield), )*
                    $( $oname => match &self.$ofield {
                        Some(v) => $crate::values::write_xml_element(out, $oname, v),
                        None => Ok(()),
                    }, )*
                    _ => $crate::tagfmt_err!("\"{}\" is not an attribute of the {} table", name, $table),
                }
            }

            fn set_from_text(&mut self, name: &str, text: &str) -> $crate::errors::Result<bool> {
                match name {
                    $( $kname => {
                        self.$kfield = <$kty as $crate::values::AsdmValue>::from_xml_text(text)?;
                    } )*
                    $( $rname => {
                        self.$rfield = <$rty as $crate::values::AsdmValue>::from_xml_text(text)?;
                    } )*
                    $( $oname => {
                        self.$ofield = Some(<$oty as $crate::values::AsdmValue>::from_xml_text(text)?);
                    } )*
                    _ => return Ok(false),
                }

                Ok(true)
            }

            fn attribute_to_bin<W: std::io::Write>(
                &self,
                name: &str,
                w: &mut rubbl_core::io::EndianWriter<W>,
            ) -> $crate::errors::Result<()> {
                match name {
                    $( $kname => $crate::values::AsdmValue::to_bin(&self.$kfield, w), )*
                    $( $rname => $crate::values::AsdmValue::to_bin(&self.$rfield, w), )*
                    $( $oname => {
                        w.write_bool(self.$ofield.is_some())?;

                        match &self.$ofield {
                            Some(v) => $crate::values::AsdmValue::to_bin(v, w),
                            None => Ok(()),
                        }
                    } )*
                    _ => $crate::tagfmt_err!("\"{}\" is not an attribute of the {} table", name, $table),
                }
            }

            fn attribute_from_bin<R: std::io::Read>(
                &mut self,
                name: &str,
                r: &mut rubbl_core::io::EndianReader<R>,
            ) -> $crate::errors::Result<bool> {
                match name {
                    $( $kname => {
                        self.$kfield = <$kty as $crate::values::AsdmValue>::from_bin(r)?;
                    } )*
                    $( $rname => {
                        self.$rfield = <$rty as $crate::values::AsdmValue>::from_bin(r)?;
                    } )*
                    $( $oname => {
                        self.$ofield = if r.read_bool()? {
                            Some(<$oty as $crate::values::AsdmValue>::from_bin(r)?)
                        } else {
                            None
                        };
                    } )*
                    _ => return Ok(false),
                }

                Ok(true)
            }

            $(
                fn dimension_warnings(&self) -> Vec<String> {
                    $dimcheck(self)
                }
            )?
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ReceiverBand;
    use crate::types::{Tag, TagType};
    use rubbl_core::io::ByteOrder;

    asdm_row! {
        /// A small table used to exercise the engine.
        pub struct SampleRow {
            table = "Sample";
            schema = "schemaVersion=\"1\"";
            key {
                name: String => "name", Scalar;
                id: Tag => "id", Scalar;
            }
            required {
                count: i32 => "count", Scalar;
                values: Vec<f64> => "values", Sequence;
            }
            optional {
                band: ReceiverBand => "band", Enum;
            }
        }
    }

    fn sample() -> SampleRow {
        SampleRow {
            name: "DV02".to_owned(),
            id: Tag::new(7, TagType::Antenna),
            count: 2,
            values: vec![0.5, 1.5],
            band: None,
        }
    }

    #[test]
    fn attribute_table() {
        let names: Vec<_> = SampleRow::attributes().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["name", "id", "count", "values", "band"]);
        assert_eq!(SampleRow::attributes()[1].presence, Presence::Key);
        assert_eq!(SampleRow::attributes()[4].kind, AttributeKind::Enum);
    }

    #[test]
    fn xml_row_form() {
        let row = sample();
        let xml = row.to_xml().unwrap();
        assert_eq!(
            xml,
            "<row> \n<name> DV02 </name> \n<id> Antenna_7 </id> \n<count> 2 </count> \n\
             <values> 1 2 0.5 1.5 </values> \n</row>\n"
        );

        let mut back = SampleRow::default();
        back.set_from_xml_str(&xml).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn missing_required_element_fails() {
        let mut row = SampleRow::default();
        let r = row.set_from_xml_str("<row><name>DV02</name><id>Antenna_7</id></row>");
        assert!(matches!(r, Err(AsdmError::TagFormat(_))));
    }

    #[test]
    fn null_key_tag_is_incomplete() {
        let mut row = sample();
        row.id = Tag::default();

        match row.to_xml() {
            Err(AsdmError::IncompleteRow { table, attribute }) => {
                assert_eq!(table, "Sample");
                assert_eq!(attribute, "id");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn optional_presence_flag() {
        let mut row = sample();
        row.band = Some(ReceiverBand::ALMA_RB_07);

        let mut w = EndianWriter::new(Vec::new(), ByteOrder::BigEndian);
        row.attribute_to_bin("band", &mut w).unwrap();
        assert_eq!(w.into_inner(), vec![1, 0, 0, 0, 6]);

        row.band = None;
        let mut w = EndianWriter::new(Vec::new(), ByteOrder::BigEndian);
        row.attribute_to_bin("band", &mut w).unwrap();
        assert_eq!(w.into_inner(), vec![0]);
    }

    #[test]
    fn binary_follows_supplied_order() {
        let row = sample();
        let order: Vec<String> = ["count", "values", "id", "name"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut w = EndianWriter::new(Vec::new(), ByteOrder::LittleEndian);
        for name in &order {
            row.attribute_to_bin(name, &mut w).unwrap();
        }
        let buf = w.into_inner();

        let mut r = EndianReader::new(&buf[..], ByteOrder::LittleEndian);
        let back = SampleRow::from_bin(&mut r, &order, |name, _| {
            tagfmt_err!("unexpected attribute {}", name)
        })
        .unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn required_value_comparisons() {
        let a = sample();
        let mut b = sample();
        b.name = "DV03".to_owned();
        assert!(a.equal_by_required_value(&b));
        assert!(a.compare_required_value(&2, &vec![0.5, 1.5]));

        b.count = 3;
        assert!(!a.equal_by_required_value(&b));
    }
}
