// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The basic value types of the ASDM: tags, times, and physical quantities.

*/

use rubbl_core::io::{EndianReader, EndianWriter};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::errors::{AsdmError, Result};
use crate::values::AsdmScalar;

/// The kinds of table that a `Tag` can point into.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, EnumIter, EnumString, IntoStaticStr)]
pub enum TagType {
    /// The type of a null tag.
    #[default]
    NoType,
    Antenna,
    CalData,
    CalReduction,
    ConfigDescription,
    DataDescription,
    ExecBlock,
    Feed,
    Field,
    Polarization,
    Receiver,
    Scan,
    Source,
    SpectralWindow,
    Station,
}

/// A reference to a row of another table, made from a table type and an
/// integer.
///
/// The textual form is `<type>_<value>`, for instance `CalData_0`. The
/// default tag is the null tag, which does not point anywhere and cannot be
/// serialized.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Tag {
    tag_type: TagType,
    value: i32,
}

impl Tag {
    pub fn new(value: i32, tag_type: TagType) -> Self {
        Tag { tag_type, value }
    }

    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn is_null(&self) -> bool {
        self.tag_type == TagType::NoType
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let t: &'static str = self.tag_type.into();
        write!(f, "{}_{}", t, self.value)
    }
}

impl FromStr for Tag {
    type Err = AsdmError;

    fn from_str(s: &str) -> Result<Self> {
        let (type_text, value_text) = s
            .rsplit_once('_')
            .ok_or_else(|| AsdmError::TagFormat(format!("\"{}\" is not a valid tag", s)))?;

        let tag_type = TagType::from_str(type_text).map_err(|_| {
            AsdmError::TagFormat(format!("\"{}\" is not a known tag type", type_text))
        })?;

        if tag_type == TagType::NoType {
            return tagfmt_err!("null tags cannot be parsed from \"{}\"", s);
        }

        let value = value_text.parse().map_err(|_| {
            AsdmError::TagFormat(format!("\"{}\" is not a valid tag value", value_text))
        })?;

        Ok(Tag { tag_type, value })
    }
}

impl AsdmScalar for Tag {
    fn write_token(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }

    fn parse_token(token: &str) -> Result<Self> {
        token.parse()
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_string(&self.to_string())?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        r.read_string()?.parse()
    }
}

// Tags refuse to be written when null, so they get their own `AsdmValue`
// rather than the generic scalar implementation.
impl crate::values::AsdmValue for Tag {
    fn to_xml_text(&self) -> Result<String> {
        if self.is_null() {
            return tagfmt_err!("null tags cannot be serialized");
        }

        Ok(format!(" {} ", self))
    }

    fn from_xml_text(text: &str) -> Result<Self> {
        text.trim().parse()
    }

    fn to_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        if self.is_null() {
            return tagfmt_err!("null tags cannot be serialized");
        }

        self.write_bin(w)
    }

    fn from_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Self::read_bin(r)
    }
}

/// An instant in time, measured in nanoseconds.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ArrayTime(i64);

impl ArrayTime {
    pub fn new(nanoseconds: i64) -> Self {
        ArrayTime(nanoseconds)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ArrayTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsdmScalar for ArrayTime {
    fn write_token(&self, out: &mut String) {
        out.push_str(&self.0.to_string());
    }

    fn parse_token(token: &str) -> Result<Self> {
        Ok(ArrayTime(i64::parse_token(token)?))
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_i64(self.0)?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(ArrayTime(r.read_i64()?))
    }
}

impl_scalar_value!(ArrayTime);

macro_rules! quantity {
    ($(#[$meta:meta])* $name:ident, $unit:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
        pub struct $name(f64);

        impl $name {
            /// The unit in which values of this quantity are expressed.
            pub const UNIT: &'static str = $unit;

            pub fn new(value: f64) -> Self {
                $name(value)
            }

            pub fn get(&self) -> f64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{} {}", self.0, Self::UNIT)
            }
        }

        impl AsdmScalar for $name {
            fn write_token(&self, out: &mut String) {
                out.push_str(&self.0.to_string());
            }

            fn parse_token(token: &str) -> Result<Self> {
                Ok($name(f64::parse_token(token)?))
            }

            fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
                Ok(w.write_f64(self.0)?)
            }

            fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
                Ok($name(r.read_f64()?))
            }
        }

        impl_scalar_value!($name);
    };
}

quantity! {
    /// A frequency, in hertz.
    Frequency, "Hz"
}

quantity! {
    /// A temperature, in kelvins.
    Temperature, "K"
}

quantity! {
    /// A length, in meters.
    Length, "m"
}

quantity! {
    /// A pressure, in pascals.
    Pressure, "Pa"
}

quantity! {
    /// A relative humidity, in percent.
    Humidity, "%"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::AsdmValue;
    use rubbl_core::io::ByteOrder;

    #[test]
    fn tag_text_form() {
        let t = Tag::new(0, TagType::CalData);
        assert_eq!(t.to_string(), "CalData_0");
        assert_eq!("CalData_0".parse::<Tag>().unwrap(), t);
        assert_eq!(
            "CalReduction_12".parse::<Tag>().unwrap(),
            Tag::new(12, TagType::CalReduction)
        );
        assert!("CalData".parse::<Tag>().is_err());
        assert!("Bogus_1".parse::<Tag>().is_err());
        assert!("CalData_x".parse::<Tag>().is_err());
    }

    #[test]
    fn null_tags_do_not_serialize() {
        let t = Tag::default();
        assert!(t.is_null());
        assert!(t.to_xml_text().is_err());

        let mut w = EndianWriter::new(Vec::new(), ByteOrder::BigEndian);
        assert!(t.to_bin(&mut w).is_err());
    }

    #[test]
    fn tag_is_a_string_in_binary() {
        let mut w = EndianWriter::new(Vec::new(), ByteOrder::LittleEndian);
        Tag::new(3, TagType::Antenna).to_bin(&mut w).unwrap();
        let buf = w.into_inner();
        assert_eq!(&buf[..4], &[9, 0, 0, 0]);
        assert_eq!(&buf[4..], b"Antenna_3");
    }

    #[test]
    fn quantities() {
        let f = Frequency::new(1.5e11);
        assert_eq!(f.to_string(), "150000000000 Hz");
        assert_eq!(Frequency::from_xml_text(&f.to_xml_text().unwrap()).unwrap(), f);
        assert_eq!(
            ArrayTime::from_xml_text(" 4862355000000000000 ").unwrap(),
            ArrayTime::new(4_862_355_000_000_000_000)
        );
    }
}
