// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Enumerated column types.

Each enumeration is a closed set of values with a canonical name (used in
XML), an integer id (its position in the declaration, used in binary
streams), and a human-readable description. The mapping is fixed at compile
time.

*/

use std::str::FromStr;
use strum::{EnumMessage, IntoEnumIterator};
use strum_macros::{EnumIter, EnumMessage, EnumString, IntoStaticStr};

use crate::errors::{AsdmError, Result};

/// The lookup interface shared by all ASDM enumerations.
pub trait AsdmEnum: Sized + Copy + PartialEq + 'static {
    /// The name of the enumeration type, used in error messages.
    const TYPE_NAME: &'static str;

    /// Get the canonical name of this value.
    fn name(&self) -> &'static str;

    /// Get the integer id of this value.
    fn id(&self) -> i32;

    /// Get the description of this value.
    fn description(&self) -> &'static str;

    /// Get all the values of this enumeration, in id order.
    fn all() -> Vec<Self>;

    /// Look up a value by its canonical name.
    fn from_name(name: &str) -> Result<Self>;

    /// Look up a value by its integer id.
    fn from_id(id: i32) -> Result<Self> {
        if id >= 0 {
            if let Some(v) = Self::all().into_iter().nth(id as usize) {
                return Ok(v);
            }
        }

        tagfmt_err!("{} is not a valid {} id", id, Self::TYPE_NAME)
    }
}

macro_rules! impl_asdm_enum {
    ($ty:ident) => {
        impl AsdmEnum for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn name(&self) -> &'static str {
                self.into()
            }

            fn id(&self) -> i32 {
                *self as i32
            }

            fn description(&self) -> &'static str {
                self.get_message().unwrap_or("")
            }

            fn all() -> Vec<Self> {
                Self::iter().collect()
            }

            fn from_name(name: &str) -> Result<Self> {
                Self::from_str(name).map_err(|_| {
                    AsdmError::TagFormat(format!(
                        "\"{}\" is not a valid {} name",
                        name,
                        Self::TYPE_NAME
                    ))
                })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl $crate::values::AsdmScalar for $ty {
            fn write_token(&self, out: &mut String) {
                out.push_str(self.name());
            }

            fn parse_token(token: &str) -> Result<Self> {
                Self::from_name(token)
            }

            fn write_bin<W: std::io::Write>(
                &self,
                w: &mut rubbl_core::io::EndianWriter<W>,
            ) -> Result<()> {
                Ok(w.write_i32(self.id())?)
            }

            fn read_bin<R: std::io::Read>(r: &mut rubbl_core::io::EndianReader<R>) -> Result<Self> {
                Self::from_id(r.read_i32()?)
            }
        }

        impl_scalar_value!($ty);
    };
}

/// Receiver bands.
#[allow(non_camel_case_types)]
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, EnumIter, EnumMessage, EnumString, IntoStaticStr,
)]
#[repr(i32)]
pub enum ReceiverBand {
    #[strum(message = "ALMA Receiver band 1")]
    ALMA_RB_01,
    #[strum(message = "ALMA Receiver band 2")]
    ALMA_RB_02,
    #[strum(message = "ALMA Receiver band 3")]
    ALMA_RB_03,
    #[strum(message = "ALMA Receiver band 4")]
    ALMA_RB_04,
    #[strum(message = "ALMA Receiver band 5")]
    ALMA_RB_05,
    #[strum(message = "ALMA Receiver band 6")]
    ALMA_RB_06,
    #[strum(message = "ALMA Receiver band 7")]
    ALMA_RB_07,
    #[strum(message = "ALMA Receiver band 8")]
    ALMA_RB_08,
    #[strum(message = "ALMA Receiver band 9")]
    ALMA_RB_09,
    #[strum(message = "ALMA Receiver band 10")]
    ALMA_RB_10,
    #[strum(message = "ALMA holography receiver")]
    ALMA_HOLOGRAPHY_RECEIVER,
    #[strum(message = "Plateau de Bure receiver band 1")]
    BURE_01,
    #[strum(message = "Plateau de Bure receiver band 2")]
    BURE_02,
    #[strum(message = "Plateau de Bure receiver band 3")]
    BURE_03,
    #[strum(message = "Plateau de Bure receiver band 4")]
    BURE_04,
    #[default]
    #[strum(message = "Receiver band of unspecified origin")]
    UNSPECIFIED,
}

impl_asdm_enum!(ReceiverBand);

/// Baseband names.
#[allow(non_camel_case_types)]
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, EnumIter, EnumMessage, EnumString, IntoStaticStr,
)]
#[repr(i32)]
pub enum BasebandName {
    #[default]
    #[strum(message = "Baseband not applicable")]
    NOBB,
    #[strum(message = "Baseband one")]
    BB_1,
    #[strum(message = "Baseband two")]
    BB_2,
    #[strum(message = "Baseband three")]
    BB_3,
    #[strum(message = "Baseband four")]
    BB_4,
    #[strum(message = "Baseband five (not ALMA)")]
    BB_5,
    #[strum(message = "Baseband six (not ALMA)")]
    BB_6,
    #[strum(message = "Baseband seven (not ALMA)")]
    BB_7,
    #[strum(message = "Baseband eight (not ALMA)")]
    BB_8,
    #[strum(message = "All ALMA basebands (i.e. all available basebands)")]
    BB_ALL,
}

impl_asdm_enum!(BasebandName);

/// Polarization types of receptors.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, EnumIter, EnumMessage, EnumString, IntoStaticStr,
)]
#[repr(i32)]
pub enum PolarizationType {
    #[strum(message = "Right-handed circular polarization")]
    R,
    #[strum(message = "Left-handed circular polarization")]
    L,
    #[default]
    #[strum(message = "Linear polarization, X")]
    X,
    #[strum(message = "Linear polarization, Y")]
    Y,
    #[strum(message = "Sensitive to both polarizations")]
    BOTH,
}

impl_asdm_enum!(PolarizationType);

/// Methods used to calibrate the system temperature.
#[allow(non_camel_case_types)]
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, EnumIter, EnumMessage, EnumString, IntoStaticStr,
)]
#[repr(i32)]
pub enum SyscalMethod {
    #[default]
    #[strum(message = "Use single direction data to compute ta* scale")]
    TEMPERATURE_SCALE,
    #[strum(message = "Use a skydip (observing the sky at various elevations) to get atmospheric opacity")]
    SKYDIP,
    #[strum(message = "Measure the sideband gain ratio")]
    SIDEBAND_RATIO,
}

impl_asdm_enum!(SyscalMethod);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::AsdmValue;
    use rubbl_core::io::{ByteOrder, EndianReader, EndianWriter};

    #[test]
    fn names_ids_descriptions() {
        assert_eq!(ReceiverBand::ALMA_RB_03.name(), "ALMA_RB_03");
        assert_eq!(ReceiverBand::ALMA_RB_03.id(), 2);
        assert_eq!(ReceiverBand::from_id(2).unwrap(), ReceiverBand::ALMA_RB_03);
        assert_eq!(
            BasebandName::from_name("BB_1").unwrap(),
            BasebandName::BB_1
        );
        assert_eq!(SyscalMethod::SIDEBAND_RATIO.description(), "Measure the sideband gain ratio");
        assert_eq!(PolarizationType::all().len(), 5);
    }

    #[test]
    fn unknown_values_are_format_errors() {
        assert!(matches!(
            BasebandName::from_name("BB_9"),
            Err(AsdmError::TagFormat(_))
        ));
        assert!(SyscalMethod::from_id(3).is_err());
        assert!(SyscalMethod::from_id(-1).is_err());
    }

    #[test]
    fn enum_columns() {
        let pols = vec![PolarizationType::X, PolarizationType::Y];
        assert_eq!(pols.to_xml_text().unwrap(), " 1 2 X Y ");
        assert_eq!(Vec::<PolarizationType>::from_xml_text(" 1 2 X Y ").unwrap(), pols);
        assert_eq!(BasebandName::BB_1.to_xml_text().unwrap(), " BB_1 ");

        let mut w = EndianWriter::new(Vec::new(), ByteOrder::BigEndian);
        ReceiverBand::ALMA_RB_03.to_bin(&mut w).unwrap();
        let buf = w.into_inner();
        assert_eq!(buf, vec![0, 0, 0, 2]);

        let mut r = EndianReader::new(&buf[..], ByteOrder::BigEndian);
        assert_eq!(ReceiverBand::from_bin(&mut r).unwrap(), ReceiverBand::ALMA_RB_03);
    }
}
