// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The two-part MIME container used for binary ASDM tables.

A binary table file is a `Multipart/Related` MIME message. The first part is
an XML header that records the byte order of the binary data and the
sequence of attribute names in which each row's fields are laid out; the
second part is the binary payload itself. This module knows how to frame the
two parts and how to pick them apart again. The payload contents are handled
by the table layer.

*/

use rubbl_core::io::ByteOrder;

use crate::errors::{AsdmError, Result};
use crate::xml::{decode_document, Element};

/// The boundary string separating the parts of the message.
pub const BOUNDARY: &str = "MIME_boundary";

/// The marker that immediately precedes the XML header.
pub const HEADER_MARKER: &[u8] = b"Content-ID: <header.xml>\n\n";

/// The same marker, as written by producers that use CRLF line endings.
pub const HEADER_MARKER_CRLF: &[u8] = b"Content-ID: <header.xml>\r\n\r\n";

/// The marker that immediately precedes the binary payload.
pub const BINARY_MARKER: &[u8] =
    b"--MIME_boundary\nContent-Type: binary/octet-stream\nContent-ID: <content.bin>\n\n";

/// The text that closes the message after the binary payload.
pub const CLOSING: &[u8] = b"\n--MIME_boundary--\n";

/// The root tag of binary headers written by old producers.
pub const LEGACY_ROOT: &str = "ASDMBinaryTable";

/// The schema version assumed for headers with the legacy root tag.
pub const LEGACY_VERSION: &str = "2";

/// Find the first occurrence of *needle* in *haystack* at or after *from*.
pub fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }

    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Generate the MIME envelope and the headers of the XML part.
///
/// The XML header document should be written directly after this text.
pub fn envelope(uid: &str) -> String {
    format!(
        "MIME-Version: 1.0\n\
         Content-Type: Multipart/Related; boundary='{b}'; type='text/xml'; start= '<header.xml>'\n\
         Content-Description: Correlator\n\
         alma-uid:{uid}\n\
         \n\
         --{b}\n\
         Content-Type: text/xml; charset='ISO-8859-1'\n\
         Content-Transfer-Encoding: 8bit\n\
         Content-ID: <header.xml>\n\
         \n",
        b = BOUNDARY,
        uid = uid
    )
}

/// The two parts of a MIME message.
#[derive(Clone, Debug)]
pub struct MimeParts<'a> {
    /// The XML header, decoded according to its declared encoding.
    pub xml_header: String,
    pub payload: &'a [u8],
}

/// Split a MIME message into its XML header and binary payload.
///
/// The payload runs to the end of the message, closing boundary included.
pub fn split<'a>(msg: &'a [u8], table: &str) -> Result<MimeParts<'a>> {
    let start = match find_bytes(msg, HEADER_MARKER, 0) {
        Some(i) => i + HEADER_MARKER.len(),
        None => match find_bytes(msg, HEADER_MARKER_CRLF, 0) {
            Some(i) => i + HEADER_MARKER_CRLF.len(),
            None => {
                return conversion_err!(table, "failed to detect the beginning of the XML header")
            }
        },
    };

    let end = match find_bytes(msg, BINARY_MARKER, start) {
        Some(i) => i,
        None => return conversion_err!(table, "failed to detect the beginning of the binary part"),
    };

    let xml_header = decode_document(&msg[start..end]).map_err(|e| AsdmError::Conversion {
        table: table.to_owned(),
        message: format!("XML header is not valid text: {}", e),
    })?;

    Ok(MimeParts {
        xml_header,
        payload: &msg[end + BINARY_MARKER.len()..],
    })
}

/// What the XML header says about the binary payload.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryHeader {
    pub byte_order: ByteOrder,
    pub attributes: Vec<String>,
    pub schema_version: Option<String>,
    pub legacy: bool,
}

/// Analyze the XML header of a binary table.
///
/// Headers with the legacy root tag carry no layout information: their
/// payloads are big-endian, use *default_attributes* as the field sequence,
/// and are reported as schema version 2. Otherwise the root must be
/// *root_name*, the third child must be a `BulkStoreRef` giving the byte
/// order, and the fourth an `Attributes` element whose children name the
/// fields of each row in order.
pub fn parse_header(
    xml: &str,
    table: &str,
    root_name: &str,
    default_attributes: &[&str],
) -> Result<BinaryHeader> {
    if xml.trim().is_empty() {
        return conversion_err!(table, "the XML header is empty");
    }

    let root = Element::parse(xml).map_err(|e| AsdmError::Conversion {
        table: table.to_owned(),
        message: format!("failed to parse the XML header: {}", e),
    })?;

    if root.name == LEGACY_ROOT {
        return Ok(BinaryHeader {
            byte_order: ByteOrder::BigEndian,
            attributes: default_attributes.iter().map(|s| (*s).to_owned()).collect(),
            schema_version: Some(LEGACY_VERSION.to_owned()),
            legacy: true,
        });
    }

    if root.name != root_name {
        return conversion_err!(
            table,
            "unexpected root element <{}> in XML header; expected <{}>",
            root.name,
            root_name
        );
    }

    let bulk = match root.children.get(2) {
        Some(e) if e.name == "BulkStoreRef" => e,
        _ => {
            return conversion_err!(
                table,
                "could not find the element '/{}/BulkStoreRef'",
                root_name
            )
        }
    };

    let order_text = match bulk.attribute("byteOrder") {
        Some(t) => t,
        None => {
            return conversion_err!(
                table,
                "could not find the attribute '/{}/BulkStoreRef/@byteOrder'",
                root_name
            )
        }
    };

    let byte_order: ByteOrder = order_text.parse().map_err(|_| AsdmError::Conversion {
        table: table.to_owned(),
        message: format!("no valid value retrieved for the byteOrder: \"{}\"", order_text),
    })?;

    let attributes = match root.children.get(3) {
        Some(e) if e.name == "Attributes" => e.children.iter().map(|c| c.name.clone()).collect(),
        _ => {
            return conversion_err!(
                table,
                "could not find the element '/{}/Attributes'",
                root_name
            )
        }
    };

    Ok(BinaryHeader {
        byte_order,
        attributes,
        schema_version: root.attribute("schemaVersion").map(|s| s.to_owned()),
        legacy: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "<?xml version='1.0'  encoding='ISO-8859-1'?>\n\
        <FooTable schemaVersion=\"3\">\n\
        <Entity entityId='uid://X0/X0/X0'/>\n\
        <ContainerEntity entityId='uid://X0/X0/X1'/>\n\
        <BulkStoreRef file_id='X0/X0/X0' byteOrder='Little_Endian' />\n\
        <Attributes>\n<b/>\n<a/>\n</Attributes>\n\
        </FooTable>\n";

    #[test]
    fn finds_bytes() {
        assert_eq!(find_bytes(b"abcabc", b"bc", 0), Some(1));
        assert_eq!(find_bytes(b"abcabc", b"bc", 2), Some(4));
        assert_eq!(find_bytes(b"abcabc", b"x", 0), None);
        assert_eq!(find_bytes(b"ab", b"b", 5), None);
    }

    #[test]
    fn splits_both_line_ending_styles() {
        let mut msg = envelope("uid://X0/X0/X0").into_bytes();
        msg.extend_from_slice(HEADER.as_bytes());
        msg.extend_from_slice(BINARY_MARKER);
        msg.extend_from_slice(&[1, 2, 3]);

        let parts = split(&msg, "Foo").unwrap();
        assert_eq!(parts.xml_header, HEADER);
        assert_eq!(parts.payload, &[1, 2, 3]);

        let mut msg = b"Content-ID: <header.xml>\r\n\r\n<x/>".to_vec();
        msg.extend_from_slice(BINARY_MARKER);
        assert_eq!(split(&msg, "Foo").unwrap().xml_header, "<x/>");
    }

    #[test]
    fn latin1_header_is_decoded() {
        let mut msg = HEADER_MARKER.to_vec();
        msg.extend_from_slice(b"<?xml version='1.0'  encoding='ISO-8859-1'?>\n<a b='\xe9'/>");
        msg.extend_from_slice(BINARY_MARKER);

        let parts = split(&msg, "Foo").unwrap();
        assert!(parts.xml_header.ends_with("<a b='\u{e9}'/>"));
    }

    #[test]
    fn missing_markers_name_the_table() {
        match split(b"nothing to see", "Foo") {
            Err(AsdmError::Conversion { table, .. }) => assert_eq!(table, "Foo"),
            other => panic!("unexpected result {:?}", other),
        }

        let msg = [HEADER_MARKER, &b"<x/>"[..]].concat();
        assert!(split(&msg, "Foo").is_err());
    }

    #[test]
    fn header_gives_order_and_sequence() {
        let h = parse_header(HEADER, "Foo", "FooTable", &["a", "b"]).unwrap();
        assert_eq!(h.byte_order, ByteOrder::LittleEndian);
        assert_eq!(h.attributes, vec!["b", "a"]);
        assert_eq!(h.schema_version.as_deref(), Some("3"));
        assert!(!h.legacy);
    }

    #[test]
    fn legacy_header() {
        let h = parse_header("<ASDMBinaryTable/>", "Foo", "FooTable", &["a", "b"]).unwrap();
        assert_eq!(h.byte_order, ByteOrder::BigEndian);
        assert_eq!(h.attributes, vec!["a", "b"]);
        assert_eq!(h.schema_version.as_deref(), Some("2"));
        assert!(h.legacy);
    }

    #[test]
    fn bad_headers() {
        let bad_order = HEADER.replace("Little_Endian", "Middle_Endian");
        assert!(parse_header(&bad_order, "Foo", "FooTable", &[]).is_err());

        let no_bulk = HEADER.replace("BulkStoreRef", "Other");
        assert!(parse_header(&no_bulk, "Foo", "FooTable", &[]).is_err());

        assert!(parse_header("  ", "Foo", "FooTable", &[]).is_err());
        assert!(parse_header("<Bar/>", "Foo", "FooTable", &[]).is_err());
    }
}
