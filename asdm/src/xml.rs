// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
A minimal XML element tree.

ASDM documents are small and regular: a root element, a few children
carrying attributes, and leaf elements whose text holds column values. This
module reads a document into a tree of `Element`s with `quick_xml`, trimming
whitespace around text and unescaping entities.

Documents are exchanged as bytes in the encoding named by their XML
declaration. ASDM producers declare ISO-8859-1; `decode_document` and
`encode_latin1` convert between such bytes and Rust strings.

*/

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::{AsdmError, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Parse a complete document and return its root element.
    pub fn parse(doc: &str) -> Result<Element> {
        let mut reader = Reader::from_str(doc);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Element::from_start(&e)?),

                Event::Empty(e) => {
                    let elem = Element::from_start(&e)?;
                    attach(&mut stack, &mut root, elem)?;
                }

                Event::End(_) => {
                    let elem = stack.pop().ok_or_else(|| {
                        AsdmError::TagFormat("unbalanced closing tag in XML document".to_owned())
                    })?;
                    attach(&mut stack, &mut root, elem)?;
                }

                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        if !top.text.is_empty() {
                            top.text.push(' ');
                        }

                        top.text.push_str(&t.unescape()?);
                    }
                }

                Event::Eof => break,

                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return tagfmt_err!("XML document ended inside <{}>", open.name);
        }

        root.ok_or_else(|| AsdmError::TagFormat("XML document has no root element".to_owned()))
    }

    fn from_start(e: &BytesStart) -> Result<Element> {
        let name = std::str::from_utf8(e.name().as_ref())?.to_owned();
        let mut attributes = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(Element {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Get the value of an attribute of this element.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get the first child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Iterate over the child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, elem: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
    } else if root.is_none() {
        *root = Some(elem);
    } else {
        return tagfmt_err!("XML document has more than one root element");
    }

    Ok(())
}

/// Get the encoding named in a document's XML declaration, if it has one.
fn declared_encoding(doc: &[u8]) -> Option<&str> {
    let start = doc.iter().position(|b| !b.is_ascii_whitespace())?;
    let decl = &doc[start..];

    if !decl.starts_with(b"<?xml") {
        return None;
    }

    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&decl[..end]).ok()?;
    let rest = decl[decl.find("encoding")? + 8..].trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &rest[1..];
    Some(&rest[..rest.find(quote)?])
}

/// Decode the bytes of an XML document according to its declared encoding.
///
/// ISO-8859-1 and UTF-8 are supported. Documents without a declaration are
/// UTF-8.
pub fn decode_document(doc: &[u8]) -> Result<String> {
    match declared_encoding(doc).map(|e| e.to_ascii_uppercase()) {
        Some(e) if e == "ISO-8859-1" || e == "ISO8859-1" || e == "LATIN1" || e == "LATIN-1" => {
            Ok(doc.iter().map(|&b| char::from(b)).collect())
        }

        None => Ok(std::str::from_utf8(doc)?.to_owned()),
        Some(e) if e == "UTF-8" || e == "UTF8" => Ok(std::str::from_utf8(doc)?.to_owned()),
        Some(e) => tagfmt_err!("unsupported XML document encoding \"{}\"", e),
    }
}

/// Encode XML text as ISO-8859-1.
///
/// Characters outside that charset become numeric character references.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());

    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => out.push(b),
            Err(_) => out.extend_from_slice(format!("&#x{:X};", u32::from(c)).as_bytes()),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tree() {
        let doc = "<?xml version='1.0'  encoding='ISO-8859-1'?>\n\
                   <Top a=\"1\" b='x &amp; y'>\n\
                   <Entity entityId='uid://X1/X2/X3'/>\n\
                   <row> <name> DV01 </name> <n> 1 2 3 4 </n> </row>\n\
                   <row/>\n\
                   </Top>\n";
        let root = Element::parse(doc).unwrap();

        assert_eq!(root.name, "Top");
        assert_eq!(root.attribute("a"), Some("1"));
        assert_eq!(root.attribute("b"), Some("x & y"));
        assert_eq!(root.children.len(), 3);
        assert_eq!(
            root.child("Entity").unwrap().attribute("entityId"),
            Some("uid://X1/X2/X3")
        );

        let rows: Vec<_> = root.children_named("row").collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].child("name").unwrap().text, "DV01");
        assert_eq!(rows[0].child("n").unwrap().text, "1 2 3 4");
        assert!(rows[1].children.is_empty());
    }

    #[test]
    fn latin1_documents() {
        let doc = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<a>Pi\xe9</a>\n";
        let text = decode_document(doc).unwrap();
        assert_eq!(Element::parse(&text).unwrap().text, "Pi\u{e9}");
        assert_eq!(encode_latin1(&text), doc.to_vec());

        assert_eq!(encode_latin1("\u{3b1}b"), b"&#x3B1;b".to_vec());
        let back = Element::parse(&decode_document(b"<a>&#x3B1;b</a>").unwrap()).unwrap();
        assert_eq!(back.text, "\u{3b1}b");
    }

    #[test]
    fn utf8_and_unknown_encodings() {
        assert_eq!(decode_document("<a>\u{e9}</a>".as_bytes()).unwrap(), "<a>\u{e9}</a>");
        assert_eq!(
            decode_document(b"<?xml version='1.0' encoding='utf-8'?><a/>").unwrap(),
            "<?xml version='1.0' encoding='utf-8'?><a/>"
        );
        assert!(decode_document(b"<a>\xe9</a>").is_err());
        assert!(decode_document(b"<?xml version='1.0' encoding='EBCDIC'?><a/>").is_err());
    }

    #[test]
    fn rejects_broken_documents() {
        assert!(Element::parse("").is_err());
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("<a>").is_err());
    }
}
