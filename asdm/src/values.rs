// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Textual and binary codecs for the values stored in ASDM table columns.

Every column type knows how to write itself as the text content of an XML
element, how to parse that text back, and how to write and read itself in a
binary stream. Scalars implement `AsdmScalar`, which describes a single
whitespace-free token and a fixed binary form; `AsdmValue` is then
implemented for the scalars themselves and for one-, two-, and
three-dimensional arrays of them.

The XML form of an array is its dimensionality, then its dimensions, then its
elements in row-major order, all separated by spaces: a 2×3 array of integers
is written ` 2 2 3 1 2 3 4 5 6 `. In binary, arrays are their dimensions as
32-bit integers followed by the elements.

*/

use ndarray::{Array2, Array3, Dimension, Ix2, Ix3};
use rubbl_core::io::{EndianReader, EndianWriter};
use rubbl_core::num::{array_from_shape_vec, DimFromShapeSlice};
use std::io::{Read, Write};

use crate::errors::{AsdmError, Result};

/// A single-token column value.
pub trait AsdmScalar: Sized + Clone {
    /// Append the textual form of this value to *out*.
    fn write_token(&self, out: &mut String);

    /// Parse a single token.
    fn parse_token(token: &str) -> Result<Self>;

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()>;

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self>;
}

/// A value that can be stored in an ASDM table column.
pub trait AsdmValue: Sized {
    /// Get the text that goes between the opening and closing tags of this
    /// value's XML element, including the surrounding spaces.
    fn to_xml_text(&self) -> Result<String>;

    /// Parse the text content of this value's XML element.
    fn from_xml_text(text: &str) -> Result<Self>;

    fn to_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()>;

    fn from_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self>;
}

/// Write a complete XML element holding *value*, in the layout used inside
/// `<row>` elements.
pub fn write_xml_element<T: AsdmValue>(out: &mut String, name: &str, value: &T) -> Result<()> {
    let text = value.to_xml_text()?;
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&text);
    out.push_str("</");
    out.push_str(name);
    out.push_str("> ");
    Ok(())
}

/// Implement `AsdmValue` for a scalar type in terms of its `AsdmScalar`
/// implementation.
#[macro_export]
macro_rules! impl_scalar_value {
    ($($ty:ty),*) => {
        $(
            impl $crate::values::AsdmValue for $ty {
                fn to_xml_text(&self) -> $crate::errors::Result<String> {
                    let mut s = String::from(" ");
                    $crate::values::AsdmScalar::write_token(self, &mut s);
                    s.push(' ');
                    Ok(s)
                }

                fn from_xml_text(text: &str) -> $crate::errors::Result<Self> {
                    <$ty as $crate::values::AsdmScalar>::parse_token(text.trim())
                }

                fn to_bin<W: std::io::Write>(
                    &self,
                    w: &mut rubbl_core::io::EndianWriter<W>,
                ) -> $crate::errors::Result<()> {
                    $crate::values::AsdmScalar::write_bin(self, w)
                }

                fn from_bin<R: std::io::Read>(
                    r: &mut rubbl_core::io::EndianReader<R>,
                ) -> $crate::errors::Result<Self> {
                    <$ty as $crate::values::AsdmScalar>::read_bin(r)
                }
            }
        )*
    }
}

fn parse_number<T: std::str::FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| AsdmError::TagFormat(format!("cannot parse \"{}\" as {}", token, what)))
}

impl AsdmScalar for bool {
    fn write_token(&self, out: &mut String) {
        out.push_str(if *self { "true" } else { "false" });
    }

    fn parse_token(token: &str) -> Result<Self> {
        match token {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => tagfmt_err!("cannot parse \"{}\" as a boolean", token),
        }
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_bool(*self)?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(r.read_bool()?)
    }
}

impl AsdmScalar for i32 {
    fn write_token(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }

    fn parse_token(token: &str) -> Result<Self> {
        parse_number(token, "a 32-bit integer")
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_i32(*self)?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(r.read_i32()?)
    }
}

impl AsdmScalar for i64 {
    fn write_token(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }

    fn parse_token(token: &str) -> Result<Self> {
        parse_number(token, "a 64-bit integer")
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_i64(*self)?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(r.read_i64()?)
    }
}

impl AsdmScalar for f32 {
    fn write_token(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }

    fn parse_token(token: &str) -> Result<Self> {
        parse_number(token, "a single-precision number")
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_f32(*self)?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(r.read_f32()?)
    }
}

impl AsdmScalar for f64 {
    fn write_token(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }

    fn parse_token(token: &str) -> Result<Self> {
        parse_number(token, "a double-precision number")
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_f64(*self)?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(r.read_f64()?)
    }
}

// Strings are only ever scalars, so their "token" is the whole trimmed
// element text, spaces included.
impl AsdmScalar for String {
    fn write_token(&self, out: &mut String) {
        out.push_str(&quick_xml::escape::escape(self.as_str()));
    }

    fn parse_token(token: &str) -> Result<Self> {
        Ok(token.to_owned())
    }

    fn write_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        Ok(w.write_string(self)?)
    }

    fn read_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(r.read_string()?)
    }
}

impl_scalar_value!(bool, i32, i64, f32, f64, String);

/// A cursor over the whitespace-separated tokens of an element's text.
struct Tokens<'a> {
    iter: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Tokens {
            iter: text.split_whitespace(),
        }
    }

    fn next(&mut self) -> Result<&'a str> {
        self.iter
            .next()
            .ok_or_else(|| AsdmError::TagFormat("array text ended prematurely".to_owned()))
    }

    fn next_len(&mut self) -> Result<usize> {
        let tok = self.next()?;
        parse_number(tok, "an array dimension")
    }

    /// Read the dimensionality and the dimensions of an array.
    fn header(&mut self, ndim: usize) -> Result<Vec<usize>> {
        let found = self.next_len()?;

        if found != ndim {
            return tagfmt_err!(
                "expected a {}-dimensional array but the text describes {} dimensions",
                ndim,
                found
            );
        }

        (0..ndim).map(|_| self.next_len()).collect()
    }

    fn values<T: AsdmScalar>(&mut self, n: usize) -> Result<Vec<T>> {
        (0..n).map(|_| T::parse_token(self.next()?)).collect()
    }

    fn finish(mut self) -> Result<()> {
        match self.iter.next() {
            None => Ok(()),
            Some(t) => tagfmt_err!("unexpected trailing text \"{}\" after array values", t),
        }
    }
}

fn n_elements(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |acc, &d| {
        acc.checked_mul(d)
            .ok_or_else(|| AsdmError::TagFormat(format!("array shape {:?} is too large", shape)))
    })
}

fn write_array_text<'a, T, I>(shape: &[usize], elems: I) -> String
where
    T: AsdmScalar + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut s = format!(" {}", shape.len());

    for d in shape {
        s.push(' ');
        s.push_str(&d.to_string());
    }

    for e in elems {
        s.push(' ');
        e.write_token(&mut s);
    }

    s.push(' ');
    s
}

fn parse_array_text<T: AsdmScalar>(text: &str, ndim: usize) -> Result<(Vec<usize>, Vec<T>)> {
    let mut toks = Tokens::new(text);
    let shape = toks.header(ndim)?;
    let values = toks.values(n_elements(&shape)?)?;
    toks.finish()?;
    Ok((shape, values))
}

fn write_array_bin<'a, T, I, W>(shape: &[usize], elems: I, w: &mut EndianWriter<W>) -> Result<()>
where
    T: AsdmScalar + 'a,
    I: Iterator<Item = &'a T>,
    W: Write,
{
    for &d in shape {
        w.write_len(d)?;
    }

    for e in elems {
        e.write_bin(w)?;
    }

    Ok(())
}

fn read_array_bin<T: AsdmScalar, R: Read>(
    r: &mut EndianReader<R>,
    ndim: usize,
) -> Result<(Vec<usize>, Vec<T>)> {
    let mut shape = Vec::with_capacity(ndim);

    for _ in 0..ndim {
        shape.push(r.read_len()?);
    }

    let n = n_elements(&shape)?;
    let mut values = Vec::with_capacity(n.min(65536));

    for _ in 0..n {
        values.push(T::read_bin(r)?);
    }

    Ok((shape, values))
}

fn to_array<T, D>(shape: &[usize], values: Vec<T>) -> Result<ndarray::Array<T, D>>
where
    D: Dimension + DimFromShapeSlice<usize>,
{
    Ok(array_from_shape_vec(shape, values)?)
}

impl<T: AsdmScalar> AsdmValue for Vec<T> {
    fn to_xml_text(&self) -> Result<String> {
        Ok(write_array_text(&[self.len()], self.iter()))
    }

    fn from_xml_text(text: &str) -> Result<Self> {
        Ok(parse_array_text(text, 1)?.1)
    }

    fn to_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        write_array_bin(&[self.len()], self.iter(), w)
    }

    fn from_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        Ok(read_array_bin(r, 1)?.1)
    }
}

impl<T: AsdmScalar> AsdmValue for Array2<T> {
    fn to_xml_text(&self) -> Result<String> {
        Ok(write_array_text(self.shape(), self.iter()))
    }

    fn from_xml_text(text: &str) -> Result<Self> {
        let (shape, values) = parse_array_text(text, 2)?;
        to_array::<T, Ix2>(&shape, values)
    }

    fn to_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        write_array_bin(self.shape(), self.iter(), w)
    }

    fn from_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        let (shape, values) = read_array_bin(r, 2)?;
        to_array::<T, Ix2>(&shape, values)
    }
}

impl<T: AsdmScalar> AsdmValue for Array3<T> {
    fn to_xml_text(&self) -> Result<String> {
        Ok(write_array_text(self.shape(), self.iter()))
    }

    fn from_xml_text(text: &str) -> Result<Self> {
        let (shape, values) = parse_array_text(text, 3)?;
        to_array::<T, Ix3>(&shape, values)
    }

    fn to_bin<W: Write>(&self, w: &mut EndianWriter<W>) -> Result<()> {
        write_array_bin(self.shape(), self.iter(), w)
    }

    fn from_bin<R: Read>(r: &mut EndianReader<R>) -> Result<Self> {
        let (shape, values) = read_array_bin(r, 3)?;
        to_array::<T, Ix3>(&shape, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rubbl_core::io::ByteOrder;

    #[test]
    fn scalar_text() {
        assert_eq!(4i32.to_xml_text().unwrap(), " 4 ");
        assert_eq!(i32::from_xml_text(" 4 ").unwrap(), 4);
        assert!(i32::from_xml_text("four").is_err());
        assert_eq!(String::from_xml_text("  DV01 ").unwrap(), "DV01");
        assert_eq!(
            "a<b".to_owned().to_xml_text().unwrap(),
            " a&lt;b ".to_owned()
        );
    }

    #[test]
    fn array_text_layout() {
        let v = vec![1.5f64, 2.5];
        assert_eq!(v.to_xml_text().unwrap(), " 1 2 1.5 2.5 ");

        let a = array![[1i32, 2, 3], [4, 5, 6]];
        let text = a.to_xml_text().unwrap();
        assert_eq!(text, " 2 2 3 1 2 3 4 5 6 ");
        assert_eq!(Array2::<i32>::from_xml_text(&text).unwrap(), a);
    }

    #[test]
    fn array_text_errors() {
        assert!(Vec::<i32>::from_xml_text(" 1 3 1 2 ").is_err());
        assert!(Vec::<i32>::from_xml_text(" 1 1 1 2 ").is_err());
        assert!(Array2::<i32>::from_xml_text(" 1 1 1 ").is_err());
        assert_eq!(Vec::<i32>::from_xml_text(" 1 0 ").unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn array_binary_layout() {
        let a = array![[[1.0f32], [2.0]]];
        let mut w = EndianWriter::new(Vec::new(), ByteOrder::BigEndian);
        a.to_bin(&mut w).unwrap();
        let buf = w.into_inner();
        assert_eq!(&buf[..12], &[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 1]);
        assert_eq!(buf.len(), 12 + 8);

        let mut r = EndianReader::new(&buf[..], ByteOrder::BigEndian);
        assert_eq!(Array3::<f32>::from_bin(&mut r).unwrap(), a);
    }

    #[test]
    fn truncated_binary_array_fails() {
        let mut w = EndianWriter::new(Vec::new(), ByteOrder::LittleEndian);
        w.write_i32(3).unwrap();
        w.write_f64(1.0).unwrap();
        let buf = w.into_inner();

        let mut r = EndianReader::new(&buf[..], ByteOrder::LittleEndian);
        assert!(Vec::<f64>::from_bin(&mut r).is_err());
    }
}
