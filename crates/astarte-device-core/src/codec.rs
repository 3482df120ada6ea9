//! Binary document codec (C2): a hand-rolled, length-prefixed, BSON-subset
//! wire format with a fixed set of element types, decoded schema-directed
//! against a `MappingType`.
//!
//! This workspace never reaches for a general-purpose document-encoding
//! crate for its wire formats — `astarte-device-net::framing` hand-rolls
//! its length-prefixed frame codec the same way.

use crate::error::{Error, Result};
use crate::value::{MappingType, TypedValue};

/// Ceiling on a document's declared size. A length-prefixed wire format
/// with no upper bound is a DoS vector on a constrained device; mirrors
/// the order of magnitude `astarte-device-net::framing::FrameCodec`
/// already enforces for its own length prefix.
pub const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

const TYPE_DOUBLE: u8 = 0x01;
const TYPE_STRING: u8 = 0x02;
const TYPE_DOCUMENT: u8 = 0x03;
const TYPE_ARRAY: u8 = 0x04;
const TYPE_BINARY: u8 = 0x05;
const TYPE_BOOL: u8 = 0x08;
const TYPE_DATETIME: u8 = 0x09;
const TYPE_INT32: u8 = 0x10;
const TYPE_INT64: u8 = 0x12;

const BINARY_SUBTYPE_GENERIC: u8 = 0x00;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ElementType {
    Double,
    String,
    Document,
    Array,
    Binary,
    Bool,
    DateTime,
    Int32,
    Int64,
}

impl ElementType {
    fn code(self) -> u8 {
        match self {
            ElementType::Double => TYPE_DOUBLE,
            ElementType::String => TYPE_STRING,
            ElementType::Document => TYPE_DOCUMENT,
            ElementType::Array => TYPE_ARRAY,
            ElementType::Binary => TYPE_BINARY,
            ElementType::Bool => TYPE_BOOL,
            ElementType::DateTime => TYPE_DATETIME,
            ElementType::Int32 => TYPE_INT32,
            ElementType::Int64 => TYPE_INT64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ElementType::Double => "double",
            ElementType::String => "string",
            ElementType::Document => "document",
            ElementType::Array => "array",
            ElementType::Binary => "binary",
            ElementType::Bool => "boolean",
            ElementType::DateTime => "datetime",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
        }
    }

    fn try_from_code(code: u8) -> Result<Self> {
        Ok(match code {
            TYPE_DOUBLE => ElementType::Double,
            TYPE_STRING => ElementType::String,
            TYPE_DOCUMENT => ElementType::Document,
            TYPE_ARRAY => ElementType::Array,
            TYPE_BINARY => ElementType::Binary,
            TYPE_BOOL => ElementType::Bool,
            TYPE_DATETIME => ElementType::DateTime,
            TYPE_INT32 => ElementType::Int32,
            TYPE_INT64 => ElementType::Int64,
            other => {
                return Err(Error::CodecMalformed(format!(
                    "unknown element type code {other:#04x}"
                )))
            }
        })
    }
}

// ---------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------

/// Incrementally builds one binary document.
pub struct DocumentBuilder {
    buf: Vec<u8>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        DocumentBuilder {
            buf: vec![0, 0, 0, 0],
        }
    }

    /// Append one key/value pair, dispatching on the value's own tag.
    pub fn append(&mut self, key: &str, value: &TypedValue) {
        match value {
            TypedValue::Bool(b) => self.append_scalar(key, ElementType::Bool, &[*b as u8]),
            TypedValue::DateTime(t) => {
                self.append_scalar(key, ElementType::DateTime, &t.to_le_bytes())
            }
            TypedValue::Double(d) => self.append_scalar(key, ElementType::Double, &d.to_le_bytes()),
            TypedValue::Int32(i) => self.append_scalar(key, ElementType::Int32, &i.to_le_bytes()),
            TypedValue::Int64(i) => self.append_scalar(key, ElementType::Int64, &i.to_le_bytes()),
            TypedValue::String(s) => self.append_string(key, s),
            TypedValue::Binary(b) => self.append_binary(key, b),
            TypedValue::BoolArray(items) => {
                self.append_array(key, items, |b, k, v| {
                    b.append_scalar(k, ElementType::Bool, &[*v as u8])
                });
            }
            TypedValue::DateTimeArray(items) => {
                self.append_array(key, items, |b, k, v| {
                    b.append_scalar(k, ElementType::DateTime, &v.to_le_bytes())
                });
            }
            TypedValue::DoubleArray(items) => {
                self.append_array(key, items, |b, k, v| {
                    b.append_scalar(k, ElementType::Double, &v.to_le_bytes())
                });
            }
            TypedValue::Int32Array(items) => {
                self.append_array(key, items, |b, k, v| {
                    b.append_scalar(k, ElementType::Int32, &v.to_le_bytes())
                });
            }
            TypedValue::Int64Array(items) => {
                self.append_array(key, items, |b, k, v| {
                    b.append_scalar(k, ElementType::Int64, &v.to_le_bytes())
                });
            }
            TypedValue::StringArray(items) => {
                self.append_array(key, items, |b, k, v| b.append_string(k, v));
            }
            TypedValue::BinaryArray(items) => {
                self.append_array(key, items, |b, k, v| b.append_binary(k, v));
            }
        }
    }

    /// Append an explicit datetime field (used for the `"t"` timestamp key).
    pub fn append_timestamp(&mut self, key: &str, millis: i64) {
        self.append_scalar(key, ElementType::DateTime, &millis.to_le_bytes());
    }

    fn append_scalar(&mut self, key: &str, etype: ElementType, value: &[u8]) {
        self.buf.push(etype.code());
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
        self.buf.extend_from_slice(value);
    }

    fn append_string(&mut self, key: &str, s: &str) {
        let mut payload = s.as_bytes().to_vec();
        payload.push(0);
        self.buf.push(ElementType::String.code());
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
        self.buf
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(&payload);
    }

    fn append_binary(&mut self, key: &str, data: &[u8]) {
        self.buf.push(ElementType::Binary.code());
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
        self.buf
            .extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.buf.push(BINARY_SUBTYPE_GENERIC);
        self.buf.extend_from_slice(data);
    }

    fn append_raw_document(&mut self, key: &str, doc_bytes: &[u8]) {
        self.buf.push(ElementType::Document.code());
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
        self.buf.extend_from_slice(doc_bytes);
    }

    fn append_array<T>(&mut self, key: &str, items: &[T], mut elem: impl FnMut(&mut DocumentBuilder, &str, &T)) {
        let mut inner = DocumentBuilder::new();
        for (i, item) in items.iter().enumerate() {
            elem(&mut inner, &i.to_string(), item);
        }
        let inner_bytes = inner.finish();
        self.buf.push(ElementType::Array.code());
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
        self.buf.extend_from_slice(&inner_bytes);
    }

    /// Write the terminator and back-patch the total length prefix.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(0);
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_le_bytes());
        self.buf
    }
}

/// Build the `{ v: <value>, [t: <datetime>] }` wire payload every data
/// message on the bus carries.
pub fn encode_message(value: &TypedValue, timestamp: Option<i64>) -> Vec<u8> {
    let mut doc = DocumentBuilder::new();
    doc.append("v", value);
    if let Some(t) = timestamp {
        doc.append_timestamp("t", t);
    }
    doc.finish()
}

/// Build the `{ v: { path1: val1, ... }, [t: <datetime>] }` wire payload
/// an object-aggregation publish carries. Entry paths are flattened to
/// their trailing segment, matching how the server keys a BSON object by
/// the mapping's endpoint name rather than its full interface path.
pub fn encode_object_message(entries: &[crate::value::ObjectEntry], timestamp: Option<i64>) -> Vec<u8> {
    let mut inner = DocumentBuilder::new();
    for entry in entries {
        let key = entry.path.trim_start_matches('/');
        inner.append(key, &entry.value);
    }
    let inner_bytes = inner.finish();

    let mut doc = DocumentBuilder::new();
    doc.append_raw_document("v", &inner_bytes);
    if let Some(t) = timestamp {
        doc.append_timestamp("t", t);
    }
    doc.finish()
}

// ---------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------

#[derive(Debug)]
struct RawElement<'a> {
    key: String,
    etype: ElementType,
    payload: &'a [u8],
}

#[derive(Debug)]
struct ParsedDocument<'a> {
    elements: Vec<RawElement<'a>>,
    /// Total size in bytes, as declared by the 4-byte length prefix.
    total_len: usize,
}

fn read_cstring(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos] != 0 {
        *pos += 1;
    }
    if *pos >= bytes.len() {
        return Err(Error::CodecMalformed("unterminated key".into()));
    }
    let key = String::from_utf8_lossy(&bytes[start..*pos]).into_owned();
    *pos += 1; // skip NUL
    Ok(key)
}

fn element_value_len(etype: ElementType, bytes: &[u8], pos: usize, max_bytes: usize) -> Result<usize> {
    let remaining = bytes.len().saturating_sub(pos);
    let need = |n: usize| -> Result<usize> {
        if remaining < n {
            Err(Error::CodecMalformed("truncated element".into()))
        } else {
            Ok(n)
        }
    };
    match etype {
        ElementType::Double | ElementType::DateTime | ElementType::Int64 => need(8),
        ElementType::Int32 => need(4),
        ElementType::Bool => need(1),
        ElementType::String => {
            need(4)?;
            let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            need(4 + len)
        }
        ElementType::Binary => {
            need(4)?;
            let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            need(4 + 1 + len)
        }
        ElementType::Document | ElementType::Array => {
            need(4)?;
            let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            if len > max_bytes {
                return Err(Error::CodecMalformed("nested document too large".into()));
            }
            need(len)
        }
    }
}

/// Parses one document, rejecting anything whose declared length exceeds
/// `max_bytes`. Callers pick `max_bytes`; `MAX_DOCUMENT_BYTES` is the
/// absolute ceiling no caller-supplied limit may exceed (enforced by
/// `decode_message`/`decode_object_message`, not here).
fn parse_document(bytes: &[u8], max_bytes: usize) -> Result<ParsedDocument<'_>> {
    if bytes.len() < 5 {
        return Err(Error::CodecMalformed("document shorter than header".into()));
    }
    let total_len = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    if total_len > max_bytes {
        return Err(Error::CodecMalformed("document exceeds size ceiling".into()));
    }
    if total_len > bytes.len() {
        return Err(Error::CodecMalformed("document length exceeds buffer".into()));
    }

    let mut pos = 4usize;
    let mut elements = Vec::new();
    while pos < total_len - 1 {
        let type_byte = bytes[pos];
        pos += 1;
        let etype = ElementType::try_from_code(type_byte)?;
        let key = read_cstring(bytes, &mut pos)?;
        let value_len = element_value_len(etype, bytes, pos, max_bytes)?;
        let payload = &bytes[pos..pos + value_len];
        pos += value_len;
        elements.push(RawElement { key, etype, payload });
    }

    if bytes.get(total_len - 1) != Some(&0) {
        return Err(Error::CodecMalformed("missing document terminator".into()));
    }

    Ok(ParsedDocument { elements, total_len })
}

fn decode_scalar(expected: MappingType, elem: &RawElement<'_>) -> Result<TypedValue> {
    let type_err = || Error::CodecTypeMismatch {
        expected: expected.to_string(),
        found: elem.etype.name().to_string(),
    };
    match expected {
        MappingType::Bool => match elem.etype {
            ElementType::Bool => Ok(TypedValue::Bool(elem.payload[0] != 0)),
            _ => Err(type_err()),
        },
        MappingType::DateTime => match elem.etype {
            ElementType::DateTime => Ok(TypedValue::DateTime(read_i64(elem.payload))),
            _ => Err(type_err()),
        },
        MappingType::Double => match elem.etype {
            ElementType::Double => Ok(TypedValue::Double(read_f64(elem.payload))),
            _ => Err(type_err()),
        },
        MappingType::Int32 => match elem.etype {
            ElementType::Int32 => Ok(TypedValue::Int32(read_i32(elem.payload))),
            _ => Err(type_err()),
        },
        // Int64 accepts an encoded Int32 and widens (§4.2 compatibility exception).
        MappingType::Int64 => match elem.etype {
            ElementType::Int64 => Ok(TypedValue::Int64(read_i64(elem.payload))),
            ElementType::Int32 => Ok(TypedValue::Int64(read_i32(elem.payload) as i64)),
            _ => Err(type_err()),
        },
        MappingType::String => match elem.etype {
            ElementType::String => Ok(TypedValue::String(read_cstr_payload(elem.payload)?)),
            _ => Err(type_err()),
        },
        MappingType::Binary => match elem.etype {
            ElementType::Binary => Ok(TypedValue::Binary(elem.payload[5..].to_vec())),
            _ => Err(type_err()),
        },
        other => Err(Error::Internal(format!(
            "decode_scalar called with array type {other}"
        ))),
    }
}

fn read_i32(b: &[u8]) -> i32 {
    i32::from_le_bytes(b[0..4].try_into().unwrap())
}
fn read_i64(b: &[u8]) -> i64 {
    i64::from_le_bytes(b[0..8].try_into().unwrap())
}
fn read_f64(b: &[u8]) -> f64 {
    f64::from_le_bytes(b[0..8].try_into().unwrap())
}
fn read_cstr_payload(b: &[u8]) -> Result<String> {
    // b is the full value span: [len: u32][content bytes incl. trailing NUL].
    if b.len() < 4 {
        return Err(Error::CodecMalformed("truncated string".into()));
    }
    let len = u32::from_le_bytes(b[0..4].try_into().unwrap()) as usize;
    let content = &b[4..];
    if content.len() != len || len == 0 {
        return Err(Error::CodecMalformed("string length mismatch".into()));
    }
    let without_nul = &content[..len - 1];
    String::from_utf8(without_nul.to_vec())
        .map_err(|_| Error::CodecMalformed("string is not valid utf-8".into()))
}

/// Decode one element (scalar or array) against the given schema mapping type.
fn decode_element(expected: MappingType, elem: &RawElement<'_>, max_bytes: usize) -> Result<TypedValue> {
    if !expected.is_array() {
        return decode_scalar(expected, elem);
    }
    if elem.etype != ElementType::Array && elem.etype != ElementType::Document {
        return Err(Error::CodecTypeMismatch {
            expected: expected.to_string(),
            found: elem.etype.name().to_string(),
        });
    }
    let inner = parse_document(elem.payload, max_bytes)?;
    let item_type = array_item_type(expected);

    // Two-pass: count first (already known), allocate once, then populate.
    let count = inner.elements.len();
    match expected {
        MappingType::BoolArray => {
            let mut out = Vec::with_capacity(count);
            for e in &inner.elements {
                out.push(match decode_scalar(item_type, e)? {
                    TypedValue::Bool(v) => v,
                    _ => unreachable!(),
                });
            }
            Ok(TypedValue::BoolArray(out))
        }
        MappingType::DateTimeArray => {
            let mut out = Vec::with_capacity(count);
            for e in &inner.elements {
                out.push(match decode_scalar(item_type, e)? {
                    TypedValue::DateTime(v) => v,
                    _ => unreachable!(),
                });
            }
            Ok(TypedValue::DateTimeArray(out))
        }
        MappingType::DoubleArray => {
            let mut out = Vec::with_capacity(count);
            for e in &inner.elements {
                out.push(match decode_scalar(item_type, e)? {
                    TypedValue::Double(v) => v,
                    _ => unreachable!(),
                });
            }
            Ok(TypedValue::DoubleArray(out))
        }
        MappingType::Int32Array => {
            let mut out = Vec::with_capacity(count);
            for e in &inner.elements {
                out.push(match decode_scalar(item_type, e)? {
                    TypedValue::Int32(v) => v,
                    _ => unreachable!(),
                });
            }
            Ok(TypedValue::Int32Array(out))
        }
        // Per-element Int32->Int64 widening is explicitly allowed inside the
        // array too (see SPEC_FULL.md open question: kept explicit, not guessed away).
        MappingType::Int64Array => {
            let mut out = Vec::with_capacity(count);
            for e in &inner.elements {
                out.push(match decode_scalar(item_type, e)? {
                    TypedValue::Int64(v) => v,
                    _ => unreachable!(),
                });
            }
            Ok(TypedValue::Int64Array(out))
        }
        MappingType::StringArray => {
            let mut out = Vec::with_capacity(count);
            for e in &inner.elements {
                out.push(match decode_scalar(item_type, e)? {
                    TypedValue::String(v) => v,
                    _ => unreachable!(),
                });
            }
            Ok(TypedValue::StringArray(out))
        }
        MappingType::BinaryArray => {
            let mut out = Vec::with_capacity(count);
            for e in &inner.elements {
                out.push(match decode_scalar(item_type, e)? {
                    TypedValue::Binary(v) => v,
                    _ => unreachable!(),
                });
            }
            Ok(TypedValue::BinaryArray(out))
        }
        _ => unreachable!("non-array mapping type handled above"),
    }
}

fn array_item_type(array_type: MappingType) -> MappingType {
    match array_type {
        MappingType::BoolArray => MappingType::Bool,
        MappingType::DateTimeArray => MappingType::DateTime,
        MappingType::DoubleArray => MappingType::Double,
        MappingType::Int32Array => MappingType::Int32,
        MappingType::Int64Array => MappingType::Int64,
        MappingType::StringArray => MappingType::String,
        MappingType::BinaryArray => MappingType::Binary,
        other => other,
    }
}

/// Decode a `{ v: <value>, [t: <datetime>] }` wire payload against the
/// mapping's declared type. `max_bytes` bounds the document (and any nested
/// array/document element inside it); callers thread a per-device config
/// value through here rather than relying on a single global ceiling.
pub fn decode_message(
    expected: MappingType,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<(TypedValue, Option<i64>)> {
    let max_bytes = max_bytes.min(MAX_DOCUMENT_BYTES);
    let doc = parse_document(bytes, max_bytes)?;
    let v_elem = doc
        .elements
        .iter()
        .find(|e| e.key == "v")
        .ok_or_else(|| Error::CodecMalformed("missing \"v\" element".into()))?;
    let value = decode_element(expected, v_elem, max_bytes)?;

    let timestamp = doc
        .elements
        .iter()
        .find(|e| e.key == "t")
        .map(|e| match e.etype {
            ElementType::DateTime => Ok(read_i64(e.payload)),
            _ => Err(Error::CodecTypeMismatch {
                expected: "datetime".into(),
                found: e.etype.name().to_string(),
            }),
        })
        .transpose()?;

    Ok((value, timestamp))
}

/// Decode a `{ v: { ... }, [t: <datetime>] }` object-aggregation payload.
/// `mapping_type_of` resolves each entry's key (the mapping's trailing
/// path segment) to the type it should be decoded against; an unknown key
/// is a malformed-document error rather than a silent skip.
pub fn decode_object_message(
    bytes: &[u8],
    mapping_type_of: impl Fn(&str) -> Option<MappingType>,
    max_bytes: usize,
) -> Result<(Vec<crate::value::ObjectEntry>, Option<i64>)> {
    let max_bytes = max_bytes.min(MAX_DOCUMENT_BYTES);
    let doc = parse_document(bytes, max_bytes)?;
    let v_elem = doc
        .elements
        .iter()
        .find(|e| e.key == "v")
        .ok_or_else(|| Error::CodecMalformed("missing \"v\" element".into()))?;
    if v_elem.etype != ElementType::Document {
        return Err(Error::CodecTypeMismatch {
            expected: "document".into(),
            found: v_elem.etype.name().to_string(),
        });
    }
    let inner = parse_document(v_elem.payload, max_bytes)?;

    let mut out = Vec::with_capacity(inner.elements.len());
    for e in &inner.elements {
        let expected = mapping_type_of(&e.key)
            .ok_or_else(|| Error::CodecMalformed(format!("unknown object key \"{}\"", e.key)))?;
        let value = decode_element(expected, e, max_bytes)?;
        out.push(crate::value::ObjectEntry::new(format!("/{}", e.key), value));
    }

    let timestamp = doc
        .elements
        .iter()
        .find(|e| e.key == "t")
        .map(|e| match e.etype {
            ElementType::DateTime => Ok(read_i64(e.payload)),
            _ => Err(Error::CodecTypeMismatch {
                expected: "datetime".into(),
                found: e.etype.name().to_string(),
            }),
        })
        .transpose()?;

    Ok((out, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(expected: MappingType, value: TypedValue) -> TypedValue {
        let bytes = encode_message(&value, None);
        let (decoded, _) = decode_message(expected, &bytes, MAX_DOCUMENT_BYTES).unwrap();
        decoded
    }

    #[test]
    fn scalar_round_trip() {
        assert_eq!(roundtrip(MappingType::Bool, TypedValue::from_bool(true)), TypedValue::from_bool(true));
        assert_eq!(
            roundtrip(MappingType::Double, TypedValue::from_double(21.5)),
            TypedValue::from_double(21.5)
        );
        assert_eq!(
            roundtrip(MappingType::String, TypedValue::from_string("hello")),
            TypedValue::from_string("hello")
        );
        assert_eq!(
            roundtrip(MappingType::Binary, TypedValue::from_binary(vec![1, 2, 3])),
            TypedValue::from_binary(vec![1, 2, 3])
        );
        assert_eq!(
            roundtrip(MappingType::Int64, TypedValue::from_int64(-42)),
            TypedValue::from_int64(-42)
        );
    }

    #[test]
    fn empty_array_round_trip() {
        let v = TypedValue::from_string_array(vec![]);
        let decoded = roundtrip(MappingType::StringArray, v);
        assert_eq!(decoded, TypedValue::from_string_array(vec![]));
    }

    #[test]
    fn string_array_round_trip() {
        let v = TypedValue::from_string_array(vec!["a".into(), "b".into(), "c".into()]);
        let decoded = roundtrip(MappingType::StringArray, v.clone());
        assert_eq!(decoded, v);
    }

    #[test]
    fn int32_widens_to_int64() {
        let bytes = encode_message(&TypedValue::from_int32(7), None);
        let (decoded, _) = decode_message(MappingType::Int64, &bytes, MAX_DOCUMENT_BYTES).unwrap();
        assert_eq!(decoded, TypedValue::from_int64(7));
    }

    #[test]
    fn int64_does_not_narrow_to_int32() {
        let bytes = encode_message(&TypedValue::from_int64(7), None);
        let err = decode_message(MappingType::Int32, &bytes, MAX_DOCUMENT_BYTES).unwrap_err();
        assert!(matches!(err, Error::CodecTypeMismatch { .. }));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let bytes = encode_message(&TypedValue::from_string("nope"), None);
        let err = decode_message(MappingType::Int32, &bytes, MAX_DOCUMENT_BYTES).unwrap_err();
        assert!(matches!(err, Error::CodecTypeMismatch { .. }));
    }

    #[test]
    fn timestamp_round_trips_alongside_value() {
        let bytes = encode_message(&TypedValue::from_double(21.5), Some(1_700_000_000_000));
        let (value, ts) = decode_message(MappingType::Double, &bytes, MAX_DOCUMENT_BYTES).unwrap();
        assert_eq!(value, TypedValue::from_double(21.5));
        assert_eq!(ts, Some(1_700_000_000_000));
    }

    #[test]
    fn truncated_document_is_malformed() {
        let mut bytes = encode_message(&TypedValue::from_bool(true), None);
        bytes.truncate(bytes.len() - 2);
        let err = decode_message(MappingType::Bool, &bytes, MAX_DOCUMENT_BYTES).unwrap_err();
        assert!(matches!(err, Error::CodecMalformed(_)));
    }

    #[test]
    fn oversized_document_is_rejected() {
        let mut bytes = vec![0u8; 8];
        bytes[0..4].copy_from_slice(&((MAX_DOCUMENT_BYTES + 1) as u32).to_le_bytes());
        let err = parse_document(&bytes, MAX_DOCUMENT_BYTES).unwrap_err();
        assert!(matches!(err, Error::CodecMalformed(_)));
    }

    #[test]
    fn object_round_trip() {
        use crate::value::ObjectEntry;
        let entries = vec![
            ObjectEntry::new("/latitude", TypedValue::from_double(45.0)),
            ObjectEntry::new("/longitude", TypedValue::from_double(9.0)),
        ];
        let bytes = encode_object_message(&entries, Some(1_700_000_000_000));
        let (decoded, ts) = decode_object_message(&bytes, |key| match key {
            "latitude" | "longitude" => Some(MappingType::Double),
            _ => None,
        }, MAX_DOCUMENT_BYTES)
        .unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(ts, Some(1_700_000_000_000));
        assert!(crate::value::objects_equal(&entries, &decoded));
    }

    #[test]
    fn object_with_unknown_key_is_malformed() {
        use crate::value::ObjectEntry;
        let entries = vec![ObjectEntry::new("/latitude", TypedValue::from_double(45.0))];
        let bytes = encode_object_message(&entries, None);
        let err = decode_object_message(&bytes, |_| None, MAX_DOCUMENT_BYTES).unwrap_err();
        assert!(matches!(err, Error::CodecMalformed(_)));
    }
}
