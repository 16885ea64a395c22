//! The BCF binary codec: a framed streaming reader and a two-pass record
//! writer over the BCF 2.1/2.2 on-disk layout.

mod reader;
mod writer;

pub use reader::BcfRecords;
pub use writer::BcfWriter;

use std::borrow::Cow;

use crate::types::{
    Sentinels, Text, TypeKind, Value, ValueKind, MISSING_CHAR, MISSING_INT32,
};

pub(crate) const BCF_MAJOR_VERSION: u8 = 2;
pub(crate) const BCF_MINOR_VERSION: u8 = 2;

/// Whether an on-disk descriptor kind is acceptable for a declared header
/// category. Integer widths are free on disk (writers may widen above or
/// compress below the declared width); everything else must match the
/// family. Kind 0 (missing) is always acceptable.
pub(crate) fn descriptor_matches(disk: TypeKind, declared: ValueKind) -> bool {
    if disk == TypeKind::Missing {
        return true;
    }
    match declared {
        ValueKind::Flag => disk.is_int(),
        ValueKind::Float32 | ValueKind::VecFloat32 => disk == TypeKind::Float32,
        ValueKind::Char8 | ValueKind::String | ValueKind::VecString => disk == TypeKind::String,
        _ => disk.is_int(),
    }
}

fn split_text<'a>(text: Text<'a>, sep: u8) -> Vec<Text<'a>> {
    match text {
        Cow::Borrowed(bytes) => bytes.split(|&b| b == sep).map(Cow::Borrowed).collect(),
        Cow::Owned(bytes) => bytes
            .split(|&b| b == sep)
            .map(|s| Cow::Owned(s.to_vec()))
            .collect(),
    }
}

fn trim_string(text: Text) -> Text {
    // strings are padded with the char end-of-vector byte 0x00
    let end = text
        .iter()
        .rposition(|&b| !b.is_end_of_vector())
        .map_or(0, |p| p + 1);
    let text = match text {
        Cow::Borrowed(bytes) => Cow::Borrowed(&bytes[..end]),
        Cow::Owned(mut bytes) => {
            bytes.truncate(end);
            Cow::Owned(bytes)
        }
    };
    if text.as_ref() == b"\x07" || text.as_ref() == b"." {
        return Cow::Borrowed(&[]);
    }
    text
}

/// Reshape a raw decoded payload (integers widened to `VecInt32`,
/// `VecFloat32`, or a `String` view) into the header-declared category.
/// End-of-vector padding is trimmed; a vector consisting of one missing
/// value decodes as the absent vector.
pub(crate) fn reshape_value<'a>(value: Value<'a>, declared: ValueKind) -> Value<'a> {
    if declared == ValueKind::Flag {
        return Value::Flag;
    }
    match value {
        Value::VecInt32(mut v) => {
            let end = v
                .iter()
                .rposition(|x| !x.is_end_of_vector())
                .map_or(0, |p| p + 1);
            v.truncate(end);
            match declared {
                ValueKind::Int8 | ValueKind::Int16 | ValueKind::Int32 => {
                    Value::Int32(v.first().copied().unwrap_or(MISSING_INT32))
                }
                ValueKind::VecInt8 | ValueKind::VecInt16 | ValueKind::VecInt32 => {
                    if v.len() == 1 && v[0] == MISSING_INT32 {
                        Value::VecInt32(vec![])
                    } else {
                        Value::VecInt32(v)
                    }
                }
                // descriptor disagrees with the header; keep the on-disk shape
                _ => Value::VecInt32(v),
            }
        }
        Value::VecFloat32(mut v) => {
            let end = v
                .iter()
                .rposition(|x| !x.is_end_of_vector())
                .map_or(0, |p| p + 1);
            v.truncate(end);
            match declared {
                ValueKind::Float32 => {
                    Value::Float32(v.first().copied().unwrap_or(f32::MISSING))
                }
                ValueKind::VecFloat32 => {
                    if v.len() == 1 && v[0].is_missing() {
                        Value::VecFloat32(vec![])
                    } else {
                        Value::VecFloat32(v)
                    }
                }
                _ => Value::VecFloat32(v),
            }
        }
        Value::String(text) => {
            let text = trim_string(text);
            match declared {
                ValueKind::Char8 => {
                    Value::Char(text.first().copied().unwrap_or(MISSING_CHAR))
                }
                ValueKind::VecString => {
                    if text.is_empty() {
                        Value::VecString(vec![])
                    } else {
                        Value::VecString(split_text(text, b','))
                    }
                }
                _ => Value::String(text),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{END_OF_VECTOR_FLOAT_BITS, END_OF_VECTOR_INT32};

    #[test]
    fn descriptor_families() {
        assert!(descriptor_matches(TypeKind::Int8, ValueKind::Int32));
        assert!(descriptor_matches(TypeKind::Int32, ValueKind::Int8));
        assert!(descriptor_matches(TypeKind::Missing, ValueKind::Float32));
        assert!(descriptor_matches(TypeKind::Int8, ValueKind::Flag));
        assert!(!descriptor_matches(TypeKind::Int8, ValueKind::Float32));
        assert!(!descriptor_matches(TypeKind::String, ValueKind::VecInt32));
        assert!(descriptor_matches(TypeKind::String, ValueKind::VecString));
    }

    #[test]
    fn reshape_scalar_int() {
        let v = reshape_value(Value::VecInt32(vec![3]), ValueKind::Int32);
        assert_eq!(v, Value::Int32(3));
        let v = reshape_value(Value::VecInt32(vec![]), ValueKind::Int32);
        assert_eq!(v, Value::Int32(MISSING_INT32));
    }

    #[test]
    fn reshape_trims_end_of_vector() {
        let v = reshape_value(
            Value::VecInt32(vec![1, 2, END_OF_VECTOR_INT32, END_OF_VECTOR_INT32]),
            ValueKind::VecInt32,
        );
        assert_eq!(v, Value::VecInt32(vec![1, 2]));

        let v = reshape_value(
            Value::VecFloat32(vec![0.5, f32::from_bits(END_OF_VECTOR_FLOAT_BITS)]),
            ValueKind::VecFloat32,
        );
        assert_eq!(v, Value::VecFloat32(vec![0.5]));
    }

    #[test]
    fn reshape_absent_vector() {
        let v = reshape_value(Value::VecInt32(vec![MISSING_INT32]), ValueKind::VecInt32);
        assert_eq!(v, Value::VecInt32(vec![]));
    }

    #[test]
    fn reshape_strings() {
        let v = reshape_value(
            Value::String(Cow::Borrowed(b"a,bb\x00\x00")),
            ValueKind::VecString,
        );
        assert_eq!(
            v,
            Value::VecString(vec![Cow::Borrowed(b"a".as_ref()), Cow::Borrowed(b"bb")])
        );
        let v = reshape_value(Value::String(Cow::Borrowed(b"\x07")), ValueKind::String);
        assert_eq!(v, Value::String(Cow::Borrowed(b"".as_ref())));
        let v = reshape_value(Value::String(Cow::Borrowed(b"x")), ValueKind::Char8);
        assert_eq!(v, Value::Char(b'x'));
    }

    #[test]
    fn reshape_flag() {
        assert_eq!(
            reshape_value(Value::VecInt32(vec![0]), ValueKind::Flag),
            Value::Flag
        );
        assert_eq!(
            reshape_value(Value::VecInt32(vec![]), ValueKind::Flag),
            Value::Flag
        );
    }
}
