use std::borrow::Cow;
use std::convert::TryFrom;

use nom::branch::alt;
use nom::bytes::complete::{escaped, is_not, tag, take};
use nom::character::complete::{char, digit1, none_of, one_of};
use nom::combinator::{map, recognize};
use nom::error::{make_error, ErrorKind};
use nom::multi::{many_m_n, separated_list0};
use nom::number::complete::{le_f32, le_i16, le_i32, le_i8, le_u16, le_u24, le_u32, le_u8};
use nom::sequence::{delimited, separated_pair, tuple};
use nom::IResult;

use crate::header::InfoNumber;
use crate::types::{widen_i16, widen_i8, Sentinels, TypeDescriptor, TypeKind, Value};

/// The major/minor version pair following the BCF magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

fn fail<T>(input: &[u8]) -> IResult<&[u8], T> {
    Err(nom::Err::Error(make_error(input, ErrorKind::Verify)))
}

pub(crate) fn bcf_version(input: &[u8]) -> IResult<&[u8], Version> {
    let (input, _bcf) = tag(b"BCF")(input)?;
    let (input, major) = le_u8(input)?;
    let (input, minor) = le_u8(input)?;
    Ok((input, Version { major, minor }))
}

pub(crate) fn header_length(input: &[u8]) -> IResult<&[u8], u32> {
    le_u32(input)
}

fn read_uint(kind: TypeKind, input: &[u8]) -> IResult<&[u8], usize> {
    match kind {
        TypeKind::Int8 => map(le_u8, |v| v as usize)(input),
        TypeKind::Int16 => map(le_u16, |v| v as usize)(input),
        TypeKind::Int32 => map(le_u32, |v| v as usize)(input),
        _ => fail(input),
    }
}

/// One type-descriptor byte: kind in the low nibble, count in the high
/// nibble; count 15 means the real count follows as a typed integer.
pub(crate) fn type_descriptor(input: &[u8]) -> IResult<&[u8], TypeDescriptor> {
    let (input, type_descriptor_byte) = le_u8(input)?;
    let kind = match TypeKind::try_from(type_descriptor_byte & 0b1111) {
        Ok(kind) => kind,
        Err(_) => return fail(input),
    };
    let num_elements = (type_descriptor_byte >> 4) & 0b1111;
    let (input, num_elements) = if num_elements == 15 {
        let (input, count_td) = type_descriptor(input)?;
        if count_td.num_elements != 1 {
            return fail(input);
        }
        read_uint(count_td.kind, input)?
    } else {
        (input, num_elements as usize)
    };
    Ok((input, TypeDescriptor { kind, num_elements }))
}

/// A typed string field; descriptor kind 0, a count of 0 and the literal
/// "." all decode to the empty string.
pub(crate) fn typed_string(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, TypeDescriptor { kind, num_elements }) = type_descriptor(input)?;
    match kind {
        TypeKind::Missing => Ok((input, &[][..])),
        TypeKind::String => {
            let (input, string) = take(num_elements)(input)?;
            if string == b"." {
                Ok((input, &[][..]))
            } else {
                Ok((input, string))
            }
        }
        _ => fail(input),
    }
}

/// A single typed integer (used for IDX references and long counts).
pub(crate) fn typed_int(input: &[u8]) -> IResult<&[u8], i32> {
    let (input, TypeDescriptor { kind, num_elements }) = type_descriptor(input)?;
    if num_elements != 1 {
        return fail(input);
    }
    match kind {
        TypeKind::Int8 => map(le_i8, widen_i8)(input),
        TypeKind::Int16 => map(le_i16, widen_i16)(input),
        TypeKind::Int32 => le_i32(input),
        _ => fail(input),
    }
}

/// A typed integer vector, widened to `i32` (used for FILTER).
pub(crate) fn typed_ints(input: &[u8]) -> IResult<&[u8], Vec<i32>> {
    let (input, TypeDescriptor { kind, num_elements }) = type_descriptor(input)?;
    match kind {
        TypeKind::Missing => Ok((input, vec![])),
        TypeKind::Int8 => many_m_n(num_elements, num_elements, map(le_i8, widen_i8))(input),
        TypeKind::Int16 => many_m_n(num_elements, num_elements, map(le_i16, widen_i16))(input),
        TypeKind::Int32 => many_m_n(num_elements, num_elements, le_i32)(input),
        _ => fail(input),
    }
}

/// Decode one typed payload for an already-read descriptor. Integers are
/// widened to `i32`; strings stay views into `input`.
pub(crate) fn typed_value_from_td<'a>(
    td: &TypeDescriptor,
    input: &'a [u8],
) -> IResult<&'a [u8], Value<'a>> {
    let num_elements = td.num_elements;
    match td.kind {
        TypeKind::Missing => Ok((input, Value::VecInt32(vec![]))),
        TypeKind::Int8 => map(
            many_m_n(num_elements, num_elements, map(le_i8, widen_i8)),
            Value::VecInt32,
        )(input),
        TypeKind::Int16 => map(
            many_m_n(num_elements, num_elements, map(le_i16, widen_i16)),
            Value::VecInt32,
        )(input),
        TypeKind::Int32 => map(
            many_m_n(num_elements, num_elements, le_i32),
            Value::VecInt32,
        )(input),
        TypeKind::Float32 => map(
            many_m_n(num_elements, num_elements, le_f32),
            Value::VecFloat32,
        )(input),
        TypeKind::String => {
            if input.len() < num_elements {
                return Err(nom::Err::Error(make_error(input, ErrorKind::Eof)));
            }
            let (string, input) = input.split_at(num_elements);
            Ok((input, Value::String(Cow::Borrowed(string))))
        }
    }
}

pub(crate) fn typed_value(input: &[u8]) -> IResult<&[u8], Value> {
    let (input, td) = type_descriptor(input)?;
    typed_value_from_td(&td, input)
}

/// One INFO entry: the typed IDX reference, the payload descriptor and
/// the decoded payload. The descriptor is kept so callers can verify it
/// against the header schema.
pub(crate) fn info_entry(input: &[u8]) -> IResult<&[u8], (i32, TypeDescriptor, Value)> {
    let (input, key_idx) = typed_int(input)?;
    let (input, td) = type_descriptor(input)?;
    let (input, value) = typed_value_from_td(&td, input)?;
    Ok((input, (key_idx, td, value)))
}

/// The typed IDX reference and payload descriptor of one genotype field.
/// The per-sample payloads follow and are decoded by the caller, which
/// knows `n_sample` and whether the field is GT.
pub(crate) fn format_entry_header(input: &[u8]) -> IResult<&[u8], (i32, TypeDescriptor)> {
    let (input, key_idx) = typed_int(input)?;
    let (input, td) = type_descriptor(input)?;
    Ok((input, (key_idx, td)))
}

/// The per-sample payload descriptor applied `n_sample` times.
pub(crate) fn sample_values<'a>(
    td: &TypeDescriptor,
    n_sample: usize,
    input: &'a [u8],
) -> IResult<&'a [u8], Vec<Value<'a>>> {
    let mut input = input;
    let mut values = Vec::with_capacity(n_sample);
    for _ in 0..n_sample {
        let (rest, value) = typed_value_from_td(td, input)?;
        input = rest;
        values.push(value);
    }
    Ok((input, values))
}

pub(crate) fn record_length(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    tuple((le_u32, le_u32))(input)
}

/// The 24-byte fixed-width record core (little-endian on the wire).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RecordCore {
    pub chrom: i32,
    pub pos: i32,
    pub rlen: i32,
    pub qual: f32,
    pub n_info: u16,
    pub n_allele: u16,
    pub n_sample: u32,
    pub n_fmt: u8,
}

pub(crate) const RECORD_CORE_LENGTH: usize = 24;

pub(crate) fn record_core(input: &[u8]) -> IResult<&[u8], RecordCore> {
    let (input, (chrom, pos, rlen, qual, n_info, n_allele, n_sample, n_fmt)) = tuple((
        le_i32, le_i32, le_i32, le_f32, le_u16, le_u16, le_u24, le_u8,
    ))(input)?;
    Ok((
        input,
        RecordCore {
            chrom,
            pos,
            rlen,
            qual,
            n_info,
            n_allele,
            n_sample,
            n_fmt,
        },
    ))
}

/// Render one sample's decoded GT integers as the canonical text form
/// ("0|1", "./0", "2/2/2"). The low bit of every element selects the
/// separator in front of it (ignored for the first); the remaining bits
/// are allele index + 1, with 0 meaning missing.
pub(crate) fn gt_text(alleles: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(alleles.len() * 2);
    for (i, &g) in alleles.iter().enumerate() {
        if g.is_end_of_vector() {
            break;
        }
        if i > 0 {
            out.push(if g & 1 == 1 { b'|' } else { b'/' });
        }
        let allele = if g.is_missing() { 0 } else { g >> 1 };
        if allele == 0 {
            out.push(b'.');
        } else {
            out.extend_from_slice((allele - 1).to_string().as_bytes());
        }
    }
    out
}

/// `Number=` value of an INFO/FORMAT header line: an integer literal or
/// one of `A`, `R`, `G`, `.`.
pub(crate) fn info_number(input: &str) -> IResult<&str, InfoNumber> {
    alt((
        map(digit1, |d: &str| {
            InfoNumber::Count(d.parse().unwrap_or(usize::MAX))
        }),
        map(char('A'), |_| InfoNumber::AlternateAlleles),
        map(char('R'), |_| InfoNumber::Alleles),
        map(char('G'), |_| InfoNumber::Genotypes),
        map(char('.'), |_| InfoNumber::Unknown),
    ))(input)
}

fn quoted_string(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('"'),
        alt((escaped(none_of("\\\""), '\\', one_of("\\\"")), tag(""))),
        char('"'),
    ))(input)
}

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        is_not("<,=\n"),
        char('='),
        alt((quoted_string, is_not(">,\n"))),
    )(input)
}

/// The `K=V,K=V,...` body of a structured header line. Commas inside
/// quoted values are not separators; quotes are kept in the value.
pub(crate) fn keys_and_values(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    separated_list0(char(','), key_value)(input)
}
