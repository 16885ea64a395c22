use std::io::Write;

use itertools::Itertools;
use log::warn;

use crate::bcf::{BCF_MAJOR_VERSION, BCF_MINOR_VERSION};
use crate::errors::{Error, Result};
use crate::header::{Header, HeaderInfo};
use crate::options::Options;
use crate::record::Record;
use crate::types::{
    smallest_int_kind, smallest_int_kind_for, TypeKind, Value, ValueKind, END_OF_VECTOR_CHAR,
    END_OF_VECTOR_INT16, END_OF_VECTOR_INT32, END_OF_VECTOR_INT8, MISSING_CHAR,
    MISSING_FLOAT_BITS, MISSING_INT16, MISSING_INT32, MISSING_INT8,
};
use crate::Shared;

/// Flush threshold for the per-record scratch buffer.
const DEFAULT_SCRATCH_LIMIT: usize = 10 * 1024 * 1024;

/// Streaming BCF encoder.
///
/// The header must be set before the first record. It is written lazily:
/// on the first record, or on drop when no record was ever written.
/// Records are laid out in a scratch buffer (frame sizes are unknown until
/// the payload exists) which is drained to the output stream whenever it
/// exceeds the flush threshold.
pub struct BcfWriter<W: Write> {
    inner: W,
    header: Option<Shared<Header>>,
    scratch: Vec<u8>,
    scratch_limit: usize,
    idx_kind: TypeKind,
    options: Options,
    wrote_header: bool,
    record_no: u64,
}

impl<W: Write> BcfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_options(inner, Options::default())
    }

    pub fn with_options(inner: W, options: Options) -> Self {
        Self {
            inner,
            header: None,
            scratch: Vec::new(),
            scratch_limit: DEFAULT_SCRATCH_LIMIT,
            idx_kind: TypeKind::Int8,
            options,
            wrote_header: false,
            record_no: 0,
        }
    }

    /// Override the scratch flush threshold (bytes).
    pub fn set_scratch_limit(&mut self, limit: usize) {
        self.scratch_limit = limit;
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_deref()
    }

    /// Install the header, assigning missing IDX values. Returns a shared
    /// handle; mutating the header through another handle after the first
    /// record has been written is unsupported.
    pub fn set_header(&mut self, mut header: Header) -> Result<Shared<Header>> {
        if self.wrote_header {
            return Err(Error::format(
                "cannot replace the header after records have been written",
            ));
        }
        header.idx_update()?;
        let header = Shared::new(header);
        self.set_shared_header(Shared::clone(&header))?;
        Ok(header)
    }

    /// Install an already IDX-complete header shared with the caller.
    pub fn set_shared_header(&mut self, header: Shared<Header>) -> Result<()> {
        if self.wrote_header {
            return Err(Error::format(
                "cannot replace the header after records have been written",
            ));
        }
        header.idx_validate()?;
        // one descriptor fits every IDX reference in the file
        self.idx_kind = smallest_int_kind(header.max_idx());
        self.header = Some(header);
        Ok(())
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let header = Shared::clone(self.header.as_ref().ok_or_else(|| {
            Error::MissingHeader("set_header must be called before the first record".into())
        })?);
        if !self.wrote_header {
            self.write_header_bytes()?;
        }
        encode_record(
            &mut self.scratch,
            record,
            header.as_ref(),
            self.idx_kind,
            &self.options,
        )
        .map_err(|e| e.with_record(self.record_no))?;
        self.record_no += 1;
        if self.scratch.len() > self.scratch_limit {
            self.inner.write_all(&self.scratch)?;
            self.scratch.clear();
        }
        Ok(())
    }

    /// Write any pending header and drain all buffers.
    pub fn flush(&mut self) -> Result<()> {
        if !self.wrote_header && self.header.is_some() {
            self.write_header_bytes()?;
        }
        if !self.scratch.is_empty() {
            self.inner.write_all(&self.scratch)?;
            self.scratch.clear();
        }
        self.inner.flush()?;
        Ok(())
    }

    fn write_header_bytes(&mut self) -> Result<()> {
        let header = self.header.as_ref().ok_or_else(|| {
            Error::MissingHeader("set_header must be called before the first record".into())
        })?;
        let mut text = header.to_plaintext();
        text.push('\0');
        self.inner.write_all(b"BCF")?;
        self.inner
            .write_all(&[BCF_MAJOR_VERSION, BCF_MINOR_VERSION])?;
        self.inner.write_all(&(text.len() as u32).to_le_bytes())?;
        self.inner.write_all(text.as_bytes())?;
        self.wrote_header = true;
        Ok(())
    }
}

impl<W: Write> Drop for BcfWriter<W> {
    fn drop(&mut self) {
        // best effort; stays silent during unwinding
        if !std::thread::panicking() {
            let _ = self.flush();
        }
    }
}

fn push_type_descriptor(buf: &mut Vec<u8>, kind: TypeKind, n: usize) {
    if n < 15 {
        buf.push(((n as u8) << 4) | u8::from(kind));
    } else {
        buf.push(0xF0 | u8::from(kind));
        let count_kind = smallest_int_kind(n as i32);
        buf.push(0x10 | u8::from(count_kind));
        push_int(buf, n as i32, count_kind);
    }
}

/// Append one integer in the given width, translating the in-memory
/// sentinels into the width's own sentinels.
fn push_int(buf: &mut Vec<u8>, v: i32, kind: TypeKind) {
    match kind {
        TypeKind::Int8 => {
            let v = match v {
                MISSING_INT32 => MISSING_INT8,
                END_OF_VECTOR_INT32 => END_OF_VECTOR_INT8,
                _ => v as i8,
            };
            buf.extend_from_slice(&v.to_le_bytes());
        }
        TypeKind::Int16 => {
            let v = match v {
                MISSING_INT32 => MISSING_INT16,
                END_OF_VECTOR_INT32 => END_OF_VECTOR_INT16,
                _ => v as i16,
            };
            buf.extend_from_slice(&v.to_le_bytes());
        }
        TypeKind::Int32 => buf.extend_from_slice(&v.to_le_bytes()),
        _ => unreachable!("push_int called with non-integer kind"),
    }
}

fn push_typed_int(buf: &mut Vec<u8>, v: i32, kind: TypeKind) {
    push_type_descriptor(buf, kind, 1);
    push_int(buf, v, kind);
}

/// Empty strings and "." encode as the single missing-string byte.
fn push_typed_string(buf: &mut Vec<u8>, s: &[u8]) {
    if s.is_empty() || s == b"." {
        buf.push(MISSING_CHAR);
    } else {
        push_type_descriptor(buf, TypeKind::String, s.len());
        buf.extend_from_slice(s);
    }
}

/// The width used for a set of integer values: the narrowest fitting
/// width when compressing, otherwise the header-declared width widened as
/// far as the values demand.
fn int_kind_for(values: &[i32], declared: ValueKind, compress: bool) -> TypeKind {
    let needed = smallest_int_kind_for(values.iter().copied());
    if compress {
        return needed;
    }
    let declared = declared.type_kind();
    if declared.is_int() && declared.size_of() >= needed.size_of() {
        declared
    } else {
        needed
    }
}

/// Encode one INFO payload (the typed value after the key reference).
fn encode_info_value(
    buf: &mut Vec<u8>,
    value: &Value,
    entry: &HeaderInfo,
    compress: bool,
) -> Result<()> {
    match value {
        // de-facto flag convention: int8 x 1 with payload 0
        Value::Flag => {
            push_type_descriptor(buf, TypeKind::Int8, 1);
            buf.push(0);
        }
        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) => {
            let v = value.integer().unwrap_or(MISSING_INT32);
            let kind = int_kind_for(&[v], entry.kind, compress);
            push_typed_int(buf, v, kind);
        }
        Value::VecInt8(_) | Value::VecInt16(_) | Value::VecInt32(_) => {
            let vs = value.integers().unwrap_or_default();
            if vs.is_empty() {
                // absent vector: one missing element
                push_typed_int(buf, MISSING_INT32, TypeKind::Int8);
            } else {
                let kind = int_kind_for(&vs, entry.kind, compress);
                push_type_descriptor(buf, kind, vs.len());
                for v in vs {
                    push_int(buf, v, kind);
                }
            }
        }
        Value::Float32(v) => {
            push_type_descriptor(buf, TypeKind::Float32, 1);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Value::VecFloat32(vs) => {
            if vs.is_empty() {
                push_type_descriptor(buf, TypeKind::Float32, 1);
                buf.extend_from_slice(&f32::from_bits(MISSING_FLOAT_BITS).to_le_bytes());
            } else {
                push_type_descriptor(buf, TypeKind::Float32, vs.len());
                for v in vs {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        Value::Char(c) => {
            push_typed_string(buf, &[*c]);
        }
        Value::String(s) => {
            push_typed_string(buf, s.as_ref());
        }
        Value::VecString(vs) => {
            let joined = vs.iter().map(|s| &s[..]).collect_vec().join(&b","[..]);
            push_typed_string(buf, &joined);
        }
    }
    Ok(())
}

/// Maximum allele count and maximum allele value over a set of GT strings.
fn gt_maxs(values: &[Value]) -> Result<(usize, i32)> {
    let mut max_alleles = 0;
    let mut max_allele_val = 0;
    for value in values {
        let s = match value {
            Value::String(s) => s.as_ref(),
            _ => return Err(Error::format("GT must be provided as per-sample strings")),
        };
        let mut n_alleles = 0;
        for token in s.split(|&b| b == b'/' || b == b'|') {
            if !(token.is_empty() || token == b".") {
                let v = parse_i32(token)?;
                max_allele_val = max_allele_val.max(v);
            }
            n_alleles += 1;
        }
        max_alleles = max_alleles.max(n_alleles);
    }
    Ok((max_alleles, max_allele_val))
}

fn parse_i32(token: &[u8]) -> Result<i32> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::format(format!("invalid allele index {:?}", token)))
}

/// Encode one sample's GT string as `(allele + 1) << 1 | phased` values,
/// padded with end-of-vector up to `max_alleles`.
fn encode_gt_sample(
    buf: &mut Vec<u8>,
    s: &[u8],
    kind: TypeKind,
    max_alleles: usize,
) -> Result<()> {
    let mut n_alleles = 0;
    if !s.is_empty() {
        let mut phased = false;
        let mut start = 0;
        for i in 0..=s.len() {
            if i == s.len() || s[i] == b'/' || s[i] == b'|' {
                let token = &s[start..i];
                let encoded = if token.is_empty() || token == b"." {
                    0
                } else {
                    (parse_i32(token)? + 1) << 1 | phased as i32
                };
                push_int(buf, encoded, kind);
                n_alleles += 1;
                if i < s.len() {
                    phased = s[i] == b'|';
                    start = i + 1;
                }
            }
        }
    } else {
        push_int(buf, 0, kind);
        n_alleles = 1;
    }
    for _ in n_alleles..max_alleles {
        push_int(buf, END_OF_VECTOR_INT32, kind);
    }
    Ok(())
}

/// Encode the GT genotype field: width from the maximum allele value,
/// per-sample count from the widest genotype.
fn encode_gt_field(buf: &mut Vec<u8>, values: &[Value], n_sample: usize) -> Result<()> {
    if values.len() != n_sample {
        return Err(Error::format(
            "GT requires a value for every sample",
        ));
    }
    let (max_alleles, max_allele_val) = gt_maxs(values)?;
    // one bit is lost to the +1, one to the shift, one to the sign
    let kind = if max_allele_val <= 5 {
        TypeKind::Int8
    } else if max_allele_val <= 13 {
        TypeKind::Int16
    } else {
        TypeKind::Int32
    };
    push_type_descriptor(buf, kind, max_alleles);
    for value in values {
        match value {
            Value::String(s) => encode_gt_sample(buf, s.as_ref(), kind, max_alleles)?,
            _ => return Err(Error::format("GT must be provided as per-sample strings")),
        }
    }
    Ok(())
}

fn sample_ints(value: &Value) -> Result<Vec<i32>> {
    match value {
        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) => {
            Ok(vec![value.integer().unwrap_or(MISSING_INT32)])
        }
        Value::VecInt8(_) | Value::VecInt16(_) | Value::VecInt32(_) => {
            Ok(value.integers().unwrap_or_default())
        }
        _ => Err(Error::format("expected integer genotype values")),
    }
}

fn sample_floats(value: &Value) -> Result<Vec<f32>> {
    match value {
        Value::Float32(v) => Ok(vec![*v]),
        Value::VecFloat32(v) => Ok(v.clone()),
        _ => Err(Error::format("expected float genotype values")),
    }
}

fn sample_text(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Char(c) => Ok(vec![*c]),
        Value::String(s) => Ok(s.as_ref().to_vec()),
        // strings within a sample are joined by ','
        Value::VecString(vs) => Ok(vs.iter().map(|s| &s[..]).collect_vec().join(&b","[..])),
        _ => Err(Error::format("expected string genotype values")),
    }
}

/// Encode a non-GT genotype field: per-sample vectors rectangularised to
/// the per-record maximum with end-of-vector padding; samples missing from
/// the tail of the column become all-EOV rows.
fn encode_genotype_field(
    buf: &mut Vec<u8>,
    values: &[Value],
    entry: &HeaderInfo,
    n_sample: usize,
    compress: bool,
) -> Result<()> {
    if values.len() > n_sample {
        return Err(Error::format(format!(
            "genotype column has {} values but the header declares {} samples",
            values.len(),
            n_sample
        )));
    }
    match entry.kind.scalar() {
        ValueKind::Int8 | ValueKind::Int16 | ValueKind::Int32 => {
            let rows = values.iter().map(sample_ints).collect::<Result<Vec<_>>>()?;
            let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let all = rows.iter().flatten().copied().collect_vec();
            let kind = int_kind_for(&all, entry.kind, compress);
            push_type_descriptor(buf, kind, width);
            for row in &rows {
                for &v in row {
                    push_int(buf, v, kind);
                }
                let mut pad = width - row.len();
                if row.is_empty() {
                    // an absent vector starts with a missing value
                    push_int(buf, MISSING_INT32, kind);
                    pad -= 1;
                }
                for _ in 0..pad {
                    push_int(buf, END_OF_VECTOR_INT32, kind);
                }
            }
            for _ in values.len()..n_sample {
                for _ in 0..width {
                    push_int(buf, END_OF_VECTOR_INT32, kind);
                }
            }
        }
        ValueKind::Float32 => {
            let rows = values
                .iter()
                .map(sample_floats)
                .collect::<Result<Vec<_>>>()?;
            let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
            push_type_descriptor(buf, TypeKind::Float32, width);
            for row in &rows {
                for v in row {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                let mut pad = width - row.len();
                if row.is_empty() {
                    buf.extend_from_slice(&f32::from_bits(MISSING_FLOAT_BITS).to_le_bytes());
                    pad -= 1;
                }
                for _ in 0..pad {
                    buf.extend_from_slice(
                        &f32::from_bits(crate::types::END_OF_VECTOR_FLOAT_BITS).to_le_bytes(),
                    );
                }
            }
            for _ in values.len()..n_sample {
                for _ in 0..width {
                    buf.extend_from_slice(
                        &f32::from_bits(crate::types::END_OF_VECTOR_FLOAT_BITS).to_le_bytes(),
                    );
                }
            }
        }
        _ => {
            let rows = values.iter().map(sample_text).collect::<Result<Vec<_>>>()?;
            let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
            push_type_descriptor(buf, TypeKind::String, width);
            for row in &rows {
                if row.is_empty() {
                    buf.push(MISSING_CHAR);
                } else {
                    buf.extend_from_slice(row);
                }
                let written = row.len().max(1);
                buf.extend(std::iter::repeat(END_OF_VECTOR_CHAR).take(width - written));
            }
            for _ in values.len()..n_sample {
                buf.push(MISSING_CHAR);
                buf.extend(std::iter::repeat(END_OF_VECTOR_CHAR).take(width - 1));
            }
        }
    }
    Ok(())
}

/// Lay out one record frame (placeholder sizes patched at the end) into
/// the scratch buffer.
pub(crate) fn encode_record(
    buf: &mut Vec<u8>,
    record: &Record,
    header: &Header,
    idx_kind: TypeKind,
    options: &Options,
) -> Result<()> {
    let frame_start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes()); // l_shared placeholder
    buf.extend_from_slice(&0u32.to_le_bytes()); // l_indiv placeholder

    let n_alts = record.alt_alleles.len();
    if n_alts + 1 > u16::MAX as usize {
        return Err(Error::format("too many ALT alleles"));
    }
    if record.info.len() > u16::MAX as usize {
        return Err(Error::format("too many INFO entries"));
    }
    if record.genotypes.len() > 0xFF {
        return Err(Error::format("too many FORMAT entries"));
    }
    let n_sample = header.n_samples();

    let chrom = header
        .contig_idx(&record.chrom)
        .ok_or_else(|| Error::format(format!("unknown contig {}", record.chrom)))?;
    buf.extend_from_slice(&chrom.to_le_bytes());
    buf.extend_from_slice(&(record.pos as i32 - 1).to_le_bytes());
    buf.extend_from_slice(&(record.ref_allele.len() as i32).to_le_bytes());
    match record.qual {
        Some(qual) => buf.extend_from_slice(&qual.to_le_bytes()),
        None => buf.extend_from_slice(&f32::from_bits(MISSING_FLOAT_BITS).to_le_bytes()),
    }
    buf.extend_from_slice(&(record.info.len() as u16).to_le_bytes());
    buf.extend_from_slice(&((n_alts + 1) as u16).to_le_bytes());
    let n_sample_bytes = (n_sample as u32).to_le_bytes();
    buf.extend_from_slice(&n_sample_bytes[..3]);
    buf.push(record.genotypes.len() as u8);

    push_typed_string(buf, record.id.as_ref());
    push_typed_string(buf, record.ref_allele.as_ref());
    for alt in &record.alt_alleles {
        push_typed_string(buf, alt.as_ref());
    }

    push_type_descriptor(buf, idx_kind, record.filters.len());
    for name in &record.filters {
        let filter = header
            .filters
            .get(name)
            .ok_or_else(|| Error::format(format!("unknown FILTER {}", name)))?;
        push_int(buf, filter.idx, idx_kind);
    }

    for (name, value) in &record.info {
        let entry = header
            .infos
            .get(name)
            .ok_or_else(|| Error::format(format!("unknown INFO key {}", name)))?;
        if options.print_warnings() {
            if let (Some(expected), Some(actual)) = (
                entry.number.expected(n_alts),
                value_len(value),
            ) {
                if expected != actual && !value.is_missing() {
                    warn!(
                        "INFO {} has {} values but Number={} implies {}",
                        name, actual, entry.number, expected
                    );
                }
            }
        }
        push_typed_int(buf, entry.idx, idx_kind);
        encode_info_value(buf, value, entry, options.compress_integers())?;
    }

    let shared_end = buf.len();

    for (name, values) in &record.genotypes {
        let entry = header
            .formats
            .get(name)
            .ok_or_else(|| Error::format(format!("unknown FORMAT key {}", name)))?;
        push_typed_int(buf, entry.idx, idx_kind);
        if name == "GT" {
            encode_gt_field(buf, values, n_sample)?;
        } else {
            encode_genotype_field(buf, values, entry, n_sample, options.compress_integers())?;
        }
    }
    let end = buf.len();

    let l_shared = (shared_end - frame_start - 8) as u32;
    let l_indiv = (end - shared_end) as u32;
    buf[frame_start..frame_start + 4].copy_from_slice(&l_shared.to_le_bytes());
    buf[frame_start + 4..frame_start + 8].copy_from_slice(&l_indiv.to_le_bytes());
    Ok(())
}

fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::VecInt8(v) => Some(v.len()),
        Value::VecInt16(v) => Some(v.len()),
        Value::VecInt32(v) => Some(v.len()),
        Value::VecFloat32(v) => Some(v.len()),
        Value::VecString(v) => Some(v.len()),
        Value::Flag => None,
        _ => Some(1),
    }
}
