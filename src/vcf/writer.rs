use std::io::Write;

use itertools::Itertools;

use crate::errors::{Error, Result};
use crate::header::Header;
use crate::options::Options;
use crate::record::Record;
use crate::types::{Sentinels, Text, Value};
use crate::Shared;

/// Streaming VCF text encoder.
///
/// The header is emitted in its canonical (IDX-free) form on the first
/// record, or on flush/drop when no record was written.
pub struct VcfWriter<W: Write> {
    inner: W,
    header: Option<Shared<Header>>,
    wrote_header: bool,
    options: Options,
}

impl<W: Write> VcfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_options(inner, Options::default())
    }

    pub fn with_options(inner: W, options: Options) -> Self {
        Self {
            inner,
            header: None,
            wrote_header: false,
            options,
        }
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_deref()
    }

    pub fn set_header(&mut self, header: Header) -> Result<Shared<Header>> {
        let header = Shared::new(header);
        self.set_shared_header(Shared::clone(&header))?;
        Ok(header)
    }

    pub fn set_shared_header(&mut self, header: Shared<Header>) -> Result<()> {
        if self.wrote_header {
            return Err(Error::format(
                "cannot replace the header after records have been written",
            ));
        }
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
        let line = format_record(record, header.as_ref());
        self.inner.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if !self.wrote_header && self.header.is_some() {
            self.write_header_bytes()?;
        }
        self.inner.flush()?;
        Ok(())
    }

    fn write_header_bytes(&mut self) -> Result<()> {
        let header = self.header.as_ref().ok_or_else(|| {
            Error::MissingHeader("set_header must be called before the first record".into())
        })?;
        self.inner
            .write_all(header.to_plaintext_without_idx().as_bytes())?;
        self.wrote_header = true;
        Ok(())
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl<W: Write> Drop for VcfWriter<W> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            let _ = self.flush();
        }
    }
}

fn text_or_dot(text: &Text) -> String {
    if text.is_empty() {
        ".".into()
    } else {
        String::from_utf8_lossy(text).into_owned()
    }
}

fn format_float(v: f32) -> String {
    if v.is_missing() {
        ".".into()
    } else {
        format!("{}", v)
    }
}

fn format_int(v: i32) -> String {
    if v.is_missing() {
        ".".into()
    } else {
        v.to_string()
    }
}

/// One value as it appears in an INFO pair or a sample column. Missing
/// values and absent vectors render as ".".
fn format_value(value: &Value) -> String {
    match value {
        Value::Char(c) => {
            if c.is_missing() {
                ".".into()
            } else {
                (*c as char).to_string()
            }
        }
        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) => {
            format_int(value.integer().unwrap_or_default())
        }
        Value::Float32(v) => format_float(*v),
        Value::String(s) => text_or_dot(s),
        Value::VecInt8(_) | Value::VecInt16(_) | Value::VecInt32(_) => {
            let vs = value.integers().unwrap_or_default();
            if vs.is_empty() {
                ".".into()
            } else {
                vs.into_iter().map(format_int).join(",")
            }
        }
        Value::VecFloat32(vs) => {
            if vs.is_empty() {
                ".".into()
            } else {
                vs.iter().copied().map(format_float).join(",")
            }
        }
        Value::VecString(vs) => {
            if vs.is_empty() {
                ".".into()
            } else {
                vs.iter()
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .join(",")
            }
        }
        Value::Flag => String::new(),
    }
}

fn format_record(record: &Record, header: &Header) -> String {
    let mut line = String::new();
    line.push_str(&record.chrom);
    line.push('\t');
    line.push_str(&record.pos.to_string());
    line.push('\t');
    line.push_str(&text_or_dot(&record.id));
    line.push('\t');
    line.push_str(&text_or_dot(&record.ref_allele));
    line.push('\t');
    if record.alt_alleles.is_empty() {
        line.push('.');
    } else {
        line.push_str(
            &record
                .alt_alleles
                .iter()
                .map(|a| String::from_utf8_lossy(a))
                .join(","),
        );
    }
    line.push('\t');
    match record.qual {
        Some(qual) => line.push_str(&format!("{}", qual)),
        None => line.push('.'),
    }
    line.push('\t');
    if record.filters.is_empty() {
        line.push('.');
    } else {
        line.push_str(&record.filters.iter().join(";"));
    }
    line.push('\t');
    if record.info.is_empty() {
        line.push('.');
    } else {
        let info = record
            .info
            .iter()
            .map(|(key, value)| match value {
                Value::Flag => key.clone(),
                _ => format!("{}={}", key, format_value(value)),
            })
            .join(";");
        line.push_str(&info);
    }
    if !record.genotypes.is_empty() {
        line.push('\t');
        line.push_str(&record.genotypes.iter().map(|(key, _)| key).join(":"));
        let n_samples = header
            .n_samples()
            .max(record.genotypes.iter().map(|(_, v)| v.len()).max().unwrap_or(0));
        for sample in 0..n_samples {
            line.push('\t');
            let column = record
                .genotypes
                .iter()
                .map(|(_, values)| match values.get(sample) {
                    Some(value) => format_value(value),
                    None => ".".into(),
                })
                .join(":");
            line.push_str(&column);
        }
    }
    line.push('\n');
    line
}
