use std::borrow::Cow;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::warn;

use crate::errors::{Error, Result};
use crate::header::{Header, InfoNumber};
use crate::options::Options;
use crate::record::Record;
use crate::types::{Sentinels, Value, ValueKind, MISSING_CHAR, MISSING_INT32};

/// Streaming reader over the records of a VCF text stream.
///
/// Header lines (`##`) feed the header parser; the `#CHROM` line closes
/// the header and supplies the column labels. The reader owns the header:
/// records mentioning unknown contigs, filters or INFO/FORMAT keys extend
/// it on the fly (reserved keys get their canonical schema).
#[derive(Debug)]
pub struct VcfRecords<R: BufRead> {
    header: Header,
    line_buf: String,
    line_no: u64,
    options: Options,
    inner: R,
}

impl VcfRecords<BufReader<Box<dyn Read>>> {
    /// Open a VCF file, transparently decompressing gzip/BGZF.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let display = path.as_ref().display().to_string();
        let (reader, _format) = niffler::from_path(path).map_err(|e| match e {
            niffler::Error::IOError(source) => Error::FileOpen {
                path: display.clone(),
                source,
            },
            other => other.into(),
        })?;
        Self::new(BufReader::new(reader))
    }
}

impl<R: BufRead> VcfRecords<R> {
    pub fn new(reader: R) -> Result<Self> {
        Self::with_options(reader, Options::default())
    }

    pub fn with_options(mut reader: R, options: Options) -> Result<Self> {
        let mut header = Header::new();
        let mut line_buf = String::new();
        let mut line_no = 0u64;
        loop {
            line_buf.clear();
            if reader.read_line(&mut line_buf)? == 0 {
                return Err(if line_no == 0 {
                    Error::MissingHeader("input is empty".into())
                } else {
                    Error::UnexpectedEndOfInput("EOF before the #CHROM line".into())
                });
            }
            line_no += 1;
            let line = line_buf.trim_end_matches(&['\n', '\r'][..]);
            if line.is_empty() {
                continue;
            }
            header
                .parse_line(line)
                .map_err(|e| e.with_line(line_no))?;
            if line.starts_with("#CHROM") {
                break;
            }
        }
        Ok(Self {
            header,
            line_buf: String::new(),
            line_no,
            options,
            inner: reader,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Hand the header (including auto-inserted entries) to the caller.
    pub fn into_header(self) -> Header {
        self.header
    }

    fn read_record(&mut self) -> Result<Option<Record<'static>>> {
        loop {
            self.line_buf.clear();
            if self.inner.read_line(&mut self.line_buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.line_buf.trim_end_matches(&['\n', '\r'][..]);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.to_owned();
            let record = self
                .parse_record(&line)
                .map_err(|e| e.with_line(self.line_no))?;
            return Ok(Some(record));
        }
    }

    fn parse_record(&mut self, line: &str) -> Result<Record<'static>> {
        let mut fields = line.split('\t');
        let mut next_field = |name: &str| {
            fields
                .next()
                .ok_or_else(|| Error::parse(format!("record line is missing the {} field", name)))
        };

        let chrom = next_field("CHROM")?.to_owned();
        let (_, inserted) = self.header.ensure_contig(&chrom)?;
        if inserted && self.options.print_warnings() {
            warn!("contig {} is not declared in the header; added", chrom);
        }

        let pos_field = next_field("POS")?;
        let pos = if pos_field == "." {
            0
        } else {
            pos_field
                .parse()
                .map_err(|_| Error::parse(format!("invalid POS {}", pos_field)))?
        };

        let id = next_field("ID")?;
        let id = if id == "." { Vec::new() } else { id.into() };

        let ref_allele: Vec<u8> = next_field("REF")?.into();

        let alt_field = next_field("ALT")?;
        let alt_alleles: Vec<Cow<'static, [u8]>> = if alt_field == "." {
            vec![]
        } else {
            alt_field
                .split(',')
                .map(|a| Cow::Owned(a.as_bytes().to_vec()))
                .collect()
        };
        let n_alts = alt_alleles.len();

        let qual_field = next_field("QUAL")?;
        let qual = if qual_field == "." {
            None
        } else {
            Some(
                qual_field
                    .parse()
                    .map_err(|_| Error::parse(format!("invalid QUAL {}", qual_field)))?,
            )
        };

        let filter_field = next_field("FILTER")?;
        let mut filters = Vec::new();
        if filter_field != "." {
            for name in filter_field.split(';') {
                let (_, inserted) = self.header.ensure_filter(name)?;
                if inserted && self.options.print_warnings() {
                    warn!("FILTER {} is not declared in the header; added", name);
                }
                filters.push(name.to_owned());
            }
        }

        let info_field = next_field("INFO")?;
        let mut info = Vec::new();
        if info_field != "." {
            for pair in info_field.split(';') {
                if pair.is_empty() {
                    continue;
                }
                let (key, raw) = match pair.find('=') {
                    Some(eq) => (&pair[..eq], Some(&pair[eq + 1..])),
                    None => (pair, None),
                };
                let fallback = match raw {
                    None => ValueKind::Flag,
                    Some(raw) if raw.contains(',') => ValueKind::VecString,
                    Some(_) => ValueKind::String,
                };
                let (kind, number, inserted) = self.header.ensure_info(key, fallback)?;
                if inserted && self.options.print_warnings() {
                    warn!("INFO {} is not declared in the header; added", key);
                }
                let value = match raw {
                    None => {
                        if kind != ValueKind::Flag && self.options.print_warnings() {
                            warn!("INFO {} has no value but is not declared as a Flag", key);
                        }
                        if kind == ValueKind::Flag {
                            Value::Flag
                        } else {
                            Value::missing(kind)
                        }
                    }
                    Some(raw) => {
                        let value = parse_typed_value(kind, raw)?;
                        if self.options.print_warnings() {
                            warn_on_count_mismatch(key, &value, number, n_alts);
                        }
                        value
                    }
                };
                info.push((key.to_owned(), value));
            }
        }

        let mut genotypes = Vec::new();
        if let Some(format_field) = fields.next() {
            let keys: Vec<&str> = format_field.split(':').collect();
            let samples: Vec<&str> = fields.collect();
            let mut columns: Vec<(String, ValueKind, Vec<Value<'static>>)> = Vec::new();
            for key in &keys {
                let (kind, _, inserted) = self.header.ensure_format(key, ValueKind::String)?;
                if inserted && self.options.print_warnings() {
                    warn!("FORMAT {} is not declared in the header; added", key);
                }
                columns.push((
                    (*key).to_owned(),
                    kind,
                    Vec::with_capacity(samples.len()),
                ));
            }
            for sample in &samples {
                let mut tokens = sample.split(':');
                for (_, kind, values) in &mut columns {
                    // trailing fields may be dropped; absent means missing
                    match tokens.next() {
                        Some(token) => values.push(parse_typed_value(*kind, token)?),
                        None => values.push(Value::missing(*kind)),
                    }
                }
            }
            genotypes = columns
                .into_iter()
                .map(|(key, _, values)| (key, values))
                .collect();
        }

        Ok(Record {
            chrom,
            pos,
            id: Cow::Owned(id),
            ref_allele: Cow::Owned(ref_allele),
            alt_alleles,
            qual,
            filters,
            info,
            genotypes,
        })
    }
}

impl<R: BufRead> Iterator for VcfRecords<R> {
    type Item = Result<Record<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

fn warn_on_count_mismatch(key: &str, value: &Value, number: InfoNumber, n_alts: usize) {
    if let Some(expected) = number.expected(n_alts) {
        let actual = match value {
            Value::VecInt32(v) => v.len(),
            Value::VecFloat32(v) => v.len(),
            Value::VecString(v) => v.len(),
            Value::Flag => return,
            _ => 1,
        };
        if actual != expected && !value.is_missing() {
            warn!(
                "INFO {} has {} values but Number={} implies {}",
                key, actual, number, expected
            );
        }
    }
}

/// Parse one text token into the declared value category; "." is the
/// missing value throughout.
pub(crate) fn parse_typed_value(kind: ValueKind, raw: &str) -> Result<Value<'static>> {
    fn int(token: &str) -> Result<i32> {
        if token == "." {
            Ok(MISSING_INT32)
        } else {
            token
                .parse()
                .map_err(|_| Error::parse(format!("invalid integer literal {}", token)))
        }
    }
    fn float(token: &str) -> Result<f32> {
        if token == "." {
            Ok(f32::MISSING)
        } else {
            token
                .parse()
                .map_err(|_| Error::parse(format!("invalid float literal {}", token)))
        }
    }

    Ok(match kind {
        ValueKind::Flag => Value::Flag,
        ValueKind::Int8 | ValueKind::Int16 | ValueKind::Int32 => Value::Int32(int(raw)?),
        ValueKind::VecInt8 | ValueKind::VecInt16 | ValueKind::VecInt32 => {
            if raw == "." {
                Value::VecInt32(vec![])
            } else {
                Value::VecInt32(raw.split(',').map(int).collect::<Result<_>>()?)
            }
        }
        ValueKind::Float32 => Value::Float32(float(raw)?),
        ValueKind::VecFloat32 => {
            if raw == "." {
                Value::VecFloat32(vec![])
            } else {
                Value::VecFloat32(raw.split(',').map(float).collect::<Result<_>>()?)
            }
        }
        ValueKind::Char8 => Value::Char(if raw == "." {
            MISSING_CHAR
        } else {
            raw.as_bytes().first().copied().unwrap_or(MISSING_CHAR)
        }),
        ValueKind::String => {
            if raw == "." {
                Value::String(Cow::Borrowed(&[]))
            } else {
                Value::String(Cow::Owned(raw.as_bytes().to_vec()))
            }
        }
        ValueKind::VecString => {
            if raw == "." {
                Value::VecString(vec![])
            } else {
                Value::VecString(
                    raw.split(',')
                        .map(|s| Cow::Owned(s.as_bytes().to_vec()))
                        .collect(),
                )
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\t100\t.\tA\tC\t.\t.\t.\n";

    #[test]
    fn minimal_record() {
        let mut records = VcfRecords::new(MINIMAL.as_bytes()).unwrap();
        let record = records.next().unwrap().unwrap();
        assert_eq!(record.chrom, "1");
        assert_eq!(record.pos, 100);
        assert!(record.id.is_empty());
        assert_eq!(record.ref_allele.as_ref(), b"A");
        assert_eq!(record.alt_alleles, vec![Cow::Borrowed(b"C")]);
        assert_eq!(record.qual, None);
        assert!(record.filters.is_empty());
        assert!(record.info.is_empty());
        assert!(record.genotypes.is_empty());
        assert!(records.next().is_none());
    }

    #[test]
    fn typed_info_values() {
        let text = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
##INFO=<ID=NS,Number=1,Type=Integer,Description=\"x\">\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"x\">\n\
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"x\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\t100\t.\tA\tC,T\t.\t.\tNS=3;AF=0.1,0.2;DB\n";
        let mut records = VcfRecords::new(text.as_bytes()).unwrap();
        let record = records.next().unwrap().unwrap();
        assert_eq!(
            record.info,
            vec![
                ("NS".to_owned(), Value::Int32(3)),
                ("AF".to_owned(), Value::VecFloat32(vec![0.1, 0.2])),
                ("DB".to_owned(), Value::Flag),
            ]
        );
    }

    #[test]
    fn unknown_info_key_is_auto_inserted() {
        let text = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\t100\t.\tA\tC\t.\t.\tXY=42\n";
        let mut records = VcfRecords::new(text.as_bytes()).unwrap();
        let record = records.next().unwrap().unwrap();
        assert_eq!(
            record.info,
            vec![("XY".to_owned(), Value::String(Cow::Borrowed(b"42")))]
        );
        let header = records.into_header();
        let xy = &header.infos["XY"];
        assert_eq!(xy.kind, ValueKind::String);
        assert!(xy.description.contains("Automatically added"));
    }

    #[test]
    fn reserved_key_gets_canonical_schema() {
        let text = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\t100\t.\tA\tC,T\t.\t.\tAC=5,6\n";
        let mut records = VcfRecords::new(text.as_bytes()).unwrap();
        let record = records.next().unwrap().unwrap();
        assert_eq!(
            record.info,
            vec![("AC".to_owned(), Value::VecInt32(vec![5, 6]))]
        );
        assert_eq!(
            records.header().infos["AC"].number,
            InfoNumber::AlternateAlleles
        );
    }

    #[test]
    fn unknown_filter_and_contig_are_auto_inserted() {
        let text = "##fileformat=VCFv4.3\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
7\t1\t.\tG\t.\t.\tq10;s50\t.\n";
        let mut records = VcfRecords::new(text.as_bytes()).unwrap();
        let record = records.next().unwrap().unwrap();
        assert_eq!(record.filters, vec!["q10", "s50"]);
        let header = records.into_header();
        assert_eq!(header.contigs["7"].length, -1);
        assert!(header.filters.contains_key("q10"));
        assert!(header.filters.contains_key("s50"));
    }

    #[test]
    fn genotype_columns_are_column_major() {
        let text = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"x\">\n\
##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"x\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n\
1\t100\t.\tA\tC\t.\t.\t.\tGT:DP\t0|1:30\t1/1\n";
        let mut records = VcfRecords::new(text.as_bytes()).unwrap();
        let record = records.next().unwrap().unwrap();
        assert_eq!(record.genotypes.len(), 2);
        let (key, gts) = &record.genotypes[0];
        assert_eq!(key, "GT");
        assert_eq!(
            gts,
            &vec![
                Value::String(Cow::Borrowed(b"0|1".as_ref())),
                Value::String(Cow::Borrowed(b"1/1".as_ref())),
            ]
        );
        // S2 dropped the trailing DP field; it decodes as missing
        let (key, dps) = &record.genotypes[1];
        assert_eq!(key, "DP");
        assert_eq!(dps[0], Value::Int32(30));
        assert!(dps[1].is_missing());
    }

    #[test]
    fn missing_fileformat_is_missing_header() {
        let err = VcfRecords::new(&b"#CHROM\tPOS\n"[..]).unwrap_err();
        assert!(matches!(err, Error::MissingHeader(_)));
    }

    #[test]
    fn eof_before_chrom_line() {
        let err = VcfRecords::new(&b"##fileformat=VCFv4.3\n"[..]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndOfInput(_)));
    }

    #[test]
    fn parse_error_carries_line_number() {
        let text = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\tabc\t.\tA\tC\t.\t.\t.\n";
        let mut records = VcfRecords::new(text.as_bytes()).unwrap();
        let err = records.next().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "parse error in line 4: invalid POS abc");
    }
}
