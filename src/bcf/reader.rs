use std::borrow::Cow;
use std::io::{self, Read};
use std::mem::size_of;
use std::path::Path;

use crate::bcf::{descriptor_matches, reshape_value, BCF_MAJOR_VERSION};
use crate::errors::{Error, Result};
use crate::header::Header;
use crate::options::Options;
use crate::parser::{self, Version};
use crate::record::{RawBcfRecord, Record};
use crate::types::{TypeKind, Value};
use crate::Shared;

/// Streaming reader over the records of a BCF stream.
///
/// The stream starts with the magic header and the embedded plaintext VCF
/// header; records follow back to back until EOF. Iteration yields owned
/// records in file order; the internal record buffer is recycled between
/// advances.
#[derive(Debug)]
pub struct BcfRecords<R: Read> {
    header: Shared<Header>,
    header_text: String,
    version: Version,
    length_buf: [u8; size_of::<u32>() * 2],
    record_buf: Vec<u8>,
    record_no: u64,
    options: Options,
    inner: R,
}

impl BcfRecords<Box<dyn Read>> {
    /// Open a BCF file, transparently decompressing gzip/BGZF.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let display = path.as_ref().display().to_string();
        let (reader, _format) = niffler::from_path(path).map_err(|e| match e {
            niffler::Error::IOError(source) => Error::FileOpen {
                path: display.clone(),
                source,
            },
            other => other.into(),
        })?;
        Self::new(reader)
    }
}

impl<R: Read> BcfRecords<R> {
    pub fn new(reader: R) -> Result<Self> {
        Self::with_options(reader, Options::default())
    }

    pub fn with_options(mut reader: R, options: Options) -> Result<Self> {
        let mut input = [0u8; 5];
        read_exact_or_eof_error(&mut reader, &mut input, "BCF magic header")?;
        let (_, version) = parser::bcf_version(&input)
            .map_err(|_| Error::format("file does not start with BCF magic header"))?;
        if version.major != BCF_MAJOR_VERSION || !(version.minor == 1 || version.minor == 2) {
            return Err(Error::format(format!(
                "unsupported BCF version {}.{}",
                version.major, version.minor
            )));
        }

        let mut input = [0u8; size_of::<u32>()];
        read_exact_or_eof_error(&mut reader, &mut input, "BCF header length")?;
        let (_, header_length) = parser::header_length(&input)
            .map_err(|_| Error::format("cannot read BCF header length"))?;

        let mut input = vec![0u8; header_length as usize];
        read_exact_or_eof_error(&mut reader, &mut input, "embedded VCF header")?;
        let header_text = String::from_utf8(input)
            .map_err(|_| Error::format("embedded VCF header is not valid UTF-8"))?;
        let header_text = header_text.trim_end_matches('\0').to_owned();
        let header = Header::from_plaintext(&header_text)?;

        Ok(Self {
            header: Shared::new(header),
            header_text,
            version,
            length_buf: [0u8; size_of::<u32>() * 2],
            record_buf: Vec::new(),
            record_no: 0,
            options,
            inner: reader,
        })
    }

    pub fn header(&self) -> &Header {
        self.header.as_ref()
    }

    /// The plaintext header as embedded in the stream (NUL stripped).
    pub fn header_text(&self) -> &str {
        &self.header_text
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub(crate) fn shared_header(&self) -> Shared<Header> {
        Shared::clone(&self.header)
    }

    /// Re-arm the reader on a new stream position (after a caller seek).
    /// The header is kept; record numbering restarts.
    pub fn reset(&mut self, reader: R) {
        self.inner = reader;
        self.record_no = 0;
    }

    /// Read the next record frame into the internal buffer and return the
    /// shared/indiv split point, or `None` at a clean EOF.
    fn next_frame(&mut self) -> Result<Option<usize>> {
        let mut filled = 0;
        while filled < self.length_buf.len() {
            match self.inner.read(&mut self.length_buf[filled..]) {
                Ok(0) => {
                    return if filled == 0 {
                        Ok(None)
                    } else {
                        Err(Error::UnexpectedEndOfInput(format!(
                            "EOF inside the frame prefix of record {}",
                            self.record_no
                        )))
                    };
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let (_, (l_shared, l_indiv)) = parser::record_length(&self.length_buf)
            .map_err(|_| Error::format_at("cannot read record frame", self.record_no))?;
        let record_size = l_shared as usize + l_indiv as usize;
        if record_size == 0 {
            return Err(Error::format_at("record size is 0", self.record_no));
        }
        self.record_buf.resize(record_size, 0);
        self.inner.read_exact(&mut self.record_buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::format_at(
                    format!("truncated record: expected {} bytes", record_size),
                    self.record_no,
                )
            } else {
                Error::Io(e)
            }
        })?;
        Ok(Some(l_shared as usize))
    }

    /// Read the next record without eager decoding; fields are decoded on
    /// access against the returned record's own buffers.
    pub fn next_raw(&mut self) -> Result<Option<RawBcfRecord>> {
        let genotype_offset = match self.next_frame()? {
            Some(offset) => offset,
            None => return Ok(None),
        };
        let shared = self.record_buf[..genotype_offset].to_vec();
        let indiv = self.record_buf[genotype_offset..].to_vec();
        let record = RawBcfRecord::new(shared, indiv, self.shared_header())
            .map_err(|e| e.with_record(self.record_no))?;
        self.record_no += 1;
        Ok(Some(record))
    }

    fn read_record(&mut self) -> Result<Option<Record<'static>>> {
        let genotype_offset = match self.next_frame()? {
            Some(offset) => offset,
            None => return Ok(None),
        };
        let record = decode_record(
            &self.record_buf,
            genotype_offset,
            &self.header,
            &self.options,
        )
        .map_err(|e| e.with_record(self.record_no))?;
        self.record_no += 1;
        Ok(Some(record))
    }
}

impl<R: Read> Iterator for BcfRecords<R> {
    type Item = Result<Record<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

fn read_exact_or_eof_error<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEndOfInput(format!("EOF while reading {}", what))
        } else {
            Error::Io(e)
        }
    })
}

/// Decode one record frame against the header. `genotype_offset` is
/// `l_shared`, i.e. the boundary between the shared and per-sample halves.
pub(crate) fn decode_record(
    bytes: &[u8],
    genotype_offset: usize,
    header: &Header,
    options: &Options,
) -> Result<Record<'static>> {
    if genotype_offset > bytes.len() || genotype_offset < parser::RECORD_CORE_LENGTH {
        return Err(Error::format("record frame sizes are inconsistent"));
    }
    let (shared, indiv) = bytes.split_at(genotype_offset);

    let (input, core) =
        parser::record_core(shared).map_err(|_| Error::format("cannot read record core"))?;

    let chrom = header
        .contig_for_idx(core.chrom)
        .ok_or_else(|| Error::format(format!("unknown contig IDX {}", core.chrom)))?
        .to_owned();

    let (input, id) =
        parser::typed_string(input).map_err(|_| Error::format("cannot read record ID"))?;
    let id = id.to_vec();

    if core.n_allele == 0 {
        return Err(Error::format("record declares no alleles"));
    }
    let mut input = input;
    let mut alleles = Vec::with_capacity(core.n_allele as usize);
    for _ in 0..core.n_allele {
        let (rest, allele) =
            parser::typed_string(input).map_err(|_| Error::format("cannot read allele"))?;
        input = rest;
        alleles.push(allele.to_vec());
    }
    let mut alleles = alleles.into_iter();
    let ref_allele = alleles.next().unwrap_or_default();
    let alt_alleles: Vec<_> = alleles.map(Cow::Owned).collect();

    let (mut input, filter_ids) =
        parser::typed_ints(input).map_err(|_| Error::format("cannot read FILTER"))?;
    let mut filters = Vec::with_capacity(filter_ids.len());
    for idx in filter_ids {
        let name = header
            .id_for_idx(idx)
            .ok_or_else(|| Error::format(format!("unknown FILTER IDX {}", idx)))?;
        filters.push(name.to_owned());
    }

    let mut info = Vec::with_capacity(core.n_info as usize);
    for _ in 0..core.n_info {
        let (rest, (idx, td, value)) =
            parser::info_entry(input).map_err(|_| Error::format("cannot read INFO entry"))?;
        input = rest;
        let name = header
            .id_for_idx(idx)
            .ok_or_else(|| Error::format(format!("unknown INFO IDX {}", idx)))?;
        let entry = header
            .infos
            .get(name)
            .ok_or_else(|| Error::format(format!("IDX {} ({}) is not an INFO key", idx, name)))?;
        if options.verify_header_types() && !descriptor_matches(td.kind, entry.kind) {
            return Err(Error::format(format!(
                "INFO {} is declared {:?} but stored as {:?}",
                name, entry.kind, td.kind
            )));
        }
        let value = reshape_value(value, entry.kind);
        info.push((name.to_owned(), value.into_owned()));
    }

    let mut genotypes = Vec::with_capacity(core.n_fmt as usize);
    if !indiv.is_empty() {
        let n_sample = core.n_sample as usize;
        let mut input = indiv;
        for _ in 0..core.n_fmt {
            let (rest, (idx, td)) = parser::format_entry_header(input)
                .map_err(|_| Error::format("cannot read FORMAT entry"))?;
            input = rest;
            let name = header
                .id_for_idx(idx)
                .ok_or_else(|| Error::format(format!("unknown FORMAT IDX {}", idx)))?
                .to_owned();
            let entry = header.formats.get(&name).ok_or_else(|| {
                Error::format(format!("IDX {} ({}) is not a FORMAT key", idx, name))
            })?;
            let (rest, raw_values) = parser::sample_values(&td, n_sample, input)
                .map_err(|_| Error::format(format!("cannot read FORMAT {} payload", name)))?;
            input = rest;
            let values = if name == "GT" {
                if !td.kind.is_int() && td.kind != TypeKind::Missing {
                    return Err(Error::format("GT must be stored as integers"));
                }
                raw_values
                    .into_iter()
                    .map(|v| match v.integers() {
                        Some(alleles) => {
                            Ok(Value::String(Cow::Owned(parser::gt_text(&alleles))))
                        }
                        None => Err(Error::format("GT must be stored as integers")),
                    })
                    .collect::<Result<Vec<_>>>()?
            } else {
                if options.verify_header_types() && !descriptor_matches(td.kind, entry.kind) {
                    return Err(Error::format(format!(
                        "FORMAT {} is declared {:?} but stored as {:?}",
                        name, entry.kind, td.kind
                    )));
                }
                raw_values
                    .into_iter()
                    .map(|v| reshape_value(v, entry.kind).into_owned())
                    .collect()
            };
            genotypes.push((name, values));
        }
    }

    Ok(Record {
        chrom,
        pos: (core.pos + 1) as u32,
        id: Cow::Owned(id),
        ref_allele: Cow::Owned(ref_allele),
        alt_alleles,
        qual: if core.qual.is_nan() {
            None
        } else {
            Some(core.qual)
        },
        filters,
        info,
        genotypes,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    const HEADER: &str = "##fileformat=VCFv4.3\n\
##contig=<ID=1,IDX=0>\n\
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\",IDX=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    fn stream_with_records(records: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BCF\x02\x02");
        let text = format!("{}\0", HEADER);
        bytes.extend_from_slice(&(text.len() as u32).to_le_bytes());
        bytes.extend_from_slice(text.as_bytes());
        for record in records {
            bytes.extend_from_slice(record);
        }
        bytes
    }

    fn minimal_record_frame() -> Vec<u8> {
        // core + ID "." + REF "A" + empty ALT/FILTER/INFO
        let mut shared = Vec::new();
        shared.extend_from_slice(&0i32.to_le_bytes()); // chrom idx
        shared.extend_from_slice(&99i32.to_le_bytes()); // 0-based pos
        shared.extend_from_slice(&1i32.to_le_bytes()); // rlen
        shared.extend_from_slice(&f32::from_bits(crate::types::MISSING_FLOAT_BITS).to_le_bytes());
        shared.extend_from_slice(&0u16.to_le_bytes()); // n_info
        shared.extend_from_slice(&1u16.to_le_bytes()); // n_allele
        shared.extend_from_slice(&[0, 0, 0]); // n_sample
        shared.push(0); // n_fmt
        shared.push(0x07); // missing ID
        shared.extend_from_slice(&[0x17, b'A']); // REF
        shared.push(0x00); // FILTER: missing typed vector

        let mut frame = Vec::new();
        frame.extend_from_slice(&(shared.len() as u32).to_le_bytes());
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&shared);
        frame
    }

    #[test]
    fn bad_magic_is_a_format_error() {
        let err = BcfRecords::new(&b"BAM\x01xxxxxxxx"[..]).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
        assert!(err.to_string().contains("BCF magic header"));
    }

    #[test]
    fn wrong_version_rejected() {
        let err = BcfRecords::new(&b"BCF\x01\x02\x00\x00\x00\x00"[..]).unwrap_err();
        assert!(err.to_string().contains("unsupported BCF version"));
    }

    #[test]
    fn zero_record_stream_is_empty() {
        let bytes = stream_with_records(&[]);
        let mut records = BcfRecords::new(&bytes[..]).unwrap();
        assert_eq!(records.header().contigs.len(), 1);
        assert!(records.next().is_none());
    }

    #[test]
    fn minimal_record_decodes() {
        let frame = minimal_record_frame();
        let bytes = stream_with_records(&[&frame]);
        let mut records = BcfRecords::new(&bytes[..]).unwrap();
        let record = records.next().unwrap().unwrap();
        assert_eq!(record.chrom, "1");
        assert_eq!(record.pos, 100);
        assert!(record.id.is_empty());
        assert_eq!(record.ref_allele.as_ref(), b"A");
        assert!(record.alt_alleles.is_empty());
        assert_eq!(record.qual, None);
        assert!(record.filters.is_empty());
        assert!(record.info.is_empty());
        assert!(record.genotypes.is_empty());
        assert!(records.next().is_none());
    }

    #[test]
    fn zero_size_record_is_a_format_error() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&0u32.to_le_bytes());
        let bytes = stream_with_records(&[&frame]);
        let mut records = BcfRecords::new(&bytes[..]).unwrap();
        let err = records.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("record size is 0"));
    }

    #[test]
    fn truncated_record_names_the_record() {
        let mut frame = minimal_record_frame();
        // announce more bytes than are present
        let fake = 100u32.to_le_bytes();
        frame[..4].copy_from_slice(&fake);
        let bytes = stream_with_records(&[&frame]);
        let mut records = BcfRecords::new(&bytes[..]).unwrap();
        let err = records.next().unwrap().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("truncated record"), "{}", msg);
        assert!(msg.contains("record 0"), "{}", msg);
    }

    #[test]
    fn truncated_header_is_unexpected_eof() {
        let err = BcfRecords::new(&b"BCF\x02\x02\xFF\x00\x00\x00##file"[..]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndOfInput(_)));
    }
}
