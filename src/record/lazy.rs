use std::borrow::Cow;
use std::convert::TryInto;
use std::mem::size_of;
use std::ops::Range;

use crate::bcf::reshape_value;
use crate::errors::{Error, Result};
use crate::header::Header;
use crate::parser;
use crate::record::VariantRecord;
use crate::types::{Text, Value};
use crate::Shared;

const S_I16: usize = size_of::<i16>();
const S_I32: usize = size_of::<i32>();
const S_U32: usize = size_of::<u32>();
const S_F32: usize = size_of::<f32>();

const CHROM_BYTE_RANGE: Range<usize> = 0..S_I32;
const POS_BYTE_RANGE: Range<usize> = S_I32..S_I32 * 2;
const QUAL_BYTE_RANGE: Range<usize> = S_I32 * 3..S_I32 * 3 + S_F32;
const N_INFO_BYTE_RANGE: Range<usize> = S_I32 * 3 + S_F32..S_I32 * 3 + S_F32 + S_I16;
const N_ALLELE_BYTE_RANGE: Range<usize> = S_I32 * 3 + S_F32 + S_I16..S_I32 * 4 + S_F32 + S_I16;
const N_SAMPLE_N_FMT_BYTE_RANGE: Range<usize> =
    S_I32 * 3 + S_F32 + S_I16 * 2..S_I32 * 3 + S_F32 + S_I16 * 2 + S_U32;

/// A BCF record that keeps its raw shared/per-sample byte halves and
/// decodes fields on access. String accessors return views into the
/// record's own buffer; nothing is decoded up front except the byte
/// position where the allele list starts.
#[derive(Debug)]
pub struct RawBcfRecord {
    shared: Vec<u8>,
    indiv: Vec<u8>,
    header: Shared<Header>,
    allele_start_bytepos: usize,
}

impl RawBcfRecord {
    pub(crate) fn new(shared: Vec<u8>, indiv: Vec<u8>, header: Shared<Header>) -> Result<Self> {
        if shared.len() < parser::RECORD_CORE_LENGTH {
            return Err(Error::format("record core is truncated"));
        }
        // The allele list starts right after ID, which is a typed string of
        // unknown size; read it once to learn where the alleles begin.
        let after_core = &shared[parser::RECORD_CORE_LENGTH..];
        let (rest, _id) = parser::typed_string(after_core)
            .map_err(|_| Error::format("cannot read record ID"))?;
        let allele_start_bytepos = shared.len() - rest.len();
        Ok(Self {
            shared,
            indiv,
            header,
            allele_start_bytepos,
        })
    }

    pub fn header(&self) -> &Header {
        self.header.as_ref()
    }

    pub fn id(&self) -> Text<'_> {
        // validated in new()
        let (_, id) = parser::typed_string(&self.shared[parser::RECORD_CORE_LENGTH..])
            .unwrap_or((&[], &[]));
        Cow::Borrowed(id)
    }

    fn i32_at(&self, range: Range<usize>) -> i32 {
        i32::from_le_bytes(self.shared[range].try_into().unwrap_or([0; 4]))
    }

    fn n_alleles(&self) -> usize {
        let bytes = &self.shared[N_ALLELE_BYTE_RANGE];
        u16::from_le_bytes(bytes.try_into().unwrap_or([0; 2])) as usize
    }

    fn n_info(&self) -> usize {
        let bytes = &self.shared[N_INFO_BYTE_RANGE];
        u16::from_le_bytes(bytes.try_into().unwrap_or([0; 2])) as usize
    }

    fn n_fmt_n_sample(&self) -> (usize, usize) {
        let bytes: [u8; 4] = self.shared[N_SAMPLE_N_FMT_BYTE_RANGE]
            .try_into()
            .unwrap_or([0; 4]);
        let n_sample = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        (bytes[3] as usize, n_sample as usize)
    }

    /// All alleles (REF first) plus the byte position right behind them.
    fn alleles(&self) -> Option<(Vec<&[u8]>, usize)> {
        let n_allele = self.n_alleles();
        let mut input = &self.shared[self.allele_start_bytepos..];
        let mut alleles = Vec::with_capacity(n_allele);
        for _ in 0..n_allele {
            let (rest, allele) = parser::typed_string(input).ok()?;
            input = rest;
            alleles.push(allele);
        }
        Some((alleles, self.shared.len() - input.len()))
    }
}

impl VariantRecord for RawBcfRecord {
    fn chrom(&self) -> &str {
        let idx = self.i32_at(CHROM_BYTE_RANGE);
        self.header.contig_for_idx(idx).unwrap_or("")
    }

    fn pos(&self) -> u32 {
        // stored 0-based on disk
        (self.i32_at(POS_BYTE_RANGE) + 1) as u32
    }

    fn ref_allele(&self) -> Text<'_> {
        let (_, allele) = parser::typed_string(&self.shared[self.allele_start_bytepos..])
            .unwrap_or((&[], &[]));
        Cow::Borrowed(allele)
    }

    fn alt_alleles(&self) -> Vec<Text<'_>> {
        match self.alleles() {
            Some((alleles, _)) if alleles.len() > 1 => {
                alleles[1..].iter().copied().map(Cow::Borrowed).collect()
            }
            _ => vec![],
        }
    }

    fn qual(&self) -> Option<f32> {
        let bytes = &self.shared[QUAL_BYTE_RANGE];
        let qual = f32::from_le_bytes(bytes.try_into().unwrap_or([0; 4]));
        if qual.is_nan() {
            None
        } else {
            Some(qual)
        }
    }

    fn filters(&self) -> Vec<&str> {
        let byte_pos = match self.alleles() {
            Some((_, byte_pos)) => byte_pos,
            None => return vec![],
        };
        let filter_ids = match parser::typed_ints(&self.shared[byte_pos..]) {
            Ok((_, ids)) => ids,
            Err(_) => return vec![],
        };
        filter_ids
            .iter()
            .filter_map(|&idx| self.header.id_for_idx(idx))
            .collect()
    }

    fn info(&self, tag: &[u8]) -> Option<Value<'_>> {
        // reading lazily requires skipping the alleles and filters, since
        // both have unknown size
        let (_, byte_pos) = self.alleles()?;
        let (mut input, _filters) = parser::typed_ints(&self.shared[byte_pos..]).ok()?;

        let entry = self
            .header
            .infos
            .get(std::str::from_utf8(tag).ok()?)?;
        for _ in 0..self.n_info() {
            let (rest, (idx, _td, value)) = parser::info_entry(input).ok()?;
            input = rest;
            if idx == entry.idx {
                return Some(reshape_value(value, entry.kind));
            }
        }
        None
    }

    fn format(&self, tag: &[u8]) -> Option<Vec<Value<'_>>> {
        if self.indiv.is_empty() {
            return None;
        }
        let (n_fmt, n_sample) = self.n_fmt_n_sample();
        let tag = std::str::from_utf8(tag).ok()?;
        let entry = self.header.formats.get(tag)?;

        let mut input = &self.indiv[..];
        for _ in 0..n_fmt {
            let (rest, (idx, td)) = parser::format_entry_header(input).ok()?;
            if idx != entry.idx {
                // fixed element widths allow skipping without decoding
                let skip = td.num_elements * td.kind.size_of() * n_sample;
                input = rest.get(skip..)?;
                continue;
            }
            let (_, values) = parser::sample_values(&td, n_sample, rest).ok()?;
            return if tag == "GT" {
                values
                    .into_iter()
                    .map(|v| {
                        v.integers()
                            .map(|alleles| Value::String(Cow::Owned(parser::gt_text(&alleles))))
                    })
                    .collect()
            } else {
                Some(
                    values
                        .into_iter()
                        .map(|v| reshape_value(v, entry.kind))
                        .collect(),
                )
            };
        }
        None
    }
}
