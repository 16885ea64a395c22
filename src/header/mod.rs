//! The in-memory VCF/BCF header: schema dictionaries, the IDX number
//! spaces BCF uses to reference them, and plaintext (de)serialization.

pub mod reserved;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use strum::{Display, EnumString};

use crate::errors::{Error, Result};
use crate::parser;
use crate::types::ValueKind;

pub const DEFAULT_FILE_FORMAT: &str = "VCFv4.3";

const PASS: &str = "PASS";
const PASS_DESCRIPTION: &str = "All filters passed";

/// Description attached to header entries invented for unknown keys.
pub(crate) const AUTO_DESCRIPTION: &str = "Automatically added by varcodec.";

/// The `Number=` annotation of an INFO/FORMAT entry: a fixed count or one
/// of the per-record cardinalities `A`, `R`, `G`, `.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoNumber {
    Count(usize),
    /// One value per alternate allele (`A`).
    AlternateAlleles,
    /// One value per allele, including the reference (`R`).
    Alleles,
    /// One value per genotype (`G`).
    Genotypes,
    /// Unknown, unspecified or unbounded (`.`).
    Unknown,
}

impl InfoNumber {
    /// The per-sample value count implied for a record with `n_alts`
    /// alternate alleles; `None` when unbounded.
    pub fn expected(&self, n_alts: usize) -> Option<usize> {
        match self {
            InfoNumber::Count(n) => Some(*n),
            InfoNumber::AlternateAlleles => Some(n_alts),
            InfoNumber::Alleles => Some(n_alts + 1),
            InfoNumber::Genotypes => {
                let n = n_alts + 1;
                Some(n * (n + 1) / 2)
            }
            InfoNumber::Unknown => None,
        }
    }
}

impl fmt::Display for InfoNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InfoNumber::Count(n) => write!(f, "{}", n),
            InfoNumber::AlternateAlleles => f.write_str("A"),
            InfoNumber::Alleles => f.write_str("R"),
            InfoNumber::Genotypes => f.write_str("G"),
            InfoNumber::Unknown => f.write_str("."),
        }
    }
}

/// The `Type=` annotation of an INFO/FORMAT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum InfoType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

/// Resolve the declared `Type`/`Number` pair to a value category.
pub(crate) fn resolve_kind(ty: InfoType, number: InfoNumber) -> Result<ValueKind> {
    if ty == InfoType::Flag {
        return if number == InfoNumber::Count(0) {
            Ok(ValueKind::Flag)
        } else {
            Err(Error::format("Flags must always have Number=0 in header"))
        };
    }
    if number == InfoNumber::Count(0) {
        return Err(Error::format("only Flags may have Number=0 in header"));
    }
    let scalar = number == InfoNumber::Count(1);
    Ok(match ty {
        InfoType::Integer => {
            if scalar {
                ValueKind::Int32
            } else {
                ValueKind::VecInt32
            }
        }
        InfoType::Float => {
            if scalar {
                ValueKind::Float32
            } else {
                ValueKind::VecFloat32
            }
        }
        InfoType::Character => {
            if scalar {
                ValueKind::Char8
            } else {
                ValueKind::String
            }
        }
        InfoType::String => {
            if scalar {
                ValueKind::String
            } else {
                ValueKind::VecString
            }
        }
        InfoType::Flag => unreachable!(),
    })
}

/// Apply an `IntegerBits=8|16` override to an integer kind; any other
/// value keeps the 32-bit default.
fn apply_integer_bits(kind: ValueKind, bits: &str) -> ValueKind {
    match (bits, kind) {
        ("8", ValueKind::Int8) | ("8", ValueKind::Int16) | ("8", ValueKind::Int32) => {
            ValueKind::Int8
        }
        ("8", ValueKind::VecInt8) | ("8", ValueKind::VecInt16) | ("8", ValueKind::VecInt32) => {
            ValueKind::VecInt8
        }
        ("16", ValueKind::Int8) | ("16", ValueKind::Int16) | ("16", ValueKind::Int32) => {
            ValueKind::Int16
        }
        ("16", ValueKind::VecInt8) | ("16", ValueKind::VecInt16) | ("16", ValueKind::VecInt32) => {
            ValueKind::VecInt16
        }
        _ => kind,
    }
}

/// An `##INFO=<...>` header entry (also used for FORMAT).
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderInfo {
    pub number: InfoNumber,
    pub ty: InfoType,
    /// The resolved value category, including any `IntegerBits` override.
    pub kind: ValueKind,
    pub description: String,
    pub other_fields: IndexMap<String, String>,
    pub idx: i32,
}

impl HeaderInfo {
    pub fn new(number: InfoNumber, ty: InfoType, description: impl Into<String>) -> Result<Self> {
        Ok(Self {
            number,
            ty,
            kind: resolve_kind(ty, number)?,
            description: description.into(),
            other_fields: IndexMap::new(),
            idx: -1,
        })
    }
}

pub type HeaderFormat = HeaderInfo;

/// An `##FILTER=<...>` header entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFilter {
    pub description: String,
    pub other_fields: IndexMap<String, String>,
    pub idx: i32,
}

impl HeaderFilter {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            other_fields: IndexMap::new(),
            idx: -1,
        }
    }
}

/// A `##contig=<...>` header entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderContig {
    /// Length of the contig, -1 if absent.
    pub length: i64,
    pub other_fields: IndexMap<String, String>,
    pub idx: i32,
}

impl Default for HeaderContig {
    fn default() -> Self {
        Self {
            length: -1,
            other_fields: IndexMap::new(),
            idx: -1,
        }
    }
}

/// The header of a VCF/BCF file.
///
/// Entries live in four insertion-ordered dictionaries; order is
/// observable through the plaintext round trip. FILTER, INFO and FORMAT
/// entries share one IDX number space (PASS is pinned to 0); contigs use
/// a second, independent space.
#[derive(Debug, Clone)]
pub struct Header {
    pub file_format: String,
    pub filters: IndexMap<String, HeaderFilter>,
    pub infos: IndexMap<String, HeaderInfo>,
    pub formats: IndexMap<String, HeaderFormat>,
    pub contigs: IndexMap<String, HeaderContig>,
    /// Header lines that are not FILTER/INFO/FORMAT/contig, without `##`.
    pub other_lines: Vec<String>,
    /// The `#CHROM ...` labels; sample names start at index 9.
    pub column_labels: Vec<String>,

    idx_to_id: HashMap<i32, String>,
    contig_idx_to_id: HashMap<i32, String>,
    max_other_idx: i32,
    max_contig_idx: i32,
    file_format_read: bool,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.file_format == other.file_format
            && self.filters == other.filters
            && self.infos == other.infos
            && self.formats == other.formats
            && self.contigs == other.contigs
            && self.other_lines == other.other_lines
            && self.column_labels == other.column_labels
    }
}

impl Header {
    pub fn new() -> Self {
        let mut header = Self {
            file_format: DEFAULT_FILE_FORMAT.into(),
            filters: IndexMap::new(),
            infos: IndexMap::new(),
            formats: IndexMap::new(),
            contigs: IndexMap::new(),
            other_lines: Vec::new(),
            column_labels: Vec::new(),
            idx_to_id: HashMap::new(),
            contig_idx_to_id: HashMap::new(),
            max_other_idx: 0,
            max_contig_idx: -1,
            file_format_read: false,
        };
        header.add_pass_entry();
        header
    }

    /// Parse a complete plaintext header (the embedded BCF header or the
    /// `##`/`#CHROM` prefix of a VCF file).
    pub fn from_plaintext(text: &str) -> Result<Self> {
        let mut header = Self::new();
        let text = text.trim_end_matches('\0');
        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            header.parse_line(line)?;
        }
        if !header.file_format_read {
            return Err(Error::MissingHeader(
                "no ##fileformat line found".into(),
            ));
        }
        Ok(header)
    }

    /// Sample names, i.e. the column labels after the FORMAT column.
    pub fn samples(&self) -> &[String] {
        self.column_labels.get(9..).unwrap_or(&[])
    }

    pub fn n_samples(&self) -> usize {
        self.column_labels.len().saturating_sub(9)
    }

    /// The largest IDX value in use by filters, infos and formats.
    pub fn max_idx(&self) -> i32 {
        self.max_other_idx
    }

    /// The largest contig IDX value in use.
    pub fn max_contig_idx(&self) -> i32 {
        self.max_contig_idx
    }

    /// Reverse lookup in the shared filter/info/format IDX space.
    pub fn id_for_idx(&self, idx: i32) -> Option<&str> {
        self.idx_to_id.get(&idx).map(String::as_str)
    }

    /// Reverse lookup in the contig IDX space.
    pub fn contig_for_idx(&self, idx: i32) -> Option<&str> {
        self.contig_idx_to_id.get(&idx).map(String::as_str)
    }

    pub fn contig_idx(&self, id: &str) -> Option<i32> {
        self.contigs.get(id).map(|c| c.idx)
    }

    /// Assign a valid IDX to every entry that has none (-1), ensure the
    /// PASS filter is present and rebuild the reverse maps. Existing IDX
    /// values are never changed; obsolete values are not reused (call
    /// [`Header::idx_clear`] first to renumber densely). Idempotent.
    pub fn idx_update(&mut self) -> Result<()> {
        self.idx_to_id.clear();
        self.contig_idx_to_id.clear();

        if !self.filters.contains_key(PASS) {
            self.add_pass_entry();
        }
        for (id, filter) in &mut self.filters {
            if id == PASS {
                filter.idx = 0;
                self.idx_to_id.insert(0, PASS.into());
            } else {
                Self::fix_idx(
                    &mut self.idx_to_id,
                    &mut self.max_other_idx,
                    &mut filter.idx,
                    id,
                )?;
            }
        }
        for (id, info) in &mut self.infos {
            Self::fix_idx(
                &mut self.idx_to_id,
                &mut self.max_other_idx,
                &mut info.idx,
                id,
            )?;
        }
        for (id, format) in &mut self.formats {
            Self::fix_idx(
                &mut self.idx_to_id,
                &mut self.max_other_idx,
                &mut format.idx,
                id,
            )?;
        }
        for (id, contig) in &mut self.contigs {
            Self::fix_idx(
                &mut self.contig_idx_to_id,
                &mut self.max_contig_idx,
                &mut contig.idx,
                id,
            )?;
        }
        Ok(())
    }

    /// Reset every IDX to -1 (PASS stays 0) and clear the reverse maps.
    pub fn idx_clear(&mut self) {
        self.idx_to_id.clear();
        self.contig_idx_to_id.clear();
        self.max_contig_idx = -1;
        self.max_other_idx = 0;

        for (id, filter) in &mut self.filters {
            filter.idx = if id == PASS { 0 } else { -1 };
        }
        for info in self.infos.values_mut() {
            info.idx = -1;
        }
        for format in self.formats.values_mut() {
            format.idx = -1;
        }
        for contig in self.contigs.values_mut() {
            contig.idx = -1;
        }
    }

    /// Check the IDX invariants without modifying anything: PASS present,
    /// no unset or duplicate IDX, reverse maps consistent, and no
    /// `other_lines` entry that should have been parsed structurally.
    pub fn idx_validate(&self) -> Result<()> {
        fn check(
            map: &HashMap<i32, String>,
            idx: i32,
            id: &str,
        ) -> Result<()> {
            if idx == -1 {
                return Err(Error::format(format!(
                    "header entry {} has no IDX value set; call idx_update() first",
                    id
                )));
            }
            match map.get(&idx) {
                None => Err(Error::format(format!(
                    "header entry {} with IDX {} missing from reverse map; call idx_update() first",
                    id, idx
                ))),
                Some(stored) if stored != id => Err(Error::format(format!(
                    "header entry {} with IDX {} reverse-maps to {}; call idx_clear() and idx_update()",
                    id, idx, stored
                ))),
                Some(_) => Ok(()),
            }
        }

        if !self.filters.contains_key(PASS) {
            return Err(Error::format(
                "no header entry for the PASS filter; call idx_update() first",
            ));
        }
        for (id, filter) in &self.filters {
            check(&self.idx_to_id, filter.idx, id)?;
        }
        for (id, info) in &self.infos {
            check(&self.idx_to_id, info.idx, id)?;
        }
        for (id, format) in &self.formats {
            check(&self.idx_to_id, format.idx, id)?;
        }
        for (id, contig) in &self.contigs {
            check(&self.contig_idx_to_id, contig.idx, id)?;
        }
        for line in &self.other_lines {
            for keyword in &["FILTER=", "INFO=", "FORMAT=", "contig="] {
                if line.starts_with(keyword) {
                    return Err(Error::format(format!(
                        "other_lines contains a structured {} header line",
                        &keyword[..keyword.len() - 1]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Plaintext form including IDX fields (what BCF embeds).
    pub fn to_plaintext(&self) -> String {
        self.to_plaintext_impl(true)
    }

    /// Plaintext form without IDX fields (canonical VCF).
    pub fn to_plaintext_without_idx(&self) -> String {
        self.to_plaintext_impl(false)
    }

    fn add_pass_entry(&mut self) {
        let mut filter = HeaderFilter::new(PASS_DESCRIPTION);
        filter.idx = 0;
        self.filters.insert(PASS.into(), filter);
        if self.filters.len() > 1 {
            let last = self.filters.len() - 1;
            self.filters.move_index(last, 0);
        }
        self.idx_to_id.insert(0, PASS.into());
    }

    fn fix_idx(
        idx_to_id: &mut HashMap<i32, String>,
        max_idx: &mut i32,
        idx: &mut i32,
        id: &str,
    ) -> Result<()> {
        if *idx == -1 {
            if let Some((&found, _)) = idx_to_id.iter().find(|(_, v)| v.as_str() == id) {
                *idx = found;
            } else {
                *max_idx += 1;
                *idx = *max_idx;
            }
        }
        match idx_to_id.get(idx) {
            None => {
                idx_to_id.insert(*idx, id.to_owned());
                Ok(())
            }
            Some(stored) if stored == id => Ok(()),
            Some(stored) => Err(Error::format(format!(
                "cannot map IDX {} to {}, already mapped to {}",
                idx, id, stored
            ))),
        }
    }

    /// Interpret one header line (without trailing newline).
    pub(crate) fn parse_line(&mut self, line: &str) -> Result<()> {
        if !self.file_format_read {
            return if let Some(version) = line.strip_prefix("##fileformat=") {
                self.file_format = version.to_owned();
                self.file_format_read = true;
                Ok(())
            } else {
                Err(Error::MissingHeader(
                    "header does not begin with ##fileformat".into(),
                ))
            };
        }
        if line.starts_with("##fileformat=") {
            return Err(Error::format("second ##fileformat line in header"));
        }
        if let Some(body) = line.strip_prefix("##INFO=") {
            self.parse_info_or_format_line(strip_angular_brackets(body)?, true)
        } else if let Some(body) = line.strip_prefix("##FILTER=") {
            self.parse_filter_line(strip_angular_brackets(body)?)
        } else if let Some(body) = line.strip_prefix("##FORMAT=") {
            self.parse_info_or_format_line(strip_angular_brackets(body)?, false)
        } else if let Some(body) = line.strip_prefix("##contig=") {
            self.parse_contig_line(strip_angular_brackets(body)?)
        } else if let Some(body) = line.strip_prefix("#CHROM") {
            self.parse_column_labels_line(body)
        } else if let Some(body) = line.strip_prefix("##") {
            self.other_lines.push(body.to_owned());
            Ok(())
        } else {
            Err(Error::format(
                "header line does not start with ## or #CHROM",
            ))
        }
    }

    fn line_dictionary(body: &str) -> Result<IndexMap<String, String>> {
        let (rest, pairs) = parser::keys_and_values(body)
            .map_err(|_| Error::parse(format!("cannot parse header dictionary: {}", body)))?;
        if !rest.is_empty() {
            return Err(Error::parse(format!(
                "trailing garbage in header dictionary: {}",
                rest
            )));
        }
        Ok(pairs
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect())
    }

    fn parse_info_or_format_line(&mut self, body: &str, is_info: bool) -> Result<()> {
        let what = if is_info { "INFO" } else { "FORMAT" };
        let mut other_fields = Self::line_dictionary(body)?;

        let id = other_fields
            .shift_remove("ID")
            .ok_or_else(|| Error::format(format!("{} line does not contain ID field", what)))?;
        let number = other_fields
            .shift_remove("Number")
            .ok_or_else(|| Error::format(format!("{} line does not contain Number field", what)))
            .and_then(|n| parse_number(&n))?;
        let ty: InfoType = other_fields
            .shift_remove("Type")
            .ok_or_else(|| Error::format(format!("{} line does not contain Type field", what)))
            .and_then(|t| {
                t.parse()
                    .map_err(|_| Error::format(format!("unknown Type {} in {} line", t, what)))
            })?;
        let mut kind = resolve_kind(ty, number)?;
        // IntegerBits stays in other_fields so it survives the round trip.
        if let Some(bits) = other_fields.get("IntegerBits") {
            kind = apply_integer_bits(kind, strip_quotes(bits));
        }
        let description = other_fields
            .shift_remove("Description")
            .map(|d| strip_quotes(&d).to_owned())
            .ok_or_else(|| {
                Error::format(format!("{} line does not contain Description field", what))
            })?;
        let mut idx = -1;
        if let Some(raw) = other_fields.shift_remove("IDX") {
            idx = raw
                .parse()
                .map_err(|_| Error::parse(format!("invalid IDX value {}", raw)))?;
            self.max_other_idx = self.max_other_idx.max(idx);
        }
        Self::fix_idx(&mut self.idx_to_id, &mut self.max_other_idx, &mut idx, &id)?;

        let entry = HeaderInfo {
            number,
            ty,
            kind,
            description,
            other_fields,
            idx,
        };
        let entries = if is_info {
            &mut self.infos
        } else {
            &mut self.formats
        };
        if entries.contains_key(&id) {
            return Err(Error::format(format!(
                "duplicate {} ID {} in header",
                what, id
            )));
        }
        entries.insert(id, entry);
        Ok(())
    }

    fn parse_filter_line(&mut self, body: &str) -> Result<()> {
        let mut other_fields = Self::line_dictionary(body)?;

        let id = other_fields
            .shift_remove("ID")
            .ok_or_else(|| Error::format("FILTER line does not contain ID field"))?;
        let description = other_fields
            .shift_remove("Description")
            .map(|d| strip_quotes(&d).to_owned())
            .ok_or_else(|| Error::format("FILTER line does not contain Description field"))?;
        let mut idx = -1;
        if let Some(raw) = other_fields.shift_remove("IDX") {
            idx = raw
                .parse()
                .map_err(|_| Error::parse(format!("invalid IDX value {}", raw)))?;
            self.max_other_idx = self.max_other_idx.max(idx);
        }
        if id == PASS {
            // a user-provided PASS line replaces the implicit entry in place
            let entry = HeaderFilter {
                description,
                other_fields,
                idx: 0,
            };
            self.filters[PASS] = entry;
            return Ok(());
        }
        Self::fix_idx(&mut self.idx_to_id, &mut self.max_other_idx, &mut idx, &id)?;
        if self.filters.contains_key(&id) {
            return Err(Error::format(format!(
                "duplicate FILTER ID {} in header",
                id
            )));
        }
        self.filters.insert(
            id,
            HeaderFilter {
                description,
                other_fields,
                idx,
            },
        );
        Ok(())
    }

    fn parse_contig_line(&mut self, body: &str) -> Result<()> {
        let mut other_fields = Self::line_dictionary(body)?;

        let id = other_fields
            .shift_remove("ID")
            .ok_or_else(|| Error::format("contig line does not contain ID field"))?;
        let length = match other_fields.shift_remove("length") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::parse(format!("invalid contig length {}", raw)))?,
            None => -1,
        };
        let mut idx = match other_fields.shift_remove("IDX") {
            Some(raw) => {
                let idx: i32 = raw
                    .parse()
                    .map_err(|_| Error::parse(format!("invalid IDX value {}", raw)))?;
                self.max_contig_idx = self.max_contig_idx.max(idx);
                idx
            }
            None => {
                self.max_contig_idx += 1;
                self.max_contig_idx
            }
        };
        Self::fix_idx(
            &mut self.contig_idx_to_id,
            &mut self.max_contig_idx,
            &mut idx,
            &id,
        )?;
        if self.contigs.contains_key(&id) {
            return Err(Error::format(format!(
                "duplicate contig ID {} in header",
                id
            )));
        }
        self.contigs.insert(
            id,
            HeaderContig {
                length,
                other_fields,
                idx,
            },
        );
        Ok(())
    }

    fn parse_column_labels_line(&mut self, body: &str) -> Result<()> {
        self.column_labels = std::iter::once("CHROM")
            .chain(body.split('\t').filter(|s| !s.is_empty()))
            .map(str::to_owned)
            .collect();
        if self.column_labels.len() < 8 {
            return Err(Error::format(
                "#CHROM line declares fewer than 8 columns",
            ));
        }
        if self.column_labels.len() > 8 && self.column_labels[8] != "FORMAT" {
            return Err(Error::format(
                "9th header column must be FORMAT when sample columns are present",
            ));
        }
        Ok(())
    }

    fn to_plaintext_impl(&self, with_idx: bool) -> String {
        let mut out = String::new();

        out.push_str("##fileformat=");
        out.push_str(&self.file_format);
        out.push('\n');

        for (id, filter) in &self.filters {
            out.push_str("##FILTER=<ID=");
            out.push_str(id);
            out.push_str(",Description=");
            out.push_str(&quote_wrap(&filter.description));
            for (key, value) in &filter.other_fields {
                out.push(',');
                out.push_str(key);
                out.push('=');
                out.push_str(value);
            }
            if with_idx {
                out.push_str(",IDX=");
                out.push_str(&filter.idx.to_string());
            }
            out.push_str(">\n");
        }

        for (section, entries) in &[("##INFO=<ID=", &self.infos), ("##FORMAT=<ID=", &self.formats)]
        {
            for (id, info) in entries.iter() {
                out.push_str(section);
                out.push_str(id);
                out.push_str(",Number=");
                out.push_str(&info.number.to_string());
                out.push_str(",Type=");
                out.push_str(&info.ty.to_string());
                out.push_str(",Description=");
                out.push_str(&quote_wrap(&info.description));
                for (key, value) in &info.other_fields {
                    out.push(',');
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                if with_idx {
                    out.push_str(",IDX=");
                    out.push_str(&info.idx.to_string());
                }
                out.push_str(">\n");
            }
        }

        for (id, contig) in &self.contigs {
            out.push_str("##contig=<ID=");
            out.push_str(id);
            if contig.length != -1 {
                out.push_str(",length=");
                out.push_str(&contig.length.to_string());
            }
            for (key, value) in &contig.other_fields {
                out.push(',');
                out.push_str(key);
                out.push('=');
                out.push_str(value);
            }
            if with_idx {
                out.push_str(",IDX=");
                out.push_str(&contig.idx.to_string());
            }
            out.push_str(">\n");
        }

        for line in &self.other_lines {
            out.push_str("##");
            out.push_str(line);
            out.push('\n');
        }

        if self.column_labels.is_empty() {
            out.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
        } else {
            out.push('#');
            out.push_str(&self.column_labels.iter().join("\t"));
            out.push('\n');
        }
        out
    }

    /// Contig IDX for `id`, inserting an unknown contig with length -1.
    /// Returns the IDX and whether an entry was inserted.
    pub(crate) fn ensure_contig(&mut self, id: &str) -> Result<(i32, bool)> {
        if let Some(contig) = self.contigs.get(id) {
            return Ok((contig.idx, false));
        }
        let mut idx = -1;
        Self::fix_idx(
            &mut self.contig_idx_to_id,
            &mut self.max_contig_idx,
            &mut idx,
            id,
        )?;
        self.contigs.insert(
            id.to_owned(),
            HeaderContig {
                length: -1,
                other_fields: IndexMap::new(),
                idx,
            },
        );
        Ok((idx, true))
    }

    /// Filter IDX for `id`, inserting an auto-described entry if unknown.
    pub(crate) fn ensure_filter(&mut self, id: &str) -> Result<(i32, bool)> {
        if let Some(filter) = self.filters.get(id) {
            return Ok((filter.idx, false));
        }
        let mut idx = -1;
        Self::fix_idx(&mut self.idx_to_id, &mut self.max_other_idx, &mut idx, id)?;
        self.filters
            .insert(id.to_owned(), {
                let mut filter = HeaderFilter::new(AUTO_DESCRIPTION);
                filter.idx = idx;
                filter
            });
        Ok((idx, true))
    }

    /// Schema for INFO key `id`, inserting from the reserved table or the
    /// given fallback kind if unknown. Returns the value kind, the
    /// `Number` annotation and whether an entry was inserted.
    pub(crate) fn ensure_info(
        &mut self,
        id: &str,
        fallback: ValueKind,
    ) -> Result<(ValueKind, InfoNumber, bool)> {
        if let Some(info) = self.infos.get(id) {
            return Ok((info.kind, info.number, false));
        }
        let entry = Self::auto_entry(reserved::reserved_info(id), fallback)?;
        let (kind, number) = (entry.kind, entry.number);
        let mut entry = entry;
        Self::fix_idx(
            &mut self.idx_to_id,
            &mut self.max_other_idx,
            &mut entry.idx,
            id,
        )?;
        self.infos.insert(id.to_owned(), entry);
        Ok((kind, number, true))
    }

    /// Schema for FORMAT key `id`, see [`Header::ensure_info`].
    pub(crate) fn ensure_format(
        &mut self,
        id: &str,
        fallback: ValueKind,
    ) -> Result<(ValueKind, InfoNumber, bool)> {
        if let Some(format) = self.formats.get(id) {
            return Ok((format.kind, format.number, false));
        }
        let entry = Self::auto_entry(reserved::reserved_format(id), fallback)?;
        let (kind, number) = (entry.kind, entry.number);
        let mut entry = entry;
        Self::fix_idx(
            &mut self.idx_to_id,
            &mut self.max_other_idx,
            &mut entry.idx,
            id,
        )?;
        self.formats.insert(id.to_owned(), entry);
        Ok((kind, number, true))
    }

    fn auto_entry(
        reserved: Option<&'static reserved::ReservedEntry>,
        fallback: ValueKind,
    ) -> Result<HeaderInfo> {
        match reserved {
            Some(entry) => Ok(HeaderInfo {
                number: entry.number,
                ty: entry.ty,
                kind: entry.kind,
                description: entry.description.to_owned(),
                other_fields: IndexMap::new(),
                idx: -1,
            }),
            None => {
                let (number, ty) = match fallback {
                    ValueKind::Flag => (InfoNumber::Count(0), InfoType::Flag),
                    ValueKind::VecString => (InfoNumber::Unknown, InfoType::String),
                    _ => (InfoNumber::Count(1), InfoType::String),
                };
                let kind = if fallback == ValueKind::Flag {
                    ValueKind::Flag
                } else {
                    fallback
                };
                Ok(HeaderInfo {
                    number,
                    ty,
                    kind,
                    description: AUTO_DESCRIPTION.to_owned(),
                    other_fields: IndexMap::new(),
                    idx: -1,
                })
            }
        }
    }
}

fn strip_angular_brackets(body: &str) -> Result<&str> {
    if body.len() < 2 || !body.starts_with('<') || !body.ends_with('>') {
        return Err(Error::format(
            "structured header line is not enclosed in <...>",
        ));
    }
    Ok(&body[1..body.len() - 1])
}

pub(crate) fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn quote_wrap(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        value.to_owned()
    } else {
        format!("\"{}\"", value)
    }
}

fn parse_number(raw: &str) -> Result<InfoNumber> {
    let (rest, number) = parser::info_number(raw)
        .map_err(|_| Error::parse(format!("invalid Number value {}", raw)))?;
    if !rest.is_empty() {
        return Err(Error::parse(format!("invalid Number value {}", raw)));
    }
    Ok(number)
}
