//! Reserved INFO and FORMAT keys from the VCF 4.3 specification.
//!
//! When a record mentions a key the header does not declare, these tables
//! are consulted before a generic String-typed entry is invented. The
//! tables are process-wide constants; extending them is a build-time
//! customisation, not a runtime one.

use crate::header::{InfoNumber, InfoType};
use crate::types::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservedEntry {
    pub number: InfoNumber,
    pub ty: InfoType,
    pub kind: ValueKind,
    pub description: &'static str,
}

const fn entry(
    number: InfoNumber,
    ty: InfoType,
    kind: ValueKind,
    description: &'static str,
) -> ReservedEntry {
    ReservedEntry {
        number,
        ty,
        kind,
        description,
    }
}

#[rustfmt::skip]
pub const RESERVED_INFOS: &[(&str, ReservedEntry)] = &[
    ("AA",        entry(InfoNumber::Count(1),         InfoType::String,  ValueKind::String,     "Ancestral allele")),
    ("AC",        entry(InfoNumber::AlternateAlleles, InfoType::Integer, ValueKind::VecInt32,   "Allele count in genotypes, for each ALT allele, in the same order as listed")),
    ("AD",        entry(InfoNumber::Alleles,          InfoType::Integer, ValueKind::VecInt32,   "Total read depth for each allele")),
    ("ADF",       entry(InfoNumber::Alleles,          InfoType::Integer, ValueKind::VecInt32,   "Read depth for each allele on the forward strand")),
    ("ADR",       entry(InfoNumber::Alleles,          InfoType::Integer, ValueKind::VecInt32,   "Read depth for each allele on the reverse strand")),
    ("AF",        entry(InfoNumber::AlternateAlleles, InfoType::Float,   ValueKind::VecFloat32, "Allele frequency for each ALT allele in the same order as listed")),
    ("AN",        entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Total number of alleles in called genotypes")),
    ("BQ",        entry(InfoNumber::Count(1),         InfoType::Float,   ValueKind::Float32,    "RMS base quality")),
    ("CIGAR",     entry(InfoNumber::AlternateAlleles, InfoType::String,  ValueKind::VecString,  "Cigar string describing how to align an alternate allele to the reference allele")),
    ("DB",        entry(InfoNumber::Count(0),         InfoType::Flag,    ValueKind::Flag,       "dbSNP membership")),
    ("DP",        entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Combined depth across samples")),
    ("END",       entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "End position on CHROM (used with symbolic alleles; see below)")),
    ("H2",        entry(InfoNumber::Count(0),         InfoType::Flag,    ValueKind::Flag,       "HapMap2 membership")),
    ("H3",        entry(InfoNumber::Count(0),         InfoType::Flag,    ValueKind::Flag,       "HapMap3 membership")),
    ("MQ",        entry(InfoNumber::Count(1),         InfoType::Float,   ValueKind::Float32,    "RMS mapping quality")),
    ("MQ0",       entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Number of MAPQ == 0 reads")),
    ("NS",        entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Number of samples with data")),
    ("SB",        entry(InfoNumber::Count(4),         InfoType::Integer, ValueKind::VecInt32,   "Strand bias")),
    ("SOMATIC",   entry(InfoNumber::Count(0),         InfoType::Flag,    ValueKind::Flag,       "Somatic mutation (for cancer genomics)")),
    ("VALIDATED", entry(InfoNumber::Count(0),         InfoType::Flag,    ValueKind::Flag,       "Validated by follow-up experiment")),
    ("1000G",     entry(InfoNumber::Count(0),         InfoType::Flag,    ValueKind::Flag,       "1000 Genomes membership")),
];

#[rustfmt::skip]
pub const RESERVED_FORMATS: &[(&str, ReservedEntry)] = &[
    ("AD",  entry(InfoNumber::Alleles,          InfoType::Integer, ValueKind::VecInt32,   "Read depth for each allele")),
    ("ADF", entry(InfoNumber::Alleles,          InfoType::Integer, ValueKind::VecInt32,   "Read depth for each allele on the forward strand")),
    ("ADR", entry(InfoNumber::Alleles,          InfoType::Integer, ValueKind::VecInt32,   "Read depth for each allele on the reverse strand")),
    ("DP",  entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Read depth")),
    ("EC",  entry(InfoNumber::AlternateAlleles, InfoType::Integer, ValueKind::VecInt32,   "Expected alternate allele counts")),
    ("FT",  entry(InfoNumber::Count(1),         InfoType::String,  ValueKind::String,     "Filter indicating if this genotype was “called”")),
    ("GL",  entry(InfoNumber::Genotypes,        InfoType::Float,   ValueKind::VecFloat32, "Genotype likelihoods")),
    ("GP",  entry(InfoNumber::Genotypes,        InfoType::Float,   ValueKind::VecFloat32, "Genotype posterior probabilities")),
    ("GQ",  entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Conditional genotype quality")),
    ("GT",  entry(InfoNumber::Count(1),         InfoType::String,  ValueKind::String,     "Genotype")),
    ("HQ",  entry(InfoNumber::Count(2),         InfoType::Integer, ValueKind::VecInt32,   "Haplotype quality")),
    ("LAA", entry(InfoNumber::Unknown,          InfoType::Integer, ValueKind::VecInt32,   "Strictly increasing, 1-based indices into ALT, indicating which alternate alleles are relevant (local) for the current sample")),
    ("LAD", entry(InfoNumber::Unknown,          InfoType::Integer, ValueKind::VecInt32,   "Read depth for the reference and each of the local alternate alleles listed in LAA")),
    ("LGT", entry(InfoNumber::Unknown,          InfoType::String,  ValueKind::VecString,  "Genotype against the local alleles")),
    ("LPL", entry(InfoNumber::Unknown,          InfoType::Integer, ValueKind::VecInt32,   "Phred-scaled genotype likelihoods rounded to the closest integer for genotypes that involve the reference and the local alternative alleles listed in LAA")),
    ("MQ",  entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "RMS mapping quality")),
    ("PL",  entry(InfoNumber::Genotypes,        InfoType::Integer, ValueKind::VecInt32,   "Phred-scaled genotype likelihoods rounded to the closest integer")),
    ("PP",  entry(InfoNumber::Genotypes,        InfoType::Integer, ValueKind::VecInt32,   "Phred-scaled genotype posterior probabilities rounded to the closest integer")),
    ("PQ",  entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Phasing quality")),
    ("PS",  entry(InfoNumber::Count(1),         InfoType::Integer, ValueKind::Int32,      "Phase set")),
];

pub fn reserved_info(id: &str) -> Option<&'static ReservedEntry> {
    RESERVED_INFOS
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, entry)| entry)
}

pub fn reserved_format(id: &str) -> Option<&'static ReservedEntry> {
    RESERVED_FORMATS
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, entry)| entry)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_sizes() {
        assert_eq!(RESERVED_INFOS.len(), 21);
        assert_eq!(RESERVED_FORMATS.len(), 20);
    }

    #[test]
    fn lookup_known_keys() {
        let af = reserved_info("AF").unwrap();
        assert_eq!(af.number, InfoNumber::AlternateAlleles);
        assert_eq!(af.kind, ValueKind::VecFloat32);

        let gt = reserved_format("GT").unwrap();
        assert_eq!(gt.ty, InfoType::String);
        assert_eq!(gt.kind, ValueKind::String);

        assert!(reserved_info("XY").is_none());
        assert!(reserved_format("AA").is_none());
    }

    #[test]
    fn flags_have_number_zero() {
        for (_, entry) in RESERVED_INFOS {
            if entry.ty == InfoType::Flag {
                assert_eq!(entry.number, InfoNumber::Count(0));
            }
        }
    }
}
