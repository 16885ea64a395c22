mod lazy;

pub use lazy::RawBcfRecord;

use std::borrow::Cow;

use crate::types::{Text, Value};

/// Read-only access to the fields shared by all record representations.
pub trait VariantRecord {
    fn chrom(&self) -> &str;

    /// 1-based position.
    fn pos(&self) -> u32;

    fn ref_allele(&self) -> Text<'_>;

    fn alt_alleles(&self) -> Vec<Text<'_>>;

    fn qual(&self) -> Option<f32>;

    fn filters(&self) -> Vec<&str>;

    fn info(&self, tag: &[u8]) -> Option<Value<'_>>;

    fn format(&self, tag: &[u8]) -> Option<Vec<Value<'_>>>;
}

/// One variant site: the eight fixed columns plus the per-sample
/// genotype matrix, with all header references resolved to strings.
///
/// `pos` is 1-based; the BCF codec converts to the 0-based on-disk form
/// at the I/O boundary. Genotype values are column-major: one entry per
/// FORMAT key, holding one [`Value`] per sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record<'a> {
    pub chrom: String,
    pub pos: u32,
    pub id: Text<'a>,
    pub ref_allele: Text<'a>,
    pub alt_alleles: Vec<Text<'a>>,
    pub qual: Option<f32>,
    pub filters: Vec<String>,
    pub info: Vec<(String, Value<'a>)>,
    pub genotypes: Vec<(String, Vec<Value<'a>>)>,
}

impl<'a> Record<'a> {
    pub fn into_owned(self) -> Record<'static> {
        Record {
            chrom: self.chrom,
            pos: self.pos,
            id: Cow::Owned(self.id.into_owned()),
            ref_allele: Cow::Owned(self.ref_allele.into_owned()),
            alt_alleles: self
                .alt_alleles
                .into_iter()
                .map(|a| Cow::Owned(a.into_owned()))
                .collect(),
            qual: self.qual,
            filters: self.filters,
            info: self
                .info
                .into_iter()
                .map(|(k, v)| (k, v.into_owned()))
                .collect(),
            genotypes: self
                .genotypes
                .into_iter()
                .map(|(k, vs)| (k, vs.into_iter().map(Value::into_owned).collect()))
                .collect(),
        }
    }

    pub fn n_alts(&self) -> usize {
        self.alt_alleles.len()
    }
}

impl<'a> VariantRecord for Record<'a> {
    fn chrom(&self) -> &str {
        &self.chrom
    }

    fn pos(&self) -> u32 {
        self.pos
    }

    fn ref_allele(&self) -> Text<'_> {
        Cow::Borrowed(self.ref_allele.as_ref())
    }

    fn alt_alleles(&self) -> Vec<Text<'_>> {
        self.alt_alleles
            .iter()
            .map(|a| Cow::Borrowed(a.as_ref()))
            .collect()
    }

    fn qual(&self) -> Option<f32> {
        self.qual
    }

    fn filters(&self) -> Vec<&str> {
        self.filters.iter().map(String::as_str).collect()
    }

    fn info(&self, tag: &[u8]) -> Option<Value<'_>> {
        self.info
            .iter()
            .find(|(key, _)| key.as_bytes() == tag)
            .map(|(_, value)| value.clone())
    }

    fn format(&self, tag: &[u8]) -> Option<Vec<Value<'_>>> {
        self.genotypes
            .iter()
            .find(|(key, _)| key.as_bytes() == tag)
            .map(|(_, values)| values.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accessors_resolve_by_key() {
        let record = Record {
            chrom: "1".into(),
            pos: 100,
            ref_allele: Cow::Borrowed(b"A"),
            alt_alleles: vec![Cow::Borrowed(b"C".as_ref()), Cow::Borrowed(b"T".as_ref())],
            info: vec![("DP".into(), Value::Int32(7))],
            genotypes: vec![(
                "GT".into(),
                vec![
                    Value::String(Cow::Borrowed(b"0/1")),
                    Value::String(Cow::Borrowed(b"1/1")),
                ],
            )],
            ..Record::default()
        };
        assert_eq!(record.n_alts(), 2);
        assert_eq!(record.info(b"DP"), Some(Value::Int32(7)));
        assert_eq!(record.info(b"AF"), None);
        assert_eq!(record.format(b"GT").unwrap().len(), 2);
    }

    #[test]
    fn into_owned_preserves_contents() {
        let record = Record {
            chrom: "X".into(),
            pos: 5,
            id: Cow::Borrowed(b"rs1"),
            ref_allele: Cow::Borrowed(b"G"),
            ..Record::default()
        };
        let owned = record.clone().into_owned();
        assert_eq!(owned.chrom, record.chrom);
        assert_eq!(owned.id.as_ref(), b"rs1");
        assert!(matches!(owned.id, Cow::Owned(_)));
    }
}
