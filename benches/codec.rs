use std::borrow::Cow;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use varcodec::bcf::{BcfRecords, BcfWriter};
use varcodec::types::Value;
use varcodec::vcf::VcfWriter;
use varcodec::{Header, Record};

const HEADER: &str = "##fileformat=VCFv4.3\n\
##contig=<ID=1,length=248956422>\n\
##INFO=<ID=NS,Number=1,Type=Integer,Description=\"Number of samples with data\">\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
##FORMAT=<ID=PL,Number=G,Type=Integer,Description=\"Likelihoods\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3\n";

fn synthetic_records(n: usize) -> Vec<Record<'static>> {
    (0..n)
        .map(|i| Record {
            chrom: "1".into(),
            pos: (i as u32 + 1) * 100,
            ref_allele: Cow::Borrowed(b"A"),
            alt_alleles: vec![Cow::Borrowed(b"C".as_ref())],
            qual: Some(30.0 + i as f32 % 10.0),
            filters: vec!["PASS".into()],
            info: vec![
                ("NS".into(), Value::Int32(3)),
                ("AF".into(), Value::VecFloat32(vec![0.125])),
            ],
            genotypes: vec![
                (
                    "GT".into(),
                    vec![
                        Value::String(Cow::Borrowed(b"0|0".as_ref())),
                        Value::String(Cow::Borrowed(b"0/1".as_ref())),
                        Value::String(Cow::Borrowed(b"1|1".as_ref())),
                    ],
                ),
                (
                    "PL".into(),
                    vec![
                        Value::VecInt32(vec![0, 30, 300]),
                        Value::VecInt32(vec![30, 0, 30]),
                        Value::VecInt32(vec![300, 30, 0]),
                    ],
                ),
            ],
            ..Record::default()
        })
        .collect()
}

fn encode_bcf(records: &[Record]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut writer = BcfWriter::new(&mut bytes);
    writer
        .set_header(Header::from_plaintext(HEADER).unwrap())
        .unwrap();
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);
    bytes
}

fn benchmark_bcf_encode(c: &mut Criterion) {
    let records = synthetic_records(1000);
    let mut group = c.benchmark_group("BCF_ENCODE");
    group.bench_function("1000_records", |b| {
        b.iter(|| black_box(encode_bcf(&records)))
    });
}

fn benchmark_bcf_decode(c: &mut Criterion) {
    let bytes = encode_bcf(&synthetic_records(1000));
    let mut group = c.benchmark_group("BCF_DECODE");
    group.bench_function("1000_records", |b| {
        b.iter(|| {
            let records = BcfRecords::new(black_box(&bytes[..])).unwrap();
            records.map(|r| r.unwrap()).count()
        })
    });
}

fn benchmark_bcf_decode_lazy(c: &mut Criterion) {
    let bytes = encode_bcf(&synthetic_records(1000));
    let mut group = c.benchmark_group("BCF_DECODE_LAZY");
    group.bench_function("1000_records", |b| {
        b.iter(|| {
            let mut records = BcfRecords::new(black_box(&bytes[..])).unwrap();
            let mut n = 0;
            while let Some(record) = records.next_raw().unwrap() {
                n += varcodec::VariantRecord::pos(&record) as usize;
            }
            n
        })
    });
}

fn benchmark_vcf_encode(c: &mut Criterion) {
    let records = synthetic_records(1000);
    let mut group = c.benchmark_group("VCF_ENCODE");
    group.bench_function("1000_records", |b| {
        b.iter(|| {
            let mut bytes = Vec::new();
            let mut writer = VcfWriter::new(&mut bytes);
            writer
                .set_header(Header::from_plaintext(HEADER).unwrap())
                .unwrap();
            for record in &records {
                writer.write_record(record).unwrap();
            }
            writer.flush().unwrap();
            drop(writer);
            black_box(bytes)
        })
    });
}

criterion_group!(
    benches,
    benchmark_bcf_encode,
    benchmark_bcf_decode,
    benchmark_bcf_decode_lazy,
    benchmark_vcf_encode
);
criterion_main!(benches);
