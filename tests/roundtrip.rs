use std::borrow::Cow;

use varcodec::bcf::{BcfRecords, BcfWriter};
use varcodec::types::{Value, ValueKind, END_OF_VECTOR_INT8};
use varcodec::vcf::{VcfRecords, VcfWriter};
use varcodec::{Error, Header, Record};

const HEADER: &str = "##fileformat=VCFv4.3\n\
##FILTER=<ID=q10,Description=\"Quality below 10\">\n\
##INFO=<ID=NS,Number=1,Type=Integer,Description=\"Number of samples with data\">\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">\n\
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
##FORMAT=<ID=PL,Number=G,Type=Integer,Description=\"Likelihoods\">\n\
##contig=<ID=1>\n\
##contig=<ID=20,length=62435964>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA00001\tNA00002\tNA00003\n";

fn vcf_records(text: &str) -> (Vec<Record<'static>>, Header) {
    let mut reader = VcfRecords::new(text.as_bytes()).unwrap();
    let mut records = Vec::new();
    for record in &mut reader {
        records.push(record.unwrap());
    }
    (records, reader.into_header())
}

fn to_bcf(records: &[Record], header: Header) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut writer = BcfWriter::new(&mut bytes);
    writer.set_header(header).unwrap();
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);
    bytes
}

fn from_bcf(bytes: &[u8]) -> Vec<Record<'static>> {
    BcfRecords::new(bytes)
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

fn to_vcf(records: &[Record], header: Header) -> String {
    let mut bytes = Vec::new();
    {
        let mut writer = VcfWriter::new(&mut bytes);
        writer.set_header(header).unwrap();
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.flush().unwrap();
    }
    String::from_utf8(bytes).unwrap()
}

// S1: six-line minimal file
#[test]
fn s1_minimal_vcf_read() {
    let text = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\t100\t.\tA\tC\t.\t.\t.\n";
    let (records, _) = vcf_records(text);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.chrom, "1");
    assert_eq!(record.pos, 100);
    assert!(record.id.is_empty());
    assert_eq!(record.ref_allele.as_ref(), b"A");
    assert_eq!(record.alt_alleles, vec![Cow::Borrowed(b"C")]);
    assert_eq!(record.qual, None);
    assert!(record.filters.is_empty());
    assert!(record.info.is_empty());
}

// S2: flag and vector INFO values survive a decode/encode cycle
#[test]
fn s2_flag_and_vector_info() {
    let line = "1\t100\t.\tA\tC,T\t.\t.\tNS=3;AF=0.1,0.2;DB\n";
    let text = format!("{}{}", HEADER, line);
    let (records, header) = vcf_records(&text);
    assert_eq!(
        records[0].info,
        vec![
            ("NS".to_owned(), Value::Int32(3)),
            ("AF".to_owned(), Value::VecFloat32(vec![0.1, 0.2])),
            ("DB".to_owned(), Value::Flag),
        ]
    );
    let emitted = to_vcf(&records, header);
    assert!(emitted.ends_with(line), "got: {}", emitted);
}

// S3: GT strings round-trip through the BCF integer encoding
#[test]
fn s3_gt_roundtrip() {
    let gts = ["0|0", "0/1", "1|1"];
    let line = format!(
        "1\t100\t.\tA\tC\t.\t.\t.\tGT\t{}\n",
        gts.iter().map(|s| s.to_string()).collect::<Vec<_>>().join("\t")
    );
    let text = format!("{}{}", HEADER, line);
    let (records, header) = vcf_records(&text);
    let bytes = to_bcf(&records, header);
    let decoded = from_bcf(&bytes);
    let (key, values) = &decoded[0].genotypes[0];
    assert_eq!(key, "GT");
    let rendered: Vec<_> = values
        .iter()
        .map(|v| String::from_utf8(v.string().unwrap().to_vec()).unwrap())
        .collect();
    assert_eq!(rendered, gts);
}

// S4: BAM magic is rejected with a format error
#[test]
fn s4_bcf_magic_validation() {
    let err = BcfRecords::new(&b"BAM\x01\x00\x00\x00\x00\x00"[..]).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
    assert!(err.to_string().contains("BCF magic header"));
}

// S5: unknown INFO key is auto-inserted with a String schema
#[test]
fn s5_auto_insert_unknown_info() {
    let text = "##fileformat=VCFv4.3\n\
##contig=<ID=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\t100\t.\tA\tC\t.\t.\tXY=42\n";
    let (records, header) = vcf_records(text);
    assert_eq!(
        records[0].info,
        vec![("XY".to_owned(), Value::String(Cow::Borrowed(b"42")))]
    );
    let entry = &header.infos["XY"];
    assert_eq!(entry.kind, ValueKind::String);
    assert!(entry.description.contains("Automatically added by"));
    let emitted = header.to_plaintext_without_idx();
    assert!(emitted.contains("##INFO=<ID=XY,Number=1,Type=String,Description=\"Automatically added by"));
}

// S6: a record frame announcing more bytes than the stream holds
#[test]
fn s6_truncated_bcf() {
    let (records, header) = vcf_records(&format!("{}1\t100\t.\tA\tC\t.\t.\tNS=3\n", HEADER));
    let mut bytes = to_bcf(&records, header);
    let len = bytes.len();
    bytes.truncate(len - 4);
    let reader = BcfRecords::new(&bytes[..]).unwrap();
    let err = reader
        .into_iter()
        .find(|r| r.is_err())
        .expect("expected an error")
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("record 0"), "{}", msg);
}

// property 1/2: header round trips
#[test]
fn header_roundtrip_without_idx() {
    let header = Header::from_plaintext(HEADER).unwrap();
    let emitted = header.to_plaintext_without_idx();
    let reparsed = Header::from_plaintext(&emitted).unwrap();
    assert_eq!(header, reparsed);
}

#[test]
fn header_roundtrip_with_idx_fixed_point() {
    let mut header = Header::from_plaintext(HEADER).unwrap();
    header.idx_update().unwrap();
    let first = header.to_plaintext();
    let reparsed = Header::from_plaintext(&first).unwrap();
    assert_eq!(reparsed.to_plaintext(), first);
}

// property 3: BCF record round trip
#[test]
fn bcf_record_roundtrip() {
    let text = format!(
        "{}{}",
        HEADER,
        "20\t14370\trs6054257\tG\tA\t29.5\tPASS\tNS=3;AF=0.5;DB\tGT:PL\t0|0:0,30,300\t0/1:30,0,30\t1/1:300,30,0\n"
    );
    let (records, header) = vcf_records(&text);
    let bytes = to_bcf(&records, header);
    let decoded = from_bcf(&bytes);
    assert_eq!(decoded, records);
}

// property 4: VCF record round trip
#[test]
fn vcf_record_roundtrip() {
    let body = "20\t14370\trs6054257\tG\tA\t29.5\tPASS\tNS=3;AF=0.5;DB\tGT:PL\t0|0:0,30,300\t0/1:30,0,30\t1/1:300,30,0\n";
    let text = format!("{}{}", HEADER, body);
    let (records, header) = vcf_records(&text);
    let emitted = to_vcf(&records, header);
    let (reparsed, _) = vcf_records(&emitted);
    assert_eq!(reparsed, records);
}

// property 5: both codecs produce the same record stream
#[test]
fn cross_codec_equivalence() {
    let text = format!(
        "{}{}{}",
        HEADER,
        "1\t1\t.\tACGT\tA,AC\t.\tq10\tNS=2;AF=0.25,0.5\tGT:PL\t0|2:1,2,3,4,5,6\t./.:.\t2/2\n",
        "20\t17330\t.\tT\tA\t3\tq10\tNS=3;AF=0.017\tGT\t0|0\t0|1\t0/0\n"
    );
    let (records, header) = vcf_records(&text);
    let bytes = to_bcf(&records, header);
    let decoded = from_bcf(&bytes);
    assert_eq!(decoded, records);
}

// property 9: end-of-vector padding does not change the decoded record
#[test]
fn padding_tolerance() {
    let mut header = Header::from_plaintext(HEADER).unwrap();
    header.idx_update().unwrap();
    let text = format!("{}\0", header.to_plaintext());

    let af_idx = header.infos["AF"].idx;
    let build = |padded: bool| {
        let mut shared = Vec::new();
        shared.extend_from_slice(&0i32.to_le_bytes());
        shared.extend_from_slice(&0i32.to_le_bytes());
        shared.extend_from_slice(&1i32.to_le_bytes());
        shared.extend_from_slice(&f32::from_bits(0x7F80_0001).to_le_bytes());
        shared.extend_from_slice(&1u16.to_le_bytes()); // n_info
        shared.extend_from_slice(&1u16.to_le_bytes()); // n_allele
        shared.extend_from_slice(&[0, 0, 0, 0]); // n_sample + n_fmt
        shared.push(0x07); // ID
        shared.extend_from_slice(&[0x17, b'A']); // REF
        shared.push(0x00); // FILTER
        // INFO AF as int8-keyed pair with an int8 vector payload
        shared.extend_from_slice(&[0x11, af_idx as u8]);
        if padded {
            shared.extend_from_slice(&[0x31, 1, 2, END_OF_VECTOR_INT8 as u8]);
        } else {
            shared.extend_from_slice(&[0x21, 1, 2]);
        }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BCF\x02\x02");
        bytes.extend_from_slice(&(text.len() as u32).to_le_bytes());
        bytes.extend_from_slice(text.as_bytes());
        bytes.extend_from_slice(&(shared.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&shared);
        bytes
    };

    let plain = from_bcf(&build(false));
    let padded = from_bcf(&build(true));
    assert_eq!(plain, padded);
}

// zero-record BCF: valid header then EOF
#[test]
fn empty_bcf_stream() {
    let header = Header::from_plaintext(HEADER).unwrap();
    let bytes = to_bcf(&[], header);
    let mut reader = BcfRecords::new(&bytes[..]).unwrap();
    assert_eq!(reader.header().samples().len(), 3);
    assert!(reader.next().is_none());
}

// BCF 2.1 streams are accepted
#[test]
fn bcf_version_2_1_accepted() {
    let header = Header::from_plaintext(HEADER).unwrap();
    let mut bytes = to_bcf(&[], header);
    bytes[4] = 1; // minor version
    assert!(BcfRecords::new(&bytes[..]).is_ok());
}

// writer without header fails with missing_header_error
#[test]
fn writers_require_header() {
    let mut bcf = BcfWriter::new(Vec::new());
    assert!(matches!(
        bcf.write_record(&Record::default()),
        Err(Error::MissingHeader(_))
    ));
    let mut vcf = VcfWriter::new(Vec::new());
    assert!(matches!(
        vcf.write_record(&Record::default()),
        Err(Error::MissingHeader(_))
    ));
}

// a VCF->BCF->VCF cycle reproduces the record lines
#[test]
fn vcf_bcf_vcf_cycle() {
    let body = "20\t14370\trs6054257\tG\tA\t29.5\tPASS\tNS=3;AF=0.5;DB\tGT:PL\t0|0:0,30,300\t0/1:30,0,30\t1/1:300,30,0\n";
    let text = format!("{}{}", HEADER, body);
    let (records, header) = vcf_records(&text);
    let bytes = to_bcf(&records, header.clone());
    let decoded = from_bcf(&bytes);
    let emitted = to_vcf(&decoded, header);
    assert!(emitted.ends_with(body), "got: {}", emitted);
}
