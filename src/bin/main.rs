use std::fs::File;
use std::io::BufWriter;

use anyhow::{bail, Context, Result};
use itertools::Itertools;

use varcodec::bcf::{BcfRecords, BcfWriter};
use varcodec::vcf::{VcfRecords, VcfWriter};

fn is_bcf(path: &str) -> bool {
    path.trim_end_matches(".gz").ends_with(".bcf")
}

fn main() -> Result<()> {
    env_logger::init();
    let args = std::env::args().collect_vec();
    if args.len() != 3 {
        bail!("usage: {} <input.vcf|bcf[.gz]> <output.vcf|bcf>", args[0]);
    }
    let input = &args[1];
    let output = &args[2];

    let out = BufWriter::new(
        File::create(output).with_context(|| format!("cannot create {}", output))?,
    );

    match (is_bcf(input), is_bcf(output)) {
        (true, true) => {
            let reader = BcfRecords::from_path(input)?;
            let mut writer = BcfWriter::new(out);
            writer.set_header(reader.header().clone())?;
            for record in reader {
                writer.write_record(&record?)?;
            }
            writer.flush()?;
        }
        (true, false) => {
            let reader = BcfRecords::from_path(input)?;
            let mut writer = VcfWriter::new(out);
            writer.set_header(reader.header().clone())?;
            for record in reader {
                writer.write_record(&record?)?;
            }
            writer.flush()?;
        }
        (false, to_bcf) => {
            // the header may gain auto-inserted entries while records are
            // read, so collect before writing it out
            let mut reader = VcfRecords::from_path(input)?;
            let mut records = Vec::new();
            for record in &mut reader {
                records.push(record?);
            }
            let header = reader.into_header();
            if to_bcf {
                let mut writer = BcfWriter::new(out);
                writer.set_header(header)?;
                for record in &records {
                    writer.write_record(record)?;
                }
                writer.flush()?;
            } else {
                let mut writer = VcfWriter::new(out);
                writer.set_header(header)?;
                for record in &records {
                    writer.write_record(record)?;
                }
                writer.flush()?;
            }
        }
    }
    Ok(())
}
