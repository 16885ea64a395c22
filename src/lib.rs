pub(crate) mod parser;

pub mod bcf;
pub mod errors;
pub mod header;
pub mod options;
pub mod record;
pub mod types;
pub mod vcf;

pub use errors::{Error, Result};
pub use header::Header;
pub use options::Options;
pub use record::{RawBcfRecord, Record, VariantRecord};

/// The shared-ownership pointer used for headers: `Rc` by default, `Arc`
/// with the `sync` feature.
#[cfg(not(feature = "sync"))]
pub use std::rc::Rc as Shared;
#[cfg(feature = "sync")]
pub use std::sync::Arc as Shared;
