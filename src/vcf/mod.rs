//! The VCF text codec: a line-oriented reader that cooperates with the
//! header to resolve INFO/FORMAT schemas (auto-inserting entries for
//! unknown keys), and the matching writer.

mod reader;
mod writer;

pub use reader::VcfRecords;
pub use writer::VcfWriter;
