// moodlesync-core/src/ports/mod.rs

pub mod sheet;
pub mod source;

pub use sheet::SheetWriter;
pub use source::{RawPayload, RecordParser, SourceFetcher};
