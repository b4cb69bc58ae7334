pub mod record;
pub mod value;
pub mod format;
pub mod sink;
pub mod sync_writer;
pub mod layer;

pub mod env;
pub mod init;

pub use format::{format_entry, is_tty, Formatter, HumanFormatter};
pub use record::{Entry, Field, Level, SpanContext, SpanId, TraceId};
pub use sink::{Sink, Syncer};
pub use sync_writer::SyncWriter;
