pub mod error;
pub mod models;
pub mod parser;

pub use error::ParseError;
pub use models::{IdentityUpdate, KillRecord, LineKind, Match};
pub use parser::{parse_lines, parse_log, parse_log_file, LogSource, MatchLogParser};
