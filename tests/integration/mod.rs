//! Integration tests for noteql.

pub mod csv_test;
pub mod magic_test;
pub mod multi_session_test;
pub mod session_test;

use noteql::config::MagicConfig;
use noteql::magic::Nql;
use noteql::output::TextOutput;
use noteql::session::Session;

/// Opens a session on a private in-memory SQLite database.
pub async fn memory_session() -> Session {
    Session::open("sqlite::memory:").await.unwrap()
}

pub fn nql() -> Nql {
    Nql::new(MagicConfig::default()).unwrap()
}

pub fn sink() -> TextOutput<Vec<u8>> {
    TextOutput::new(Vec::new(), 20)
}

pub fn output_text(sink: TextOutput<Vec<u8>>) -> String {
    String::from_utf8(sink.into_inner()).unwrap()
}
