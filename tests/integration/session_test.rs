//! Session tests against SQLite, plus Postgres when DATABASE_URL is set.

use super::memory_session;
use noteql::config::SessionConfig;
use noteql::db::{QueryOutput, Value};
use noteql::directive::QualifiedName;
use noteql::error::NqlError;
use noteql::session::Session;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres"))
}

#[tokio::test]
async fn test_execute_reports_rows_or_done() {
    let session = memory_session().await;

    let output = session
        .execute("CREATE TABLE t (id INTEGER, name TEXT)", &[])
        .await
        .unwrap();
    assert!(matches!(output, QueryOutput::Done { .. }));

    let output = session
        .execute(
            "INSERT INTO t VALUES (?, ?), (?, ?)",
            &[
                Value::Int(1),
                Value::from("one"),
                Value::Int(2),
                Value::Null,
            ],
        )
        .await
        .unwrap();
    assert!(matches!(output, QueryOutput::Done { rows_affected: 2 }));

    let frame = session
        .get_dataframe("SELECT id, name FROM t ORDER BY id", &[])
        .await
        .unwrap();
    assert_eq!(frame.headings(), vec!["id", "name"]);
    assert_eq!(frame.rows[1], vec![Value::Int(2), Value::Null]);
}

#[tokio::test]
async fn test_get_dataframe_for_statement_without_rows() {
    let session = memory_session().await;
    let frame = session
        .get_dataframe("CREATE TABLE x (a INTEGER)", &[])
        .await
        .unwrap();
    assert!(frame.columns.is_empty());
    assert!(frame.is_empty());
}

#[tokio::test]
async fn test_create_table_replaces_contents() {
    let session = memory_session().await;
    let name = QualifiedName::bare("nums");

    session
        .create_table(&name, "SELECT 1 AS n UNION ALL SELECT 2", &[])
        .await
        .unwrap();
    session
        .create_table(&name, "SELECT ? AS n", &[Value::Int(7)])
        .await
        .unwrap();

    let frame = session.get_dataframe("SELECT n FROM nums", &[]).await.unwrap();
    assert_eq!(frame.rows, vec![vec![Value::Int(7)]]);
}

#[tokio::test]
async fn test_failed_create_still_drops_old_table() {
    let session = memory_session().await;
    let name = QualifiedName::bare("t");
    session.create_table(&name, "SELECT 1 AS a", &[]).await.unwrap();

    let err = session
        .create_table(&name, "SELECT * FROM missing", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, NqlError::Backend(_)));

    let err = session.get_dataframe("SELECT * FROM t", &[]).await.unwrap_err();
    assert!(err.to_string().contains("no such table"));
}

#[tokio::test]
async fn test_quoted_table_name() {
    let session = memory_session().await;
    let name = QualifiedName::parse(r#""My ""Odd"" Table""#).unwrap();
    session.create_table(&name, "SELECT 1 AS a", &[]).await.unwrap();

    let frame = session
        .get_dataframe(r#"SELECT a FROM "My ""Odd"" Table""#, &[])
        .await
        .unwrap();
    assert_eq!(frame.row_count(), 1);
}

#[tokio::test]
async fn test_sqlite_rejects_schema() {
    let err = Session::connect(&SessionConfig::new("sqlite::memory:").with_schema("s"))
        .await
        .unwrap_err();
    assert!(matches!(err, NqlError::Config(_)));
}

#[tokio::test]
async fn test_unsupported_url() {
    let err = Session::open("mysql://localhost/db").await.unwrap_err();
    assert!(matches!(err, NqlError::Config(_)));
}

#[tokio::test]
async fn test_postgres_schema_scoping() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let config = SessionConfig {
        drop_schema: true,
        ..SessionConfig::new(url).with_schema("noteql_test")
    };
    let session = Session::connect(&config).await.unwrap();

    session
        .create_table(&QualifiedName::bare("scoped"), "SELECT 1 AS a", &[])
        .await
        .unwrap();

    let frame = session
        .get_dataframe(
            "SELECT table_schema FROM information_schema.tables WHERE table_name = $1",
            &[Value::from("scoped")],
        )
        .await
        .unwrap();
    assert_eq!(frame.cell(), Some(&Value::from("noteql_test")));

    let frame = session
        .get_dataframe("SELECT current_schema()", &[])
        .await
        .unwrap();
    assert_eq!(frame.cell(), Some(&Value::from("noteql_test")));

    session.client().close().await.unwrap();
}
