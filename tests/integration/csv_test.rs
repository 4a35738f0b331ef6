//! CSV directive tests against SQLite.

use super::{memory_session, nql, output_text, sink};
use noteql::namespace::Variables;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const AWKWARD_ROWS: &str = r#"SELECT 1 AS id, 'plain' AS note
UNION ALL SELECT 2, 'with, comma'
UNION ALL SELECT 3, 'say "hi"'
UNION ALL SELECT 4, 'two
lines'
UNION ALL SELECT 5, NULL"#;

async fn session_vars() -> Variables {
    let mut vars = Variables::new();
    vars.insert("db", memory_session().await);
    vars
}

#[tokio::test]
async fn test_csv_quotes_awkward_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("awkward.csv");
    let mut vars = session_vars().await;
    let mut out = sink();

    let results = nql()
        .run_cell(
            &format!("CSV '{}'", path.display()),
            AWKWARD_ROWS,
            &mut vars,
            &mut out,
        )
        .await;
    assert!(matches!(results.as_slice(), [Ok(None)]), "{results:?}");

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "id,note\n1,plain\n2,\"with, comma\"\n3,\"say \"\"hi\"\"\"\n4,\"two\nlines\"\n5,\n"
    );
    assert!(output_text(out).contains("Wrote 5 rows to"));
}

#[tokio::test]
async fn test_csv_quoted_path_with_space() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("my report.csv");
    let mut vars = session_vars().await;
    let mut out = sink();

    let result = nql()
        .run_line(
            &format!("CSV '{}' SELECT 'x' AS a, 'y' AS b", path.display()),
            &mut vars,
            &mut out,
        )
        .await
        .unwrap();
    assert!(result.is_none());

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "a,b\nx,y\n");
}

#[tokio::test]
async fn test_csv_bare_path_with_punctuation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report-#1_(final).csv");
    let mut vars = session_vars().await;
    let mut out = sink();

    nql()
        .run_line(
            &format!("CSV {} SELECT 42 AS answer", path.display()),
            &mut vars,
            &mut out,
        )
        .await
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "answer\n42\n");
}

#[tokio::test]
async fn test_csv_renders_template_before_export() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filtered.csv");
    let mut vars = session_vars().await;
    let mut out = sink();

    nql()
        .run_cell(
            &format!("CSV '{}' min=2", path.display()),
            &format!("SELECT id FROM ({AWKWARD_ROWS}) WHERE id > {{{{ min }}}} ORDER BY id"),
            &mut vars,
            &mut out,
        )
        .await;

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "id\n3\n4\n5\n");
}

#[tokio::test]
async fn test_csv_into_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope").join("out.csv");
    let mut vars = session_vars().await;
    let mut out = sink();

    let err = nql()
        .run_line(
            &format!("CSV '{}' SELECT 1 AS a", path.display()),
            &mut vars,
            &mut out,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("I/O error"), "{err}");
    assert!(!path.exists());
}
