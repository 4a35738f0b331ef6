//! Choosing between several sessions bound in the same namespace.

use super::{memory_session, nql, sink};
use noteql::db::Value;
use noteql::error::NqlError;
use noteql::namespace::{Namespace, Variable, Variables};
use pretty_assertions::assert_eq;

async fn two_sessions() -> Variables {
    let mut vars = Variables::new();
    vars.insert("s1", memory_session().await);
    vars.insert("s2", memory_session().await);
    vars
}

fn cell(vars: &Variables, name: &str) -> Value {
    vars.get(name)
        .and_then(Variable::as_value)
        .cloned()
        .unwrap_or_default()
}

#[tokio::test]
async fn test_two_sessions_without_activation_is_ambiguous() {
    let mut vars = two_sessions().await;
    let mut out = sink();

    let err = nql()
        .run_line("SELECT 1", &mut vars, &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, NqlError::Config(_)));
    assert!(err.to_string().contains("s1, s2"), "{err}");
}

#[tokio::test]
async fn test_latest_activation_is_used_without_session_directive() {
    let mut vars = two_sessions().await;
    let mut out = sink();

    nql()
        .run_line("SESSION s1 CREATE t SELECT 'one' AS v", &mut vars, &mut out)
        .await
        .unwrap();
    nql()
        .run_line("SESSION s2 CREATE t SELECT 'two' AS v", &mut vars, &mut out)
        .await
        .unwrap();

    nql()
        .run_line("v=CELL SELECT v FROM t", &mut vars, &mut out)
        .await
        .unwrap();
    assert_eq!(cell(&vars, "v"), Value::from("two"));

    nql()
        .run_line("SESSION s1", &mut vars, &mut out)
        .await
        .unwrap();
    nql()
        .run_line("v=CELL SELECT v FROM t", &mut vars, &mut out)
        .await
        .unwrap();
    assert_eq!(cell(&vars, "v"), Value::from("one"));
}

#[tokio::test]
async fn test_session_directive_overrides_and_reactivates() {
    let mut vars = two_sessions().await;
    let mut out = sink();

    nql()
        .run_line("SESSION s1 CREATE only_in_s1 SELECT 1 AS a", &mut vars, &mut out)
        .await
        .unwrap();

    let err = nql()
        .run_line("SESSION s2 SELECT * FROM only_in_s1", &mut vars, &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, NqlError::Backend(_)));
    assert!(err.to_string().contains("no such table"), "{err}");

    // s2 stays active even though its block failed
    let err = nql()
        .run_line("SELECT * FROM only_in_s1", &mut vars, &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no such table"), "{err}");
}

#[tokio::test]
async fn test_session_directive_in_cell_blocks() {
    let mut vars = two_sessions().await;
    let mut out = sink();
    let body = "SELECT 'first' AS v\n%%nql SESSION s2 w=CELL\nSELECT 'second' AS v\n%%nql x=CELL\nSELECT 'third' AS v";

    let results = nql()
        .run_cell("SESSION s1 v=CELL", body, &mut vars, &mut out)
        .await;
    assert!(results.iter().all(|r| r.is_ok()), "{results:?}");

    let marker = |name: &str| {
        vars.get(name)
            .and_then(Variable::as_session)
            .and_then(|s| s.activation())
            .unwrap()
    };
    assert!(marker("s2") > marker("s1"));
    assert_eq!(cell(&vars, "x"), Value::from("third"));
}

#[tokio::test]
async fn test_unknown_session_name() {
    let mut vars = two_sessions().await;
    vars.insert("not_a_session", Value::Int(1));
    let mut out = sink();

    for line in ["SESSION missing SELECT 1", "SESSION not_a_session SELECT 1"] {
        let err = nql().run_line(line, &mut vars, &mut out).await.unwrap_err();
        assert!(matches!(err, NqlError::Binding(_)), "{line}: {err}");
    }
}
