//! End-to-end tests of the magic against SQLite.

use super::{memory_session, nql, output_text, sink};
use noteql::db::{Record, Value};
use noteql::error::NqlError;
use noteql::namespace::{Namespace, Variable, Variables};
use pretty_assertions::assert_eq;

const SIMPLE_QUERY: &str = "SELECT 'a' atitle, 'b' btitle UNION ALL SELECT 'aa', 'bb' UNION ALL SELECT 'aaa', 'bbb'";

const LONG_TITLES: &str = "SELECT * FROM test WHERE length(atitle) > 1";

fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

fn value<'a>(vars: &'a Variables, name: &str) -> &'a Value {
    vars.get(name)
        .and_then(Variable::as_value)
        .unwrap_or_else(|| panic!("variable '{name}' not set"))
}

async fn with_test_table() -> Variables {
    let mut vars = Variables::new();
    vars.insert("db", memory_session().await);
    let mut out = sink();
    let results = nql()
        .run_cell("CREATE test", SIMPLE_QUERY, &mut vars, &mut out)
        .await;
    assert!(matches!(results.as_slice(), [Ok(None)]), "{results:?}");
    vars
}

#[tokio::test]
async fn test_create_table_then_select() {
    let mut vars = with_test_table().await;
    let mut out = sink();

    let frame = nql()
        .run_line(LONG_TITLES, &mut vars, &mut out)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(frame.headings(), vec!["atitle", "btitle"]);
    assert_eq!(
        frame.rows,
        vec![
            vec![Value::from("aa"), Value::from("bb")],
            vec![Value::from("aaa"), Value::from("bbb")],
        ]
    );
    let shown = output_text(out);
    assert!(shown.contains("atitle │ btitle"));
    assert!(shown.contains("(2 rows)"));
}

#[tokio::test]
async fn test_every_assign_form_from_one_query() {
    let mut vars = with_test_table().await;
    let mut out = sink();
    let directive = "col=COL cols=COLS row=ROW rows=ROWS cell=CELL record=RECORD records=RECORDS headings=HEADINGS sql=SQL df=DF";

    let results = nql()
        .run_cell(directive, LONG_TITLES, &mut vars, &mut out)
        .await;
    assert!(matches!(results.as_slice(), [Ok(None)]), "{results:?}");

    assert_eq!(value(&vars, "headings"), &strings(&["atitle", "btitle"]));
    assert_eq!(value(&vars, "cell"), &Value::from("aa"));
    assert_eq!(value(&vars, "row"), &strings(&["aa", "bb"]));
    assert_eq!(value(&vars, "col"), &strings(&["aa", "aaa"]));
    assert_eq!(
        value(&vars, "cols"),
        &Value::List(vec![strings(&["aa", "aaa"]), strings(&["bb", "bbb"])])
    );
    assert_eq!(
        value(&vars, "rows"),
        &Value::List(vec![strings(&["aa", "bb"]), strings(&["aaa", "bbb"])])
    );
    assert_eq!(
        value(&vars, "record"),
        &Value::Record(Record::from_iter([("atitle", "aa"), ("btitle", "bb")]))
    );
    assert_eq!(
        value(&vars, "records"),
        &Value::List(vec![
            Value::Record(Record::from_iter([("atitle", "aa"), ("btitle", "bb")])),
            Value::Record(Record::from_iter([("atitle", "aaa"), ("btitle", "bbb")])),
        ])
    );
    assert_eq!(value(&vars, "sql"), &Value::from(LONG_TITLES));

    let df = vars.get("df").and_then(Variable::as_frame).unwrap();
    assert_eq!(df.row_count(), 2);
    assert!(output_text(out).is_empty());
}

#[tokio::test]
async fn test_create_is_idempotent() {
    let mut vars = with_test_table().await;
    let mut out = sink();

    let results = nql()
        .run_cell("CREATE test", SIMPLE_QUERY, &mut vars, &mut out)
        .await;
    assert!(matches!(results.as_slice(), [Ok(None)]));

    nql()
        .run_line("n=CELL SELECT count(*) FROM test", &mut vars, &mut out)
        .await
        .unwrap();
    assert_eq!(value(&vars, "n"), &Value::Int(3));
}

#[tokio::test]
async fn test_view_replaces_view() {
    let mut vars = with_test_table().await;
    let mut out = sink();

    for _ in 0..2 {
        nql()
            .run_line(&format!("VIEW long_titles {LONG_TITLES}"), &mut vars, &mut out)
            .await
            .unwrap();
    }
    nql()
        .run_line("c=COL SELECT atitle FROM long_titles ORDER BY atitle", &mut vars, &mut out)
        .await
        .unwrap();
    assert_eq!(value(&vars, "c"), &strings(&["aa", "aaa"]));
}

#[tokio::test]
async fn test_arguments_and_host_variables() {
    let mut vars = with_test_table().await;
    vars.insert("wanted", strings(&["aa", "aaa"]));
    vars.insert("tbl", Value::from("test"));
    let mut out = sink();

    nql()
        .run_line(
            "out=COL SELECT btitle FROM {{ tbl | i }} WHERE atitle IN {{ wanted | inclause }} ORDER BY btitle",
            &mut vars,
            &mut out,
        )
        .await
        .unwrap();
    assert_eq!(value(&vars, "out"), &strings(&["bb", "bbb"]));

    nql()
        .run_line(
            "prefix='aa' n=CELL SELECT count(*) FROM test WHERE atitle LIKE {{ prefix }} || '%'",
            &mut vars,
            &mut out,
        )
        .await
        .unwrap();
    assert_eq!(value(&vars, "n"), &Value::Int(2));
}

#[tokio::test]
async fn test_argument_shadows_host_variable_without_changing_it() {
    let mut vars = with_test_table().await;
    vars.insert("a", Value::from("a"));
    let mut out = sink();

    nql()
        .run_line(
            "a='aaa' b=CELL SELECT btitle FROM test WHERE atitle = {{ a }}",
            &mut vars,
            &mut out,
        )
        .await
        .unwrap();
    assert_eq!(value(&vars, "b"), &Value::from("bbb"));
    assert_eq!(value(&vars, "a"), &Value::from("a"));
}

#[tokio::test]
async fn test_nojinja_leaves_braces() {
    let mut vars = with_test_table().await;
    let mut out = sink();
    nql()
        .run_line("NOJINJA raw=CELL SELECT '{{ nothing }}'", &mut vars, &mut out)
        .await
        .unwrap();
    assert_eq!(value(&vars, "raw"), &Value::from("{{ nothing }}"));
}

#[tokio::test]
async fn test_missing_table_error_is_native() {
    let mut vars = with_test_table().await;
    let mut out = sink();
    let err = nql()
        .run_line("SELECT * FROM no_such_thing", &mut vars, &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, NqlError::Backend(_)));
    assert!(err.to_string().contains("no such table"), "{err}");
}

#[tokio::test]
async fn test_later_block_error_keeps_earlier_results() {
    let mut vars = with_test_table().await;
    let mut out = sink();
    let body = format!("{LONG_TITLES}\n%%nql\nSELECT {{{{ undefined_variable }}}}\n%%nql total=CELL\nSELECT count(*) FROM test");

    let results = nql().run_cell("", &body, &mut vars, &mut out).await;

    assert_eq!(results.len(), 3);
    let first = results[0].as_ref().unwrap().as_ref().unwrap();
    assert_eq!(first.row_count(), 2);
    assert!(matches!(results[1], Err(NqlError::Binding(_))));
    assert!(matches!(results[2], Ok(None)));
    assert_eq!(value(&vars, "total"), &Value::Int(3));
    assert!(output_text(out).contains("Error in block 2"));
}

#[tokio::test]
async fn test_blocks_see_earlier_assignments() {
    let mut vars = with_test_table().await;
    let mut out = sink();
    let body = "SELECT max(atitle) FROM test\n%%nql b=CELL\nSELECT btitle FROM test WHERE atitle = {{ top }}";

    let results = nql().run_cell("top=CELL", body, &mut vars, &mut out).await;
    assert!(results.iter().all(|r| r.is_ok()), "{results:?}");
    assert_eq!(value(&vars, "b"), &Value::from("bbb"));
}

#[tokio::test]
async fn test_title_and_preview() {
    let mut vars = with_test_table().await;
    let mut out = noteql::output::TextOutput::new(Vec::new(), 1);
    nql()
        .run_line("TITLE 'All titles' 2 SELECT * FROM test", &mut vars, &mut out)
        .await
        .unwrap();

    let shown = output_text(out);
    assert!(shown.starts_with("## All titles\n"));
    assert!(shown.contains("Result truncated: showing 1 of 3 rows"));
}

#[tokio::test]
async fn test_cell_directive_names_that_are_ddl_words() {
    let mut vars = with_test_table().await;
    let mut out = sink();
    let body = format!("{LONG_TITLES}\n%%nql VIEW user\nSELECT atitle FROM type");

    let results = nql().run_cell("CREATE type", &body, &mut vars, &mut out).await;
    assert!(matches!(results.as_slice(), [Ok(None), Ok(None)]), "{results:?}");

    nql()
        .run_line("c=COL SELECT atitle FROM user ORDER BY atitle", &mut vars, &mut out)
        .await
        .unwrap();
    assert_eq!(value(&vars, "c"), &strings(&["aa", "aaa"]));
}
