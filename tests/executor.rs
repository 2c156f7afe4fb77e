//! Script execution against in-memory collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use sqlweave::binder::{Binder, BoundScript};
use sqlweave::engine::{
    ExecutionContext, FileTransport, MemoryQueue, QueryBackend, Record, ScriptExecutor, StatementOutcome,
    TransportRegistry, VarValue,
};
use sqlweave::error::ExecutionError;
use sqlweave::prelude::{DataType, MemoryCatalog, Value};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
struct Call {
    target: String,
    command: String,
    params: Vec<Value>,
}

/// Records every command and answers with canned rows.
#[derive(Default)]
struct RecordingBackend {
    opened: Mutex<Vec<String>>,
    calls: Mutex<Vec<Call>>,
    rows: Vec<Record>,
    affected: u64,
}

impl RecordingBackend {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, target: &str, command: &str, params: &[Value]) {
        self.calls.lock().unwrap().push(Call {
            target: target.to_string(),
            command: command.to_string(),
            params: params.to_vec(),
        });
    }
}

#[async_trait]
impl QueryBackend for RecordingBackend {
    async fn open(&self, target: &str) -> Result<(), ExecutionError> {
        self.opened.lock().unwrap().push(target.to_string());
        Ok(())
    }

    async fn fetch(&self, target: &str, command: &str, params: &[Value]) -> Result<Vec<Record>, ExecutionError> {
        self.record(target, command, params);
        Ok(self.rows.clone())
    }

    async fn execute(&self, target: &str, command: &str, params: &[Value]) -> Result<u64, ExecutionError> {
        self.record(target, command, params);
        Ok(self.affected)
    }
}

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_table("users", &[("id", DataType::Int), ("email", DataType::Text)])
        .with_table(
            "orders",
            &[("id", DataType::Int), ("user_id", DataType::Int), ("total", DataType::Float)],
        )
        .with_table("inbox", &[("id", DataType::Int), ("body", DataType::Text)])
}

fn bind(text: &str, variables: &[&str]) -> BoundScript {
    let script = sqlweave::parse(text).unwrap();
    Binder::new(&catalog())
        .with_variables(variables)
        .bind(script)
        .unwrap()
}

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn message(id: i64) -> Record {
    record(&[("id", Value::Int(id)), ("body", Value::String(format!("m{id}")))])
}

struct Harness {
    backend: Arc<RecordingBackend>,
    queue: Arc<MemoryQueue>,
    executor: ScriptExecutor,
}

fn harness(backend: RecordingBackend) -> Harness {
    let backend = Arc::new(backend);
    let queue = Arc::new(MemoryQueue::new());
    let transports = TransportRegistry::new()
        .with("queue", queue.clone())
        .with("file", Arc::new(FileTransport::new()));
    let executor = ScriptExecutor::new(backend.clone()).with_transports(transports);
    Harness {
        backend,
        queue,
        executor,
    }
}

#[tokio::test]
async fn test_use_switches_dialect_and_params_come_from_variables() {
    let h = harness(RecordingBackend::default());
    let script = bind(
        "USE 'postgres://db/{env}';\n\
         SELECT id, email FROM users WHERE id > @floor;\n\
         USE 'mysql://db/{env}';\n\
         SELECT id FROM users WHERE id = @floor AND email <> 'x'",
        &["floor"],
    );
    let mut context = ExecutionContext::new();
    context.set_variable("env", VarValue::Scalar(Value::String("app".into())));
    context.set_variable("FLOOR", VarValue::Scalar(Value::Int(3)));

    let report = h.executor.execute(&script, &mut context).await.unwrap();

    assert_eq!(
        report.results[0].outcome,
        StatementOutcome::TargetChanged("postgres database".into())
    );
    assert_eq!(
        report.results[2].outcome,
        StatementOutcome::TargetChanged("mysql database".into())
    );
    assert_eq!(
        *h.backend.opened.lock().unwrap(),
        vec!["postgres://db/app".to_string(), "mysql://db/app".to_string()]
    );
    assert_eq!(
        h.backend.calls(),
        vec![
            Call {
                target: "postgres://db/app".into(),
                command: "SELECT id, email FROM users WHERE id > $1".into(),
                params: vec![Value::Int(3)],
            },
            Call {
                target: "mysql://db/app".into(),
                command: "SELECT id FROM users WHERE id = ? AND email <> ?".into(),
                params: vec![Value::Int(3), Value::String("x".into())],
            },
        ]
    );
}

#[tokio::test]
async fn test_delete_reports_rows_only_with_output() {
    let h = harness(RecordingBackend {
        rows: vec![record(&[("id", Value::Int(9))])],
        affected: 4,
        ..Default::default()
    });
    let script = bind(
        "USE 'postgres://db/app';\n\
         DELETE FROM orders WHERE total > 10;\n\
         DELETE FROM orders OUTPUT deleted.id WHERE total > 100",
        &[],
    );

    let report = h.executor.execute(&script, &mut ExecutionContext::new()).await.unwrap();

    assert_eq!(report.results[1].outcome, StatementOutcome::Affected(4));
    assert_eq!(
        report.results[2].outcome,
        StatementOutcome::Rows(vec![record(&[("id", Value::Int(9))])])
    );
    assert_eq!(
        h.backend.calls()[1].command,
        "DELETE FROM orders WHERE total > $1 RETURNING orders.id"
    );
    assert_eq!(report.last_rows().map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn test_consume_takes_matches_in_order_then_sorts() {
    let h = harness(RecordingBackend::default());
    for id in [4, 2, 6, 1, 5, 3] {
        h.queue.push("inbox", message(id));
    }
    let script = bind(
        "USE 'queue://broker';\n\
         CONSUME TOP 3 id, body AS text FROM inbox WHERE id > 1 ORDER BY id DESC",
        &[],
    );

    let report = h.executor.execute(&script, &mut ExecutionContext::new()).await.unwrap();

    let expected: Vec<Record> = [6, 4, 2]
        .into_iter()
        .map(|id| record(&[("id", Value::Int(id)), ("text", Value::String(format!("m{id}")))]))
        .collect();
    assert_eq!(report.results[1].outcome, StatementOutcome::Rows(expected));

    let left: Vec<Value> = h.queue.snapshot("inbox").iter().map(|m| m["id"].clone()).collect();
    assert_eq!(left, vec![Value::Int(1), Value::Int(5), Value::Int(3)]);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_consume_sorts_by_position() {
    let h = harness(RecordingBackend::default());
    for id in [2, 3, 1] {
        h.queue.push("inbox", message(id));
    }
    let script = bind("USE 'queue://broker';\nCONSUME TOP 3 body AS text, id FROM inbox ORDER BY 2 DESC", &[]);

    let report = h.executor.execute(&script, &mut ExecutionContext::new()).await.unwrap();

    let Some(rows) = report.last_rows() else {
        panic!("expected rows");
    };
    let ids: Vec<Value> = rows.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
}

#[tokio::test]
async fn test_consume_on_database_is_a_query() {
    let h = harness(RecordingBackend::default());
    let script = bind(
        "USE 'postgres://db/app'; CONSUME TOP 5 id, body FROM inbox WHERE id > 3 ORDER BY id",
        &[],
    );

    h.executor.execute(&script, &mut ExecutionContext::new()).await.unwrap();

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].command.starts_with("SELECT id, body FROM inbox"), "{}", calls[0].command);
    assert_eq!(calls[0].params.first(), Some(&Value::Int(3)));
}

#[tokio::test]
async fn test_produce_without_from_evaluates_one_record() {
    let h = harness(RecordingBackend::default());
    let script = bind(
        "PRODUCE 'queue://outbox' WITH (priority = 1) SELECT @greeting AS text, 2 * 21 AS answer",
        &["greeting"],
    );
    let mut context = ExecutionContext::new();
    context.set_variable("greeting", Value::String("hi".into()).into());

    let report = h.executor.execute(&script, &mut context).await.unwrap();

    assert_eq!(report.results[0].outcome, StatementOutcome::Produced(1));
    assert_eq!(
        h.queue.snapshot("outbox"),
        vec![record(&[("text", Value::String("hi".into())), ("answer", Value::Int(42))])]
    );
}

#[tokio::test]
async fn test_produce_from_database_forwards_rows() {
    let rows = vec![message(1), message(2)];
    let h = harness(RecordingBackend {
        rows: rows.clone(),
        ..Default::default()
    });
    let script = bind(
        "USE 'mysql://db/app'; PRODUCE 'queue://archive' SELECT id, body FROM inbox WHERE id > 0",
        &[],
    );

    let report = h.executor.execute(&script, &mut ExecutionContext::new()).await.unwrap();

    assert_eq!(report.results[1].outcome, StatementOutcome::Produced(2));
    assert_eq!(h.queue.snapshot("archive"), rows);
    assert_eq!(h.backend.calls()[0].params, vec![Value::Int(0)]);
}

fn temp_file(name: &str, contents: &str) -> String {
    let path = std::env::temp_dir().join(format!("weave-exec-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    url::Url::from_file_path(&path).unwrap().to_string()
}

#[tokio::test]
async fn test_import_binds_variables_used_later() {
    let uri = temp_file("user.json", r#"[{"a_id": 5, "b_mail": "a@b.c"}, {"a_id": 6, "b_mail": "d@e.f"}]"#);
    let h = harness(RecordingBackend::default());
    let script = bind(
        &format!(
            "IMPORT '{uri}' INTO @uid, @mail;\n\
             IMPORT '{uri}' INTO @everyone;\n\
             USE 'postgres://db/app';\n\
             SELECT id FROM users WHERE id = @uid OR email = @mail"
        ),
        &[],
    );
    let mut context = ExecutionContext::new();

    let report = h.executor.execute(&script, &mut context).await.unwrap();

    assert_eq!(
        report.results[0].outcome,
        StatementOutcome::Bound {
            variables: vec!["uid".into(), "mail".into()],
            rows: 2,
        }
    );
    assert!(matches!(context.variable("everyone"), Some(VarValue::Rows(rows)) if rows.len() == 2));
    assert_eq!(
        h.backend.calls()[0].params,
        vec![Value::Int(5), Value::String("a@b.c".into())]
    );
}

#[tokio::test]
async fn test_failure_keeps_completed_results() {
    let uri = temp_file("rows.json", r#"[{"id": 1}]"#);
    let h = harness(RecordingBackend::default());
    let script = bind(
        &format!(
            "IMPORT '{uri}' INTO @rows;\n\
             USE 'postgres://db/app';\n\
             SELECT id FROM users WHERE id = @rows;\n\
             SELECT email FROM users"
        ),
        &[],
    );

    let failure = h
        .executor
        .execute(&script, &mut ExecutionContext::new())
        .await
        .unwrap_err();

    assert_eq!(failure.statement, 2);
    assert!(matches!(failure.error, ExecutionError::NotScalar(ref name) if name == "rows"));
    assert_eq!(failure.completed.results.len(), 2);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_relational_statement_needs_database_target() {
    let h = harness(RecordingBackend::default());

    let script = bind("SELECT id FROM users", &[]);
    let failure = h
        .executor
        .execute(&script, &mut ExecutionContext::new())
        .await
        .unwrap_err();
    assert!(matches!(failure.error, ExecutionError::NoDatabaseTarget(_)));

    let script = bind("USE 'queue://broker'; SELECT id FROM users", &[]);
    let failure = h
        .executor
        .execute(&script, &mut ExecutionContext::new())
        .await
        .unwrap_err();
    assert_eq!(failure.statement, 1);
    assert_eq!(
        failure.error.to_string(),
        "Statement needs a database target, active target is queue transport"
    );
}

#[tokio::test]
async fn test_unregistered_scheme_is_rejected_by_use() {
    let h = harness(RecordingBackend::default());
    let script = bind("USE 'ftp://files/drop'", &[]);
    let failure = h
        .executor
        .execute(&script, &mut ExecutionContext::new())
        .await
        .unwrap_err();
    assert!(matches!(failure.error, ExecutionError::UnsupportedScheme(ref s) if s == "ftp"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let h = harness(RecordingBackend::default());
    let script = bind("-- first\nUSE 'postgres://db/app'; SELECT id FROM users", &[]);
    let token = CancellationToken::new();
    token.cancel();
    let mut context = ExecutionContext::new().with_cancellation(token);

    let failure = h.executor.execute(&script, &mut context).await.unwrap_err();

    assert_eq!(failure.statement, 0);
    assert!(matches!(failure.error, ExecutionError::Cancelled));
    assert!(failure.completed.results.is_empty());
    assert!(h.backend.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_named_targets() {
    let h = harness(RecordingBackend::default());
    let executor = h
        .executor
        .with_named_targets([("Reporting".to_string(), "mysql://db2/reporting".to_string())]);

    let script = bind("USE reporting; SELECT id FROM users", &[]);
    executor.execute(&script, &mut ExecutionContext::new()).await.unwrap();
    assert_eq!(
        h.backend.calls(),
        vec![Call {
            target: "mysql://db2/reporting".into(),
            command: "SELECT id FROM users".into(),
            params: vec![],
        }]
    );

    let script = bind("USE nowhere", &[]);
    let failure = executor
        .execute(&script, &mut ExecutionContext::new())
        .await
        .unwrap_err();
    assert!(matches!(failure.error, ExecutionError::UnknownTarget(ref n) if n == "nowhere"));
}
