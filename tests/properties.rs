//! End-to-end properties of the compile pipeline.

use pretty_assertions::assert_eq;
use sqlweave::prelude::*;
use sqlweave::transpiler::ParamValue;

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_table("users", &[("id", DataType::Int), ("email", DataType::Text)])
        .with_table(
            "orders",
            &[("id", DataType::Int), ("user_id", DataType::Int), ("total", DataType::Float)],
        )
        .with_table("inbox", &[("id", DataType::Int), ("body", DataType::Text)])
}

fn commands(text: &str, dialect: Dialect) -> Vec<Command> {
    let bound = sqlweave::compile(text, &catalog()).unwrap();
    generate(&bound, dialect)
        .unwrap()
        .into_iter()
        .filter_map(|c| c.command)
        .collect()
}

const SCRIPT: &str = "-- nightly cleanup\n\
    USE 'postgres://{host}/app';\n\
    WITH big AS (SELECT id, user_id FROM orders WHERE total > 100) \
    SELECT u.email, SUM(o.total) OVER (PARTITION BY u.id ORDER BY o.id ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) AS running \
    FROM users AS u JOIN orders AS o ON u.id = o.user_id WHERE o.id IN (SELECT id FROM big);\n\
    /* drain */\n\
    CONSUME TOP 10 id, body FROM inbox WHERE id > 5 ORDER BY id;\n\
    DELETE o FROM orders AS o JOIN users ON o.user_id = users.id WHERE users.email LIKE '%spam%'";

#[test]
fn test_parse_is_deterministic() {
    let first = sqlweave::parse(SCRIPT).unwrap();
    for _ in 0..3 {
        assert_eq!(sqlweave::parse(SCRIPT).unwrap(), first);
    }
}

#[test]
fn test_format_then_parse_is_identity() {
    let parsed = sqlweave::parse(SCRIPT).unwrap();
    let rendered = format_script(&parsed);
    let reparsed = sqlweave::parse(&rendered).unwrap();
    assert_eq!(reparsed, parsed);

    let verbs: Vec<_> = reparsed.statements.iter().map(|s| s.verb()).collect();
    assert_eq!(verbs, vec!["COMMENT", "USE", "SELECT", "COMMENT", "CONSUME", "DELETE"]);
    assert_eq!(format_script(&reparsed), rendered);
}

#[test]
fn test_delete_differs_only_in_relation_syntax() {
    let text = "DELETE o FROM orders AS o JOIN users ON o.user_id = users.id WHERE users.email = 'x@y' AND o.total > 3";
    let pg = &commands(text, Dialect::Postgres)[0];
    let my = &commands(text, Dialect::MySql)[0];

    assert_eq!(
        pg.text,
        "DELETE FROM orders AS o USING users WHERE o.user_id = users.id AND users.email = $1 AND o.total > $2"
    );
    assert_eq!(
        my.text,
        "DELETE o FROM orders AS o JOIN users ON o.user_id = users.id WHERE users.email = ? AND o.total > ?"
    );
    let values = |c: &Command| c.params.iter().map(|p| p.value.clone()).collect::<Vec<_>>();
    assert_eq!(values(pg), values(my));
}

#[test]
fn test_frame_sentinels_round_trip() {
    let parsed = sqlweave::parse(
        "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) FROM orders",
    )
    .unwrap();
    let Statement::Select(query) = &parsed.statements[0] else {
        panic!("expected SELECT");
    };
    let Expr::Function(call) = &query.first_select().projection[0].expr else {
        panic!("expected function");
    };
    let over = call.over.as_ref().unwrap();
    assert_eq!(over.start.map(|b| b.extent), Some(UNBOUNDED));
    assert_eq!(over.end.map(|b| b.extent), Some(CURRENT_ROW));

    let rendered = format_script(&parsed);
    assert!(rendered.contains("ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW"));
    for dialect in Dialect::all() {
        let command = &commands(&rendered, dialect)[0];
        assert!(
            command.text.contains("ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW"),
            "{dialect}: {}",
            command.text
        );
    }
}

#[test]
fn test_undefined_cte_never_generates() {
    let err = sqlweave::compile("WITH a AS (SELECT id FROM b) SELECT id FROM a", &catalog()).unwrap_err();
    assert!(matches!(err, WeaveError::Bind(BindError::UnresolvedTable { ref name, .. }) if name == "b"));

    let err = sqlweave::compile(
        "WITH a AS (SELECT id FROM b), b AS (SELECT id FROM users) SELECT id FROM a",
        &catalog(),
    )
    .unwrap_err();
    assert!(matches!(err, WeaveError::Bind(BindError::ForwardCteReference { .. })));
}

#[test]
fn test_literals_never_reach_command_text() {
    let text = "SELECT email, 'secret-token' AS tag FROM users \
                WHERE id = 4242 AND email <> 'O''Brien' AND id * 3.75 > 9 \
                AND email LIKE 'drop%table'";
    for dialect in Dialect::all() {
        let command = &commands(text, dialect)[0];
        for literal in ["secret-token", "4242", "3.75", "O'Brien", "O''Brien", "drop%table", "9"] {
            assert!(
                !command.text.contains(literal),
                "{dialect} leaked {literal}: {}",
                command.text
            );
        }
        assert_eq!(command.params.len(), 6);
        assert!(command.params.iter().all(|p| matches!(p.value, ParamValue::Literal(_))));
    }
}

#[test]
fn test_cte_scenario_in_every_dialect() {
    let text = "WITH t AS (SELECT 1 AS x) SELECT x FROM t";
    let expected = [
        (Dialect::Postgres, "WITH t AS (SELECT $1 AS x) SELECT x FROM t"),
        (Dialect::MySql, "WITH t AS (SELECT ? AS x) SELECT x FROM t"),
        (Dialect::SqlServer, "WITH t AS (SELECT @p1 AS x) SELECT x FROM t"),
    ];
    for (dialect, sql) in expected {
        let commands = commands(text, dialect);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].text, sql);
        assert_eq!(commands[0].params[0].value, ParamValue::Literal(Value::Int(1)));
    }
}

#[test]
fn test_consume_scenario() {
    let parsed = sqlweave::parse("CONSUME TOP 10 col1, col2 FROM queueA WHERE col1 = 5").unwrap();
    let Statement::Consume(consume) = &parsed.statements[0] else {
        panic!("expected CONSUME");
    };
    assert_eq!(consume.top, Some(10));
    assert_eq!(consume.projection.len(), 2);
    assert_eq!(consume.source.table_name().map(|t| t.name()), Some("queueA"));
    assert!(matches!(
        consume.selection,
        Some(Expr::Binary { op: BinaryOp::Eq, .. })
    ));
}

#[test]
fn test_delete_forms_bind_to_same_shape() {
    let using = "DELETE FROM orders USING users WHERE orders.user_id = users.id";
    let joined = "DELETE orders FROM orders JOIN users ON orders.user_id = users.id";
    for dialect in [Dialect::MySql, Dialect::SqlServer] {
        let a = &commands(using, dialect)[0];
        let b = &commands(joined, dialect)[0];
        assert!(a.text.starts_with("DELETE orders FROM orders"), "{}", a.text);
        assert!(b.text.starts_with("DELETE orders FROM orders"), "{}", b.text);
    }
    assert_eq!(
        commands(joined, Dialect::Postgres)[0].text,
        "DELETE FROM orders USING users WHERE orders.user_id = users.id"
    );
}

#[test]
fn test_frame_offsets_survive_format_and_generation() {
    let cases = [
        (
            "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN 2 PRECEDING AND 0 PRECEDING) FROM orders",
            "ROWS BETWEEN 2 PRECEDING AND CURRENT ROW",
        ),
        (
            "SELECT SUM(total) OVER (ORDER BY id ROWS 3 FOLLOWING) FROM orders",
            "ROWS 3 FOLLOWING",
        ),
    ];
    for (text, frame) in cases {
        let parsed = sqlweave::parse(text).unwrap();
        let rendered = format_script(&parsed);
        assert!(rendered.contains(frame), "{rendered}");
        let reparsed = sqlweave::parse(&rendered).unwrap();
        assert_eq!(reparsed, parsed);
        assert_eq!(format_script(&reparsed), rendered);
        for dialect in Dialect::all() {
            let generated = commands(&rendered, dialect);
            assert!(generated[0].text.contains(frame), "{dialect}: {}", generated[0].text);
            assert_eq!(generated, commands(text, dialect));
        }
    }
}

#[test]
fn test_positions_never_become_parameters() {
    let text = "SELECT user_id, SUM(total) AS spent FROM orders GROUP BY 1 ORDER BY 2 DESC";
    for dialect in Dialect::all() {
        let command = &commands(text, dialect)[0];
        assert!(command.params.is_empty(), "{dialect}: {:?}", command.params);
        assert!(command.text.contains("GROUP BY user_id ORDER BY spent DESC"), "{dialect}: {}", command.text);
    }
}
