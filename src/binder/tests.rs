use pretty_assertions::assert_eq;

use super::*;
use crate::parser::parse_script;

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_table("users", &[("id", DataType::Int), ("email", DataType::Text)])
        .with_table(
            "orders",
            &[
                ("id", DataType::Int),
                ("user_id", DataType::Int),
                ("total", DataType::Float),
            ],
        )
        .with_table("inbox", &[("id", DataType::Int), ("body", DataType::Text)])
}

fn bind_text(text: &str) -> Result<BoundScript, BindError> {
    let script = parse_script(text).unwrap();
    bind(script, &catalog())
}

fn first_query(bound: &BoundScript) -> &Query {
    match &bound.statements()[0] {
        Statement::Select(q) => q,
        other => panic!("expected SELECT, got {:?}", other),
    }
}

fn projected_binding(bound: &BoundScript, idx: usize) -> Binding {
    match &first_query(bound).first_select().projection[idx].expr {
        Expr::Identifier(id) => id.resolution.clone().unwrap().binding,
        other => panic!("expected identifier, got {:?}", other),
    }
}

#[test]
fn test_columns_resolve_through_alias() {
    let bound = bind_text("SELECT u.id, email FROM users AS u").unwrap();
    assert_eq!(
        projected_binding(&bound, 0),
        Binding::Column {
            source: "u".into(),
            table: "users".into(),
            column: "id".into(),
        }
    );
    let Expr::Identifier(email) = &first_query(&bound).first_select().projection[1].expr else {
        panic!("expected identifier");
    };
    assert_eq!(email.resolution.as_ref().unwrap().data_type, DataType::Text);
}

#[test]
fn test_unknown_table_suggests_closest() {
    let err = bind_text("SELECT id FROM user").unwrap_err();
    let BindError::UnresolvedTable {
        name,
        position,
        suggestion,
        ..
    } = err
    else {
        panic!("expected UnresolvedTable, got {:?}", err);
    };
    assert_eq!(name, "user");
    assert_eq!(position.column, 16);
    assert_eq!(suggestion.as_deref(), Some("users"));
}

#[test]
fn test_unknown_column_suggests_closest() {
    let err = bind_text("SELECT emial FROM users").unwrap_err();
    let BindError::UnresolvedColumn { suggestion, .. } = err else {
        panic!("expected UnresolvedColumn, got {:?}", err);
    };
    assert_eq!(suggestion.as_deref(), Some("email"));
}

#[test]
fn test_unqualified_column_in_two_sources_is_ambiguous() {
    let err =
        bind_text("SELECT id FROM users JOIN orders ON users.id = orders.user_id").unwrap_err();
    let BindError::AmbiguousColumn { candidates, .. } = err else {
        panic!("expected AmbiguousColumn, got {:?}", err);
    };
    assert_eq!(candidates, vec!["users".to_string(), "orders".to_string()]);
}

#[test]
fn test_cte_may_only_see_earlier_links() {
    let bound =
        bind_text("WITH a AS (SELECT 1 AS x), b AS (SELECT x FROM a) SELECT x FROM b").unwrap();
    assert_eq!(
        projected_binding(&bound, 0),
        Binding::CteColumn {
            cte: "b".into(),
            column: "x".into(),
        }
    );

    let err =
        bind_text("WITH a AS (SELECT x FROM b), b AS (SELECT 1 AS x) SELECT x FROM a").unwrap_err();
    assert!(
        matches!(&err, BindError::ForwardCteReference { name, .. } if name == "b"),
        "{err:?}"
    );
}

#[test]
fn test_self_reference_needs_recursive() {
    let err = bind_text("WITH r AS (SELECT n FROM r) SELECT n FROM r").unwrap_err();
    assert!(matches!(err, BindError::ForwardCteReference { .. }), "{err:?}");

    bind_text(
        "WITH RECURSIVE r (n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM r WHERE n < 10) SELECT n FROM r",
    )
    .unwrap();
}

#[test]
fn test_duplicate_cte_names_are_rejected() {
    let err =
        bind_text("WITH a AS (SELECT 1 AS x), A AS (SELECT 2 AS x) SELECT x FROM a").unwrap_err();
    assert!(matches!(&err, BindError::DuplicateCte { name, .. } if name == "A"), "{err:?}");
}

#[test]
fn test_cte_column_list_must_match() {
    let err = bind_text("WITH a (x, y) AS (SELECT 1) SELECT x FROM a").unwrap_err();
    assert!(
        matches!(
            err,
            BindError::CteColumnCount {
                declared: 2,
                actual: 1,
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn test_cte_does_not_leak_past_its_statement() {
    let err = bind_text("WITH a AS (SELECT 1 AS x) SELECT x FROM a; SELECT x FROM a").unwrap_err();
    assert!(matches!(err, BindError::UnresolvedTable { .. }), "{err:?}");
}

#[test]
fn test_union_sides_must_have_same_width() {
    let err = bind_text("SELECT id FROM users UNION SELECT id, total FROM orders").unwrap_err();
    assert!(
        matches!(err, BindError::UnionArity { left: 1, right: 2, .. }),
        "{err:?}"
    );
    bind_text("SELECT id FROM users UNION ALL SELECT id FROM orders ORDER BY id").unwrap();
}

#[test]
fn test_wildcard_counts_toward_union_width() {
    let err = bind_text("SELECT * FROM users UNION SELECT id FROM orders").unwrap_err();
    assert!(
        matches!(err, BindError::UnionArity { left: 2, right: 1, .. }),
        "{err:?}"
    );
}

#[test]
fn test_illegal_frames() {
    for text in [
        "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN 1 FOLLOWING AND 1 PRECEDING) FROM orders",
        "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN UNBOUNDED FOLLOWING AND CURRENT ROW) FROM orders",
        "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN CURRENT ROW AND UNBOUNDED PRECEDING) FROM orders",
        "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN -2 PRECEDING AND CURRENT ROW) FROM orders",
    ] {
        let err = bind_text(text).unwrap_err();
        assert!(matches!(err, BindError::IllegalFrameBound { .. }), "{text}: {err:?}");
    }
}

#[test]
fn test_legal_frames() {
    for text in [
        "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) FROM orders",
        "SELECT SUM(total) OVER (ORDER BY id ROWS BETWEEN 2 PRECEDING AND 2 FOLLOWING) FROM orders",
        "SELECT AVG(total) OVER (PARTITION BY user_id ORDER BY id RANGE 3 PRECEDING) FROM orders",
        "SELECT ROW_NUMBER() OVER (ORDER BY id) FROM orders",
    ] {
        bind_text(text).unwrap_or_else(|e| panic!("{text}: {e}"));
    }
}

#[test]
fn test_order_by_sees_projection_aliases() {
    let bound = bind_text("SELECT total * 2 AS doubled FROM orders ORDER BY doubled DESC").unwrap();
    let order = &first_query(&bound).order_by[0];
    let Expr::Identifier(id) = &order.expr else {
        panic!("expected identifier");
    };
    assert_eq!(
        id.resolution.as_ref().unwrap(),
        &Resolution {
            binding: Binding::OutputAlias {
                alias: "doubled".into()
            },
            data_type: DataType::Float,
        }
    );
}

#[test]
fn test_positions_name_output_columns() {
    let bound = bind_text("SELECT user_id, total AS amount FROM orders GROUP BY 1 ORDER BY 2 DESC, 1").unwrap();
    let query = first_query(&bound);
    let Expr::Identifier(grouped) = &query.first_select().group_by[0] else {
        panic!("expected identifier");
    };
    assert_eq!(grouped.parts, vec!["user_id".to_string()]);
    assert!(matches!(
        grouped.resolution.as_ref().map(|r| &r.binding),
        Some(Binding::Column { column, .. }) if column == "user_id"
    ));

    let Expr::Identifier(first) = &query.order_by[0].expr else {
        panic!("expected identifier");
    };
    assert_eq!(
        first.resolution.as_ref().unwrap().binding,
        Binding::OutputAlias {
            alias: "amount".into()
        }
    );
    assert_eq!(query.order_by[0].direction, Some(SortOrder::Desc));
    assert!(matches!(&query.order_by[1].expr, Expr::Identifier(id) if id.name() == "user_id"));
}

#[test]
fn test_positions_expand_through_wildcards() {
    let bound = bind_text("SELECT * FROM users AS u JOIN orders AS o ON u.id = o.user_id ORDER BY 3").unwrap();
    let Expr::Identifier(id) = &first_query(&bound).order_by[0].expr else {
        panic!("expected identifier");
    };
    assert_eq!(id.parts, vec!["o".to_string(), "id".to_string()]);
}

#[test]
fn test_positions_out_of_range() {
    for (text, clause, ordinal) in [
        ("SELECT id FROM users ORDER BY 2", "ORDER BY", 2),
        ("SELECT id FROM users ORDER BY 0", "ORDER BY", 0),
        ("SELECT id, COUNT(*) FROM orders GROUP BY 3", "GROUP BY", 3),
        ("SELECT id FROM users UNION SELECT id FROM orders ORDER BY 2", "ORDER BY", 2),
        ("CONSUME TOP 1 id FROM inbox ORDER BY 4", "ORDER BY", 4),
    ] {
        match bind_text(text) {
            Err(BindError::OrdinalOutOfRange {
                clause: c, ordinal: n, ..
            }) => {
                assert_eq!((c.as_str(), n), (clause, ordinal), "{text}");
            }
            other => panic!("{text}: {:?}", other),
        }
    }
}

#[test]
fn test_union_positions_need_a_name() {
    let bound = bind_text("SELECT id FROM users UNION SELECT user_id FROM orders ORDER BY 1").unwrap();
    let Expr::Identifier(id) = &first_query(&bound).order_by[0].expr else {
        panic!("expected identifier");
    };
    assert_eq!(
        id.resolution.as_ref().unwrap().binding,
        Binding::OutputAlias { alias: "id".into() }
    );

    let err = bind_text("SELECT id + 1 FROM users UNION SELECT id FROM orders ORDER BY 1").unwrap_err();
    assert!(matches!(err, BindError::UnnamedOrdinal { ordinal: 1, .. }));
}

#[test]
fn test_correlated_subquery_sees_outer_scope() {
    bind_text(
        "SELECT id FROM users WHERE EXISTS (SELECT 1 FROM orders WHERE orders.user_id = users.id)",
    )
    .unwrap();
}

#[test]
fn test_derived_table_columns() {
    let bound = bind_text("SELECT d.n FROM (SELECT id AS n FROM users) AS d").unwrap();
    assert_eq!(
        projected_binding(&bound, 0),
        Binding::Derived {
            source: "d".into(),
            column: "n".into(),
        }
    );
}

#[test]
fn test_duplicate_source_alias() {
    let err = bind_text("SELECT 1 FROM users AS a, orders AS a").unwrap_err();
    assert!(matches!(err, BindError::DuplicateAlias { .. }), "{err:?}");
}

#[test]
fn test_delete_output_scope() {
    bind_text("DELETE FROM orders OUTPUT deleted.id, total WHERE total > 10").unwrap();
    bind_text(
        "DELETE o OUTPUT deleted.id, users.email FROM orders AS o JOIN users ON o.user_id = users.id WHERE users.email LIKE '%x'",
    )
    .unwrap();

    let err = bind_text("DELETE FROM orders OUTPUT users.email WHERE total > 10").unwrap_err();
    assert!(
        matches!(&err, BindError::InvalidOutputReference { name, .. } if name == "users"),
        "{err:?}"
    );
}

#[test]
fn test_delete_target_matches_from_source() {
    let bound = bind_text("DELETE o FROM orders AS o JOIN users ON o.user_id = users.id").unwrap();
    let Statement::Delete(delete) = &bound.statements()[0] else {
        panic!("expected DELETE");
    };
    let Relation::Named(target) = &delete.target.relation else {
        panic!("expected named target");
    };
    assert_eq!(
        target.resolution.as_ref().unwrap().binding,
        Binding::Table {
            table: "orders".into()
        }
    );
}

#[test]
fn test_delete_target_must_exist() {
    let err = bind_text("DELETE FROM ordres WHERE id = 1").unwrap_err();
    let BindError::UnresolvedTable { suggestion, .. } = err else {
        panic!("expected UnresolvedTable, got {:?}", err);
    };
    assert_eq!(suggestion.as_deref(), Some("orders"));
}

#[test]
fn test_variables_must_be_assigned_before_use() {
    let err = bind_text("SELECT id FROM users WHERE id = @x").unwrap_err();
    assert!(
        matches!(&err, BindError::UndefinedVariable { name, .. } if name == "x"),
        "{err:?}"
    );

    bind_text("IMPORT 'file:///tmp/a.json' INTO @a; SELECT id FROM users WHERE id = @a").unwrap();
    bind_text("REQUEST 'https://example.com' INTO @r; IMPORT 'file:///tmp/r.json' INTO @r").unwrap();
}

#[test]
fn test_import_target_listed_twice() {
    let err = bind_text("IMPORT 'file:///tmp/a.json' INTO @a, @A").unwrap_err();
    assert!(matches!(err, BindError::AmbiguousVariable { .. }), "{err:?}");
}

#[test]
fn test_declared_variables() {
    let script = parse_script("SELECT id FROM users WHERE id > @floor").unwrap();
    let catalog = catalog();
    Binder::new(&catalog)
        .with_variables(["@floor"])
        .bind(script)
        .unwrap();
}

#[test]
fn test_consume_and_produce_scopes() {
    bind_text("CONSUME TOP 5 id, body FROM inbox WHERE id > 3 ORDER BY id").unwrap();
    bind_text("PRODUCE 'queue://out' SELECT id, body FROM inbox WHERE id > 3").unwrap();
    bind_text("PRODUCE 'queue://out' SELECT 1 AS ping").unwrap();

    let err = bind_text("CONSUME id FROM outbox").unwrap_err();
    assert!(matches!(err, BindError::UnresolvedTable { .. }), "{err:?}");
    let err = bind_text("PRODUCE 'queue://out' SELECT body").unwrap_err();
    assert!(matches!(err, BindError::UnresolvedColumn { .. }), "{err:?}");
}

#[test]
fn test_binding_is_deterministic() {
    let text = "WITH a AS (SELECT id, email FROM users) SELECT a.email, COUNT(*) FROM a JOIN orders ON a.id = orders.user_id GROUP BY a.email";
    assert_eq!(bind_text(text).unwrap(), bind_text(text).unwrap());
}
