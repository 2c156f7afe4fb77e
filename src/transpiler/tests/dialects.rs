//! SQL Dialect tests.

use pretty_assertions::assert_eq;

use super::{compile, sql};
use crate::transpiler::Dialect::{self, MySql, Postgres, SqlServer};

fn unsupported(text: &str, dialect: Dialect) -> String {
    match compile(text, dialect) {
        Ok(cmd) => panic!("expected {dialect} to reject {text}, got {}", cmd.text),
        Err(e) => {
            assert_eq!(e.dialect, dialect);
            e.feature
        }
    }
}

#[test]
fn test_placeholder_styles() {
    let text = "SELECT id FROM orders WHERE total > 10 AND user_id = 3";
    assert_eq!(sql(text, Postgres), "SELECT id FROM orders WHERE total > $1 AND user_id = $2");
    assert_eq!(sql(text, MySql), "SELECT id FROM orders WHERE total > ? AND user_id = ?");
    assert_eq!(sql(text, SqlServer), "SELECT id FROM orders WHERE total > @p1 AND user_id = @p2");

    let cmd = compile(text, SqlServer).unwrap();
    let placeholders: Vec<_> = cmd.params.iter().map(|p| p.placeholder.as_str()).collect();
    assert_eq!(placeholders, vec!["@p1", "@p2"]);
}

#[test]
fn test_identifier_quoting() {
    let text = "SELECT \"user\", \"order\" FROM events";
    assert_eq!(sql(text, Postgres), "SELECT \"user\", \"order\" FROM events");
    assert_eq!(sql(text, MySql), "SELECT `user`, `order` FROM events");
    assert_eq!(sql(text, SqlServer), "SELECT [user], [order] FROM events");
}

#[test]
fn test_string_concat() {
    let text = "SELECT email || '@' || id FROM users";
    assert_eq!(sql(text, Postgres), "SELECT email || $1 || id FROM users");
    assert_eq!(sql(text, MySql), "SELECT CONCAT(email, ?, id) FROM users");
    assert_eq!(sql(text, SqlServer), "SELECT CONCAT(email, @p1, id) FROM users");
}

#[test]
fn test_recursive_keyword_dropped_for_sqlserver() {
    assert_eq!(
        sql(
            "WITH RECURSIVE r (n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM r WHERE n < 10) SELECT n FROM r",
            SqlServer
        ),
        "WITH r (n) AS (SELECT @p1 UNION ALL SELECT n + @p2 FROM r WHERE n < @p3) SELECT n FROM r"
    );
}

#[test]
fn test_sqlserver_row_limits() {
    assert_eq!(
        sql("SELECT id FROM orders LIMIT 5", SqlServer),
        "SELECT TOP (5) id FROM orders"
    );
    assert_eq!(
        sql("SELECT id FROM orders ORDER BY id LIMIT 10 OFFSET 20", SqlServer),
        "SELECT id FROM orders ORDER BY id OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
    );
    assert_eq!(
        sql("SELECT id FROM users UNION SELECT id FROM orders ORDER BY id LIMIT 5", SqlServer),
        "SELECT id FROM users UNION SELECT id FROM orders ORDER BY id OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    assert_eq!(
        sql("SELECT id FROM users UNION SELECT id FROM orders LIMIT 5", SqlServer),
        "SELECT id FROM users UNION SELECT id FROM orders ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    assert_eq!(
        unsupported("SELECT id FROM orders LIMIT 10 OFFSET 20", SqlServer),
        "LIMIT with OFFSET but no ORDER BY"
    );
}

#[test]
fn test_full_join_rejected_by_mysql() {
    let text = "SELECT users.id FROM users FULL JOIN orders ON users.id = orders.user_id";
    assert_eq!(
        sql(text, Postgres),
        "SELECT users.id FROM users FULL JOIN orders ON users.id = orders.user_id"
    );
    let err = compile(text, MySql).unwrap_err();
    assert_eq!(err.to_string(), "FULL JOIN is not supported by mysql");
}

#[test]
fn test_table_hints() {
    let nolock = "SELECT id FROM orders WITH (NOLOCK)";
    assert_eq!(sql(nolock, SqlServer), "SELECT id FROM orders WITH (NOLOCK)");
    assert_eq!(unsupported(nolock, Postgres), "table hint NOLOCK");
    assert_eq!(unsupported(nolock, MySql), "table hint NOLOCK");

    let index = "SELECT id FROM orders AS o WITH (INDEX(ix_total))";
    assert_eq!(sql(index, SqlServer), "SELECT id FROM orders AS o WITH (INDEX(ix_total))");
    assert_eq!(sql(index, MySql), "SELECT id FROM orders AS o FORCE INDEX (ix_total)");
}

#[test]
fn test_table_hints_never_pass_raw_text() {
    let quoted = "SELECT id FROM orders WITH (\"NOLOCK); DROP TABLE users; --\")";
    assert_eq!(
        unsupported(quoted, SqlServer),
        "table hint NOLOCK); DROP TABLE USERS; --"
    );
    assert_eq!(
        unsupported("SELECT id FROM orders WITH (FASTFIRSTROW)", SqlServer),
        "table hint FASTFIRSTROW"
    );
    assert_eq!(
        unsupported("SELECT id FROM orders WITH (NOLOCK(3))", SqlServer),
        "arguments to table hint NOLOCK"
    );

    let index = "SELECT id FROM orders WITH (INDEX(\"ix]) ; DROP TABLE users; --\", 2))";
    assert_eq!(
        sql(index, SqlServer),
        "SELECT id FROM orders WITH (INDEX([ix]]) ; DROP TABLE users; --], 2))"
    );
    assert_eq!(
        sql("SELECT id FROM orders WITH (nolock, updlock)", SqlServer),
        "SELECT id FROM orders WITH (NOLOCK, UPDLOCK)"
    );
}

#[test]
fn test_range_frames() {
    let numeric = "SELECT AVG(total) OVER (ORDER BY id RANGE 3 PRECEDING) FROM orders";
    assert_eq!(
        sql(numeric, Postgres),
        "SELECT AVG(total) OVER (ORDER BY id RANGE 3 PRECEDING) FROM orders"
    );
    assert_eq!(unsupported(numeric, SqlServer), "RANGE frame with a row offset");

    assert_eq!(
        sql(
            "SELECT SUM(total) OVER (ORDER BY id RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) FROM orders",
            SqlServer
        ),
        "SELECT SUM(total) OVER (ORDER BY id RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) FROM orders"
    );
}

#[test]
fn test_single_table_delete() {
    let text = "DELETE FROM orders WHERE total > 10";
    assert_eq!(sql(text, Postgres), "DELETE FROM orders WHERE total > $1");
    assert_eq!(sql(text, MySql), "DELETE FROM orders WHERE total > ?");
    assert_eq!(sql(text, SqlServer), "DELETE FROM orders WHERE total > @p1");
}

#[test]
fn test_delete_with_join() {
    let text = "DELETE o FROM orders AS o JOIN users ON o.user_id = users.id WHERE users.email LIKE '%spam%'";
    assert_eq!(
        sql(text, Postgres),
        "DELETE FROM orders AS o USING users WHERE o.user_id = users.id AND users.email LIKE $1"
    );
    assert_eq!(
        sql(text, MySql),
        "DELETE o FROM orders AS o JOIN users ON o.user_id = users.id WHERE users.email LIKE ?"
    );
    assert_eq!(
        sql(text, SqlServer),
        "DELETE o FROM orders AS o JOIN users ON o.user_id = users.id WHERE users.email LIKE @p1"
    );
}

#[test]
fn test_delete_using_relation_without_target() {
    let text = "DELETE FROM orders USING users WHERE orders.user_id = users.id";
    assert_eq!(
        sql(text, Postgres),
        "DELETE FROM orders USING users WHERE orders.user_id = users.id"
    );
    assert_eq!(
        sql(text, MySql),
        "DELETE orders FROM orders, users WHERE orders.user_id = users.id"
    );
    assert_eq!(
        sql(text, SqlServer),
        "DELETE orders FROM orders, users WHERE orders.user_id = users.id"
    );
}

#[test]
fn test_delete_or_predicate_keeps_meaning() {
    assert_eq!(
        sql(
            "DELETE o FROM orders AS o JOIN users ON o.user_id = users.id WHERE o.total > 5 OR users.id = 1",
            Postgres
        ),
        "DELETE FROM orders AS o USING users WHERE o.user_id = users.id AND (o.total > $1 OR users.id = $2)"
    );
}

#[test]
fn test_delete_outer_join_rejected_by_postgres() {
    let text = "DELETE o FROM orders AS o LEFT JOIN users ON o.user_id = users.id WHERE users.id IS NULL";
    assert_eq!(unsupported(text, Postgres), "outer join in DELETE ... USING");
    assert_eq!(
        sql(text, MySql),
        "DELETE o FROM orders AS o LEFT JOIN users ON o.user_id = users.id WHERE users.id IS NULL"
    );
}

#[test]
fn test_delete_output() {
    let text = "DELETE FROM orders OUTPUT deleted.id, total WHERE total > 10";
    assert_eq!(
        sql(text, Postgres),
        "DELETE FROM orders WHERE total > $1 RETURNING orders.id, total"
    );
    assert_eq!(
        sql(text, SqlServer),
        "DELETE FROM orders OUTPUT DELETED.id, DELETED.total WHERE total > @p1"
    );
    assert_eq!(unsupported(text, MySql), "DELETE ... OUTPUT");
}

#[test]
fn test_delete_output_with_join_on_sqlserver() {
    assert_eq!(
        sql(
            "DELETE o OUTPUT deleted.*, users.email FROM orders AS o JOIN users ON o.user_id = users.id",
            SqlServer
        ),
        "DELETE o OUTPUT DELETED.*, users.email FROM orders AS o JOIN users ON o.user_id = users.id"
    );
}
