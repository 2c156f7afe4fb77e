//! Semantic binding.
//!
//! Resolves every identifier of a parsed script against the catalog, the
//! script's CTE chains and its FROM scopes, and checks the structural rules
//! the grammar cannot express (CTE order and uniqueness, UNION arity, window
//! frame legality, OUTPUT scope, variable slots). Changes made to the tree:
//! `Identifier::resolution` is filled, and positional `ORDER BY n` and
//! `GROUP BY n` items are replaced by the output column they name.

mod catalog;
mod scope;

#[cfg(test)]
mod tests;

pub use catalog::{Catalog, ColumnMeta, MemoryCatalog, TableMeta};

use std::collections::HashSet;
use std::sync::Arc;

use strsim::levenshtein;

use crate::ast::*;
use crate::error::BindError;
use crate::lexer::Position;
use scope::{ColumnInfo, CteEntry, Origin, Scope, SourceEntry};

/// A script whose identifiers are all resolved. Cheap to clone and safe to
/// share between concurrent executions.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundScript {
    script: Arc<ScriptModel>,
}

impl BoundScript {
    pub fn script(&self) -> &ScriptModel {
        &self.script
    }

    pub fn statements(&self) -> &[Statement] {
        &self.script.statements
    }

    pub fn shared(&self) -> Arc<ScriptModel> {
        Arc::clone(&self.script)
    }
}

/// Bind a script with no externally declared variables.
pub fn bind(script: ScriptModel, catalog: &dyn Catalog) -> Result<BoundScript, BindError> {
    Binder::new(catalog).bind(script)
}

pub struct Binder<'a> {
    catalog: &'a dyn Catalog,
    /// Variables assigned so far, lower-cased.
    variables: HashSet<String>,
    scopes: Vec<Scope>,
    /// CTEs visible at the current point, innermost last.
    ctes: Vec<CteEntry>,
    /// Names from chains being bound that are not defined yet.
    pending_ctes: Vec<String>,
    /// DELETE target name while binding its OUTPUT list.
    output_target: Option<String>,
}

impl<'a> Binder<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            variables: HashSet::new(),
            scopes: Vec::new(),
            ctes: Vec::new(),
            pending_ctes: Vec::new(),
            output_target: None,
        }
    }

    /// Declare variables the caller will supply at execution time.
    pub fn with_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.variables
            .extend(names.into_iter().map(|n| n.as_ref().trim_start_matches('@').to_lowercase()));
        self
    }

    pub fn bind(mut self, mut script: ScriptModel) -> Result<BoundScript, BindError> {
        for statement in script.statements.iter_mut() {
            self.bind_statement(statement)?;
        }
        Ok(BoundScript {
            script: Arc::new(script),
        })
    }

    fn bind_statement(&mut self, statement: &mut Statement) -> Result<(), BindError> {
        match statement {
            Statement::Select(q) => self.bind_query(q).map(|_| ()),
            Statement::Delete(d) => self.bind_delete(d),
            Statement::Use(_) | Statement::Comment(_) => Ok(()),
            Statement::Consume(c) => self.bind_consume(c),
            Statement::Import(i) => {
                for option in &mut i.options {
                    self.bind_expr(&mut option.value)?;
                }
                self.assign_variables(&i.targets)
            }
            Statement::Produce(p) => {
                for option in &mut p.options {
                    self.bind_expr(&mut option.value)?;
                }
                self.scopes.push(Scope::default());
                if let Some(from) = &mut p.from {
                    self.bind_table_expr(from)?;
                }
                if let Some(selection) = &mut p.selection {
                    self.bind_expr(selection)?;
                }
                self.bind_projection(&mut p.payload)?;
                self.scopes.pop();
                Ok(())
            }
            Statement::Request(r) => {
                for header in &mut r.headers {
                    self.bind_expr(&mut header.value)?;
                }
                for option in &mut r.options {
                    self.bind_expr(&mut option.expr)?;
                }
                self.assign_variables(std::slice::from_ref(&r.into))
            }
        }
    }

    /// Each slot may appear once per statement; later statements may
    /// overwrite it.
    fn assign_variables(&mut self, targets: &[VariableRef]) -> Result<(), BindError> {
        let mut seen = HashSet::new();
        for target in targets {
            let key = target.name.to_lowercase();
            if !seen.insert(key.clone()) {
                return Err(BindError::AmbiguousVariable {
                    name: target.name.clone(),
                    position: target.span.into(),
                });
            }
        }
        self.variables.extend(seen);
        Ok(())
    }

    // ── queries ───────────────────────────────────────────────────────

    fn bind_query(&mut self, query: &mut Query) -> Result<Vec<ColumnInfo>, BindError> {
        let cte_mark = self.ctes.len();
        if let Some(with) = &mut query.with {
            self.bind_with(with)?;
        }

        let columns = match &mut query.body {
            QueryExpr::Select(select) => self.bind_select(select, Some(&mut query.order_by))?,
            body => {
                let columns = self.bind_query_expr(body)?;
                if !query.order_by.is_empty() {
                    self.scopes.push(Scope {
                        sources: vec![],
                        aliases: columns.clone(),
                    });
                    let first = query.body.first_select();
                    self.bind_order_items(&mut query.order_by, Ordinals::Union(first))?;
                    self.scopes.pop();
                }
                columns
            }
        };

        self.ctes.truncate(cte_mark);
        Ok(columns)
    }

    fn bind_query_expr(&mut self, body: &mut QueryExpr) -> Result<Vec<ColumnInfo>, BindError> {
        match body {
            QueryExpr::Select(select) => self.bind_select(select, None),
            QueryExpr::Union(union) => {
                let left = self.bind_query_expr(&mut union.left)?;
                let right = self.bind_query_expr(&mut union.right)?;
                if left.len() != right.len() {
                    return Err(BindError::UnionArity {
                        position: union.span.into(),
                        left: left.len(),
                        right: right.len(),
                    });
                }
                Ok(left)
            }
            QueryExpr::Grouping(query) => self.bind_query(query),
        }
    }

    fn bind_select(
        &mut self,
        select: &mut Select,
        order_by: Option<&mut Vec<OrderItem>>,
    ) -> Result<Vec<ColumnInfo>, BindError> {
        self.scopes.push(Scope::default());
        if let Some(from) = &mut select.from {
            self.bind_table_expr(from)?;
        }
        if let Some(selection) = &mut select.selection {
            self.bind_expr(selection)?;
        }
        for expr in select.group_by.iter_mut().filter(|e| ordinal(e).is_none()) {
            self.bind_expr(expr)?;
        }
        if let Some(having) = &mut select.having {
            self.bind_expr(having)?;
        }
        let (columns, origins) = self.bind_projection_items(&mut select.projection)?;
        for idx in 0..select.group_by.len() {
            if let Some((n, span)) = ordinal(&select.group_by[idx]) {
                select.group_by[idx] =
                    self.projection_ordinal(Clause::GroupBy, n, span, &select.projection, &origins, &columns)?;
            }
        }
        if let Some(order_by) = order_by {
            if let Some(scope) = self.scopes.last_mut() {
                scope.aliases = columns.clone();
            }
            let ordinals = Ordinals::Projection {
                items: &select.projection,
                origins: &origins,
            };
            self.bind_order_items(order_by, ordinals)?;
        }
        self.scopes.pop();
        Ok(columns)
    }

    /// Bind projected expressions and work out the output columns,
    /// expanding wildcards.
    fn bind_projection(&mut self, items: &mut [SelectItem]) -> Result<Vec<ColumnInfo>, BindError> {
        Ok(self.bind_projection_items(items)?.0)
    }

    /// Like `bind_projection`, also returning where each output column comes
    /// from: its item index, and the source for wildcard columns.
    fn bind_projection_items(
        &mut self,
        items: &mut [SelectItem],
    ) -> Result<(Vec<ColumnInfo>, Vec<OutputOrigin>), BindError> {
        let mut columns = Vec::new();
        let mut origins = Vec::new();
        for (idx, item) in items.iter_mut().enumerate() {
            if let Expr::Wildcard { qualifier, span } = &item.expr {
                let scope = self.scopes.last().cloned().unwrap_or_default();
                match qualifier {
                    None => {
                        for source in &scope.sources {
                            columns.extend(source.columns.iter().cloned());
                            origins.resize(columns.len(), OutputOrigin::wildcard(idx, source));
                        }
                    }
                    Some(q) => match scope.source(q) {
                        Some(source) => {
                            columns.extend(source.columns.iter().cloned());
                            origins.resize(columns.len(), OutputOrigin::wildcard(idx, source));
                        }
                        None => {
                            return Err(BindError::UnresolvedTable {
                                name: q.clone(),
                                position: (*span).into(),
                                scope: scope.describe(),
                                suggestion: did_you_mean(q, scope.sources.iter().map(|s| &s.name)),
                            });
                        }
                    },
                }
                continue;
            }

            let data_type = self.bind_expr(&mut item.expr)?;
            let name = item
                .output_name()
                .unwrap_or_else(|| format!("column{}", idx + 1));
            columns.push(ColumnInfo::new(name, data_type));
            origins.push(OutputOrigin { item: idx, source: None });
        }
        Ok((columns, origins))
    }

    /// ORDER BY sees projection aliases first, then columns. An integer
    /// names an output column by position.
    fn bind_order_items(&mut self, items: &mut [OrderItem], ordinals: Ordinals<'_>) -> Result<(), BindError> {
        let columns = self.scopes.last().map(|s| s.aliases.clone()).unwrap_or_default();
        for item in items {
            if let Some((n, span)) = ordinal(&item.expr) {
                item.expr = match ordinals {
                    Ordinals::Projection { items, origins } => {
                        self.projection_ordinal(Clause::OrderBy, n, span, items, origins, &columns)?
                    }
                    Ordinals::Union(first) => union_ordinal(n, span, first, &columns)?,
                };
                continue;
            }
            if let Expr::Identifier(id) = &mut item.expr
                && id.parts.len() == 1
                && let Some(alias) = self
                    .scopes
                    .last()
                    .and_then(|s| s.aliases.iter().find(|a| a.name.eq_ignore_ascii_case(id.name())))
            {
                id.resolution = Some(Resolution {
                    binding: Binding::OutputAlias {
                        alias: alias.name.clone(),
                    },
                    data_type: alias.data_type,
                });
                continue;
            }
            self.bind_expr(&mut item.expr)?;
        }
        Ok(())
    }

    /// The expression output column `n` stands for. Wildcard columns become
    /// plain column references, aliased items are referenced by alias in
    /// ORDER BY, and everything else is the projected expression itself.
    fn projection_ordinal(
        &mut self,
        clause: Clause,
        n: i64,
        span: Span,
        items: &[SelectItem],
        origins: &[OutputOrigin],
        columns: &[ColumnInfo],
    ) -> Result<Expr, BindError> {
        let index = ordinal_index(clause, n, span, columns.len().min(origins.len()))?;
        let origin = &origins[index];
        let item = &items[origin.item];
        let column = &columns[index];
        if let Some(source) = &origin.source {
            let parts = vec![source.clone(), column.name.clone()];
            let mut expr = Expr::Identifier(Identifier::new(parts, span));
            self.bind_expr(&mut expr)?;
            return Ok(expr);
        }
        match (&item.alias, clause) {
            (Some(alias), Clause::OrderBy) => Ok(output_alias(alias, column.data_type, span)),
            _ => Ok(item.expr.clone()),
        }
    }

    // ── CTE chains ────────────────────────────────────────────────────

    /// Bind a WITH chain, leaving its CTEs visible. The caller truncates
    /// `ctes` once the owning statement is done.
    fn bind_with(&mut self, with: &mut WithClause) -> Result<(), BindError> {
        let declared: Vec<(String, Position)> = with
            .iter()
            .map(|cte| (cte.name.clone(), cte.span.into()))
            .collect();
        for (idx, (name, position)) in declared.iter().enumerate() {
            if let Some((_, first)) = declared[..idx]
                .iter()
                .find(|(earlier, _)| earlier.eq_ignore_ascii_case(name))
            {
                return Err(BindError::DuplicateCte {
                    name: name.clone(),
                    position: *position,
                    first: *first,
                });
            }
        }

        let pending_mark = self.pending_ctes.len();
        self.pending_ctes
            .extend(declared.iter().rev().map(|(name, _)| name.clone()));

        let recursive = with.recursive;
        let mut link = Some(&mut with.head);
        while let Some(cte) = link {
            if recursive {
                // The CTE sees itself with its declared or projected names
                let names = if cte.columns.is_empty() {
                    cte.query
                        .first_select()
                        .projection
                        .iter()
                        .enumerate()
                        .map(|(idx, item)| {
                            item.output_name()
                                .unwrap_or_else(|| format!("column{}", idx + 1))
                        })
                        .collect()
                } else {
                    cte.columns.clone()
                };
                self.ctes.push(CteEntry {
                    name: cte.name.clone(),
                    columns: names
                        .into_iter()
                        .map(|n| ColumnInfo::new(n, DataType::Unknown))
                        .collect(),
                });
            }

            let mut columns = self.bind_query(&mut cte.query)?;
            if recursive {
                self.ctes.pop();
            }
            self.pending_ctes.pop();

            if !cte.columns.is_empty() {
                if cte.columns.len() != columns.len() {
                    return Err(BindError::CteColumnCount {
                        name: cte.name.clone(),
                        position: cte.span.into(),
                        declared: cte.columns.len(),
                        actual: columns.len(),
                    });
                }
                for (column, name) in columns.iter_mut().zip(&cte.columns) {
                    column.name = name.clone();
                }
            }
            self.ctes.push(CteEntry {
                name: cte.name.clone(),
                columns,
            });
            link = cte.next.as_deref_mut();
        }

        self.pending_ctes.truncate(pending_mark);
        Ok(())
    }

    // ── FROM clauses ──────────────────────────────────────────────────

    /// Find what a table name refers to: a visible CTE, then the catalog.
    fn resolve_table(&self, id: &Identifier) -> Result<(Origin, Vec<ColumnInfo>, Binding), BindError> {
        let position: Position = id.span.into();
        if id.parts.len() == 1 {
            let name = id.name();
            if let Some(cte) = self
                .ctes
                .iter()
                .rev()
                .find(|c| c.name.eq_ignore_ascii_case(name))
            {
                return Ok((
                    Origin::Cte(cte.name.clone()),
                    cte.columns.clone(),
                    Binding::Cte {
                        cte: cte.name.clone(),
                    },
                ));
            }
            if self.pending_ctes.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                return Err(BindError::ForwardCteReference {
                    name: name.to_string(),
                    position,
                });
            }
        }

        let meta = self
            .catalog
            .table(&id.dotted())
            .or_else(|| self.catalog.table(id.name()));
        match meta {
            Some(meta) => {
                let columns = meta
                    .columns
                    .iter()
                    .map(|c| ColumnInfo::new(c.name.clone(), c.data_type))
                    .collect();
                Ok((
                    Origin::Table(meta.name.clone()),
                    columns,
                    Binding::Table { table: meta.name },
                ))
            }
            None => {
                let mut candidates: Vec<String> = self.ctes.iter().map(|c| c.name.clone()).collect();
                candidates.extend(self.catalog.table_names());
                let cte_names: Vec<_> = self.ctes.iter().map(|c| c.name.as_str()).collect();
                Err(BindError::UnresolvedTable {
                    name: id.dotted(),
                    position,
                    scope: format!("CTEs [{}] and catalog", cte_names.join(", ")),
                    suggestion: did_you_mean(id.name(), candidates.iter()),
                })
            }
        }
    }

    fn bind_table_expr(&mut self, table: &mut TableExpr) -> Result<(), BindError> {
        match table {
            TableExpr::Source(source) => self.bind_table_source(source),
            TableExpr::Join(join) => {
                self.bind_table_expr(&mut join.left)?;
                self.bind_table_expr(&mut join.right)?;
                if let Some(on) = &mut join.constraint {
                    self.bind_expr(on)?;
                }
                Ok(())
            }
        }
    }

    fn bind_table_source(&mut self, source: &mut TableSource) -> Result<(), BindError> {
        let entry = match &mut source.relation {
            Relation::Named(id) => {
                let (origin, columns, binding) = self.resolve_table(id)?;
                id.resolution = Some(Resolution {
                    binding,
                    data_type: DataType::Unknown,
                });
                SourceEntry {
                    name: source.alias.clone().unwrap_or_else(|| id.name().to_string()),
                    origin,
                    columns,
                }
            }
            Relation::Derived(query) => {
                // Derived tables cannot see their sibling sources
                let siblings = self.scopes.pop().unwrap_or_default();
                let columns = self.bind_query(query);
                self.scopes.push(siblings);
                SourceEntry {
                    name: source.alias.clone().unwrap_or_default(),
                    origin: Origin::Derived,
                    columns: columns?,
                }
            }
        };
        self.add_source(entry, source.span.into())
    }

    fn add_source(&mut self, entry: SourceEntry, position: Position) -> Result<(), BindError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };
        if scope.source(&entry.name).is_some() {
            return Err(BindError::DuplicateAlias {
                alias: entry.name,
                position,
            });
        }
        scope.sources.push(entry);
        Ok(())
    }

    // ── statements with their own scope rules ─────────────────────────

    fn bind_delete(&mut self, delete: &mut DeleteStatement) -> Result<(), BindError> {
        let cte_mark = self.ctes.len();
        if let Some(with) = &mut delete.with {
            self.bind_with(with)?;
        }
        self.scopes.push(Scope::default());
        if let Some(from) = &mut delete.from {
            self.bind_table_expr(from)?;
        }

        let target_name = delete.target.visible_name().unwrap_or_default().to_string();
        let target_position: Position = delete.target.span.into();
        let existing = self
            .scopes
            .last()
            .and_then(|s| s.source(&target_name))
            .map(|s| s.origin.clone());

        let Relation::Named(id) = &mut delete.target.relation else {
            return Err(BindError::UnresolvedTable {
                name: target_name,
                position: target_position,
                scope: "catalog".to_string(),
                suggestion: None,
            });
        };

        match existing {
            // The target names a source of the FROM relation
            Some(Origin::Table(table)) => {
                id.resolution = Some(Resolution {
                    binding: Binding::Table { table },
                    data_type: DataType::Unknown,
                });
            }
            Some(_) => {
                return Err(BindError::UnresolvedTable {
                    name: id.dotted(),
                    position: target_position,
                    scope: "catalog tables".to_string(),
                    suggestion: None,
                });
            }
            None => {
                let meta = self
                    .catalog
                    .table(&id.dotted())
                    .or_else(|| self.catalog.table(id.name()));
                let Some(meta) = meta else {
                    return Err(BindError::UnresolvedTable {
                        name: id.dotted(),
                        position: target_position,
                        scope: "catalog".to_string(),
                        suggestion: did_you_mean(id.name(), self.catalog.table_names().iter()),
                    });
                };
                id.resolution = Some(Resolution {
                    binding: Binding::Table {
                        table: meta.name.clone(),
                    },
                    data_type: DataType::Unknown,
                });
                let entry = SourceEntry {
                    name: target_name.clone(),
                    origin: Origin::Table(meta.name.clone()),
                    columns: meta
                        .columns
                        .iter()
                        .map(|c| ColumnInfo::new(c.name.clone(), c.data_type))
                        .collect(),
                };
                self.add_source(entry, target_position)?;
            }
        }

        self.output_target = Some(target_name);
        let output = self.bind_output(&mut delete.output);
        self.output_target = None;
        output?;

        if let Some(selection) = &mut delete.selection {
            self.bind_expr(selection)?;
        }
        self.scopes.pop();
        self.ctes.truncate(cte_mark);
        Ok(())
    }

    /// OUTPUT may only name the target (also as `DELETED`) or joined sources.
    fn bind_output(&mut self, items: &mut [SelectItem]) -> Result<(), BindError> {
        let scope = self
            .scopes
            .last()
            .map(|s| s.describe())
            .unwrap_or_default();
        let invalid = |err: BindError| match err {
            BindError::UnresolvedColumn { name, position, .. }
            | BindError::UnresolvedTable { name, position, .. } => {
                BindError::InvalidOutputReference {
                    name,
                    position,
                    scope: scope.clone(),
                }
            }
            other => other,
        };

        for item in items.iter_mut() {
            if let Expr::Wildcard {
                qualifier: Some(q),
                span,
            } = &item.expr
                && self.qualified_source(q).is_none()
            {
                return Err(BindError::InvalidOutputReference {
                    name: format!("{}.*", q),
                    position: (*span).into(),
                    scope: scope.clone(),
                });
            }
            if matches!(item.expr, Expr::Wildcard { .. }) {
                continue;
            }
            self.bind_expr(&mut item.expr).map_err(&invalid)?;
        }
        Ok(())
    }

    fn bind_consume(&mut self, consume: &mut ConsumeStatement) -> Result<(), BindError> {
        self.scopes.push(Scope::default());
        self.bind_table_source(&mut consume.source)?;
        if let Some(selection) = &mut consume.selection {
            self.bind_expr(selection)?;
        }
        let (columns, origins) = self.bind_projection_items(&mut consume.projection)?;
        if let Some(scope) = self.scopes.last_mut() {
            scope.aliases = columns;
        }
        let ordinals = Ordinals::Projection {
            items: &consume.projection,
            origins: &origins,
        };
        self.bind_order_items(&mut consume.order_by, ordinals)?;
        self.scopes.pop();
        Ok(())
    }

    // ── expressions ───────────────────────────────────────────────────

    /// Find the source a qualifier names, innermost scope first.
    fn qualified_source(&self, qualifier: &str) -> Option<&SourceEntry> {
        let qualifier = match &self.output_target {
            Some(target) if qualifier.eq_ignore_ascii_case("deleted") => target.as_str(),
            _ => qualifier,
        };
        self.scopes.iter().rev().find_map(|s| s.source(qualifier))
    }

    fn visible_scope(&self) -> String {
        let levels: Vec<_> = self.scopes.iter().rev().map(|s| s.describe()).collect();
        levels.join(" > ")
    }

    fn resolve_column(&self, id: &Identifier) -> Result<Resolution, BindError> {
        let position: Position = id.span.into();
        let column = id.name();

        if let Some(qualifier) = id.qualifier() {
            let Some(source) = self.qualified_source(qualifier) else {
                let names = self.scopes.iter().flat_map(|s| s.sources.iter().map(|e| &e.name));
                return Err(BindError::UnresolvedTable {
                    name: qualifier.to_string(),
                    position,
                    scope: self.visible_scope(),
                    suggestion: did_you_mean(qualifier, names),
                });
            };
            return match source.column(column) {
                Some(info) => Ok(source.resolve(info)),
                None => Err(BindError::UnresolvedColumn {
                    name: id.dotted(),
                    position,
                    scope: source.name.clone(),
                    suggestion: did_you_mean(column, source.columns.iter().map(|c| &c.name)),
                }),
            };
        }

        for scope in self.scopes.iter().rev() {
            let found = scope.sources_with(column);
            match found.as_slice() {
                [] => continue,
                [source] => {
                    let info = source.column(column).ok_or_else(|| BindError::UnresolvedColumn {
                        name: column.to_string(),
                        position,
                        scope: source.name.clone(),
                        suggestion: None,
                    })?;
                    return Ok(source.resolve(info));
                }
                many => {
                    return Err(BindError::AmbiguousColumn {
                        name: column.to_string(),
                        position,
                        candidates: many.iter().map(|s| s.name.clone()).collect(),
                    });
                }
            }
        }

        let names = self
            .scopes
            .iter()
            .flat_map(|s| s.sources.iter())
            .flat_map(|s| s.columns.iter().map(|c| &c.name));
        Err(BindError::UnresolvedColumn {
            name: column.to_string(),
            position,
            scope: self.visible_scope(),
            suggestion: did_you_mean(column, names),
        })
    }

    fn bind_expr(&mut self, expr: &mut Expr) -> Result<DataType, BindError> {
        match expr {
            Expr::Identifier(id) => {
                let resolution = self.resolve_column(id)?;
                let data_type = resolution.data_type;
                id.resolution = Some(resolution);
                Ok(data_type)
            }
            Expr::Literal { value, .. } => Ok(value.data_type()),
            Expr::Variable { name, span } => {
                if self.variables.contains(&name.to_lowercase()) {
                    Ok(DataType::Unknown)
                } else {
                    Err(BindError::UndefinedVariable {
                        name: name.clone(),
                        position: (*span).into(),
                    })
                }
            }
            Expr::Wildcard { qualifier, span } => {
                if let Some(q) = qualifier
                    && self.qualified_source(q).is_none()
                {
                    return Err(BindError::UnresolvedTable {
                        name: q.clone(),
                        position: (*span).into(),
                        scope: self.visible_scope(),
                        suggestion: None,
                    });
                }
                Ok(DataType::Unknown)
            }
            Expr::Binary { left, op, right, .. } => {
                let l = self.bind_expr(left)?;
                let r = self.bind_expr(right)?;
                Ok(binary_type(*op, l, r))
            }
            Expr::Unary { op, operand, .. } => {
                let t = self.bind_expr(operand)?;
                Ok(match op {
                    UnaryOp::Not => DataType::Bool,
                    UnaryOp::Neg => t,
                })
            }
            Expr::Grouping { inner, .. } => self.bind_expr(inner),
            Expr::Case(case) => {
                if let Some(operand) = &mut case.operand {
                    self.bind_expr(operand)?;
                }
                let mut result = DataType::Unknown;
                for when in &mut case.when_clauses {
                    self.bind_expr(&mut when.condition)?;
                    let t = self.bind_expr(&mut when.result)?;
                    if result == DataType::Unknown {
                        result = t;
                    }
                }
                if let Some(else_result) = &mut case.else_result {
                    let t = self.bind_expr(else_result)?;
                    if result == DataType::Unknown {
                        result = t;
                    }
                }
                Ok(result)
            }
            Expr::Function(function) => {
                let mut arg_types = Vec::with_capacity(function.args.len());
                for arg in &mut function.args {
                    arg_types.push(self.bind_expr(arg)?);
                }
                if let Some(over) = &mut function.over {
                    self.bind_over(over)?;
                }
                Ok(function_type(&function.name, &arg_types))
            }
            Expr::IsNull { expr, .. } => {
                self.bind_expr(expr)?;
                Ok(DataType::Bool)
            }
            Expr::InList { expr, list, .. } => {
                self.bind_expr(expr)?;
                for item in list {
                    self.bind_expr(item)?;
                }
                Ok(DataType::Bool)
            }
            Expr::Subquery { query, .. } => {
                let columns = self.bind_query(query)?;
                Ok(columns.first().map(|c| c.data_type).unwrap_or_default())
            }
            Expr::Exists { query, .. } => {
                self.bind_query(query)?;
                Ok(DataType::Bool)
            }
        }
    }

    fn bind_over(&mut self, over: &mut OverClause) -> Result<(), BindError> {
        for expr in &mut over.partition_by {
            self.bind_expr(expr)?;
        }
        for item in &mut over.order_by {
            self.bind_expr(&mut item.expr)?;
        }
        check_frame(over)
    }
}

/// Clauses where an integer names an output column.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Clause {
    OrderBy,
    GroupBy,
}

impl Clause {
    fn keyword(self) -> &'static str {
        match self {
            Clause::OrderBy => "ORDER BY",
            Clause::GroupBy => "GROUP BY",
        }
    }
}

/// Where an output column of a projection comes from.
#[derive(Debug, Clone)]
struct OutputOrigin {
    item: usize,
    /// Visible name of the source, for columns expanded from a wildcard.
    source: Option<String>,
}

impl OutputOrigin {
    fn wildcard(item: usize, source: &SourceEntry) -> Self {
        Self {
            item,
            source: Some(source.name.clone()),
        }
    }
}

/// What positional ORDER BY items refer to.
#[derive(Clone, Copy)]
enum Ordinals<'q> {
    Projection {
        items: &'q [SelectItem],
        origins: &'q [OutputOrigin],
    },
    /// A set operation, whose columns are named by its first SELECT.
    Union(&'q Select),
}

/// The position named by a bare integer literal.
fn ordinal(expr: &Expr) -> Option<(i64, Span)> {
    match expr {
        Expr::Literal {
            value: Value::Int(n),
            span,
        } => Some((*n, *span)),
        _ => None,
    }
}

fn ordinal_index(clause: Clause, n: i64, span: Span, columns: usize) -> Result<usize, BindError> {
    match usize::try_from(n) {
        Ok(index) if (1..=columns).contains(&index) => Ok(index - 1),
        _ => Err(BindError::OrdinalOutOfRange {
            clause: clause.keyword().to_string(),
            ordinal: n,
            columns,
            position: span.into(),
        }),
    }
}

/// ORDER BY over a set operation can only name columns, so the position
/// must land on a column with a real name.
fn union_ordinal(n: i64, span: Span, first: &Select, columns: &[ColumnInfo]) -> Result<Expr, BindError> {
    let index = ordinal_index(Clause::OrderBy, n, span, columns.len())?;
    let expanded = first
        .projection
        .iter()
        .any(|item| matches!(item.expr, Expr::Wildcard { .. }));
    let named = first
        .projection
        .get(index)
        .is_some_and(|item| item.alias.is_some() || matches!(item.expr, Expr::Identifier(_)));
    if !expanded && !named {
        return Err(BindError::UnnamedOrdinal {
            ordinal: n,
            position: span.into(),
        });
    }
    let column = &columns[index];
    Ok(output_alias(&column.name, column.data_type, span))
}

/// A reference to a projection alias.
fn output_alias(alias: &str, data_type: DataType, span: Span) -> Expr {
    let mut id = Identifier::new(vec![alias.to_string()], span);
    id.resolution = Some(Resolution {
        binding: Binding::OutputAlias {
            alias: alias.to_string(),
        },
        data_type,
    });
    Expr::Identifier(id)
}

/// Frame legality: extents are -1 or more, UNBOUNDED only on its own side,
/// and the start never comes after the end.
fn check_frame(over: &OverClause) -> Result<(), BindError> {
    for bound in over.bounds() {
        if bound.extent < UNBOUNDED {
            return Err(BindError::IllegalFrameBound {
                position: bound.span.into(),
                reason: format!("extent {} is negative", bound.extent),
            });
        }
    }
    if let Some(start) = &over.start
        && start.is_unbounded()
        && start.side == FrameSide::Following
    {
        return Err(BindError::IllegalFrameBound {
            position: start.span.into(),
            reason: "a frame cannot start at UNBOUNDED FOLLOWING".to_string(),
        });
    }
    if let Some(end) = &over.end {
        if end.is_unbounded() && end.side == FrameSide::Preceding {
            return Err(BindError::IllegalFrameBound {
                position: end.span.into(),
                reason: "a frame cannot end at UNBOUNDED PRECEDING".to_string(),
            });
        }
        if let Some(start) = &over.start
            && frame_offset(start) > frame_offset(end)
        {
            return Err(BindError::IllegalFrameBound {
                position: start.span.into(),
                reason: "the frame starts after it ends".to_string(),
            });
        }
    }
    Ok(())
}

/// Position of a bound relative to the current row.
fn frame_offset(bound: &FrameBound) -> i64 {
    match (bound.side, bound.extent) {
        (_, CURRENT_ROW) => 0,
        (FrameSide::Preceding, UNBOUNDED) => i64::MIN,
        (FrameSide::Following, UNBOUNDED) => i64::MAX,
        (FrameSide::Preceding, n) => -n,
        (FrameSide::Following, n) => n,
    }
}

fn binary_type(op: BinaryOp, left: DataType, right: DataType) -> DataType {
    if op.is_comparison() || op.is_logical() {
        return DataType::Bool;
    }
    match (op, left, right) {
        (BinaryOp::Concat, _, _) => DataType::Text,
        (_, DataType::Int, DataType::Int) => DataType::Int,
        (_, l, r) if l.is_numeric() && r.is_numeric() => DataType::Float,
        _ => DataType::Unknown,
    }
}

fn function_type(name: &str, args: &[DataType]) -> DataType {
    match name.to_uppercase().as_str() {
        "COUNT" | "ROW_NUMBER" | "RANK" | "DENSE_RANK" | "LENGTH" => DataType::Int,
        "AVG" => DataType::Float,
        "SUM" | "MIN" | "MAX" | "ABS" | "COALESCE" | "LAG" | "LEAD" | "FIRST_VALUE"
        | "LAST_VALUE" => args.first().copied().unwrap_or_default(),
        "UPPER" | "LOWER" | "CONCAT" | "TRIM" => DataType::Text,
        "NOW" | "CURRENT_TIMESTAMP" => DataType::Timestamp,
        _ => DataType::Unknown,
    }
}

/// Closest candidate within a distance that grows with the input length.
fn did_you_mean<'s>(input: &str, candidates: impl Iterator<Item = &'s String>) -> Option<String> {
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };
    let input = input.to_lowercase();
    let mut best: Option<(usize, &String)> = None;
    for candidate in candidates {
        let dist = levenshtein(&input, &candidate.to_lowercase());
        if dist <= threshold && best.is_none_or(|(d, _)| dist < d) {
            best = Some((dist, candidate));
        }
    }
    best.map(|(_, c)| c.clone())
}
