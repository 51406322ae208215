//! In-process storage backend
//!
//! Tables live behind one mutex. Every statement is appended to a journal so
//! callers can assert how often (and whether) storage was touched, and
//! failures can be injected per statement kind. Transactions snapshot all
//! tables on `begin`, write through to the live tables and restore the
//! snapshot on rollback (or when dropped unfinished).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Condition, Ddl, Executor, Query, Storage, StorageTransaction};
use crate::error::{ModelError, OrmResult};
use crate::schema::TableSchema;
use crate::value::{Row, Value};

/// Kinds of statement recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
    Count,
    Begin,
    Commit,
    Rollback,
    Ddl,
    SchemaLoad,
}

/// One journal entry
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: Option<String>,
    pub in_transaction: bool,
}

#[derive(Debug, Clone)]
struct IndexDef {
    name: String,
    columns: Vec<String>,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Row>,
    next_id: i64,
    indexes: Vec<(IndexDef, bool)>,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            next_id: 1,
            indexes: Vec::new(),
        }
    }

    fn check_columns<'a>(&self, columns: impl Iterator<Item = &'a String>) -> OrmResult<()> {
        for column in columns {
            if !self.schema.has_column(column) {
                return Err(ModelError::Storage(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    column, self.schema.name
                )));
            }
        }
        Ok(())
    }

    fn check_not_null(&self, row: &Row) -> OrmResult<()> {
        for column in self.schema.columns.iter().filter(|c| !c.nullable) {
            if row.get(&column.name).map_or(true, Value::is_null) {
                return Err(ModelError::Storage(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    column.name, self.schema.name
                )));
            }
        }
        Ok(())
    }

    /// Primary key and unique indexes must hold over `rows`; rows with a
    /// null key column never conflict
    fn check_unique(&self, rows: &[Row]) -> OrmResult<()> {
        let mut keys: Vec<(&str, &[String])> = Vec::new();
        if !self.schema.primary_key.is_empty() {
            keys.push(("primary key", self.schema.primary_key.as_slice()));
        }
        for (index, unique) in &self.indexes {
            if *unique {
                keys.push((index.name.as_str(), index.columns.as_slice()));
            }
        }

        for (name, columns) in keys {
            let mut seen: Vec<Vec<&Value>> = Vec::new();
            for row in rows {
                let key: Vec<&Value> = columns
                    .iter()
                    .map(|c| row.get(c).unwrap_or(&Value::Null))
                    .collect();
                if key.iter().any(|v| v.is_null()) {
                    continue;
                }
                if seen.iter().any(|other| {
                    other
                        .iter()
                        .zip(&key)
                        .all(|(a, b)| a.compare(b) == std::cmp::Ordering::Equal)
                }) {
                    return Err(ModelError::Storage(format!(
                        "duplicate key value violates unique constraint \"{}\" on \"{}\"",
                        name, self.schema.name
                    )));
                }
                seen.push(key);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, MemoryTable>,
    journal: Vec<Statement>,
    failures: Vec<(StatementKind, String)>,
}

impl State {
    /// Journal the statement and fire an injected failure if one is pending
    fn record(&mut self, kind: StatementKind, table: Option<&str>, in_transaction: bool) -> OrmResult<()> {
        self.journal.push(Statement {
            kind,
            table: table.map(str::to_string),
            in_transaction,
        });
        if let Some(pos) = self.failures.iter().position(|(k, _)| *k == kind) {
            let (_, message) = self.failures.remove(pos);
            return Err(ModelError::Storage(message));
        }
        Ok(())
    }

    fn table(&self, name: &str) -> OrmResult<&MemoryTable> {
        self.tables.get(name).ok_or_else(|| missing_relation(name))
    }

    fn table_mut(&mut self, name: &str) -> OrmResult<&mut MemoryTable> {
        self.tables.get_mut(name).ok_or_else(|| missing_relation(name))
    }

    fn insert(&mut self, table: &str, values: &Row, returning: &[String]) -> OrmResult<Row> {
        let t = self.table_mut(table)?;
        t.check_columns(values.keys())?;

        let mut row = Row::new();
        for column in &t.schema.columns {
            let value = match values.get(&column.name) {
                Some(v) if !(v.is_null() && column.auto_increment) => v.clone(),
                _ if column.auto_increment => {
                    let id = t.next_id;
                    t.next_id += 1;
                    Value::Integer(id)
                }
                _ => column.default_value.clone().unwrap_or(Value::Null),
            };
            if column.auto_increment {
                if let Value::Integer(id) = value {
                    t.next_id = t.next_id.max(id + 1);
                }
            }
            row.insert(column.name.clone(), value);
        }
        t.check_not_null(&row)?;

        let mut rows = t.rows.clone();
        rows.push(row.clone());
        t.check_unique(&rows)?;
        t.rows = rows;

        Ok(returning
            .iter()
            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
            .collect())
    }

    fn update(&mut self, table: &str, values: &Row, condition: &Condition) -> OrmResult<u64> {
        let t = self.table_mut(table)?;
        t.check_columns(values.keys())?;

        let mut rows = t.rows.clone();
        let mut affected = 0;
        for row in rows.iter_mut().filter(|r| condition.matches(r)) {
            for (column, value) in values {
                row.insert(column.clone(), value.clone());
            }
            t.check_not_null(row)?;
            affected += 1;
        }
        t.check_unique(&rows)?;
        t.rows = rows;
        Ok(affected)
    }

    fn increment(
        &mut self,
        table: &str,
        counters: &BTreeMap<String, i64>,
        condition: &Condition,
    ) -> OrmResult<u64> {
        let t = self.table_mut(table)?;
        t.check_columns(counters.keys())?;

        let mut rows = t.rows.clone();
        let mut affected = 0;
        for row in rows.iter_mut().filter(|r| condition.matches(r)) {
            for (column, delta) in counters {
                let next = match row.get(column).unwrap_or(&Value::Null) {
                    Value::Null => Value::Null,
                    Value::Integer(i) => Value::Integer(i + delta),
                    Value::Float(f) => Value::Float(f + *delta as f64),
                    other => {
                        return Err(ModelError::Storage(format!(
                            "cannot increment column \"{}\" of type {}",
                            column,
                            other.type_name()
                        )))
                    }
                };
                row.insert(column.clone(), next);
            }
            affected += 1;
        }
        t.rows = rows;
        Ok(affected)
    }

    fn delete(&mut self, table: &str, condition: &Condition) -> OrmResult<u64> {
        let t = self.table_mut(table)?;
        let before = t.rows.len();
        t.rows.retain(|r| !condition.matches(r));
        Ok((before - t.rows.len()) as u64)
    }

    fn select(&self, query: &Query) -> OrmResult<Vec<Row>> {
        let t = self.table(&query.table)?;
        t.check_columns(query.order_by.iter().map(|(c, _)| c))?;

        let mut rows: Vec<Row> = t
            .rows
            .iter()
            .filter(|r| query.condition.matches(r))
            .cloned()
            .collect();

        if !query.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for (column, direction) in &query.order_by {
                    let left = a.get(column).unwrap_or(&Value::Null);
                    let right = b.get(column).unwrap_or(&Value::Null);
                    let ordering = match direction {
                        super::OrderDirection::Asc => left.compare(right),
                        super::OrderDirection::Desc => right.compare(left),
                    };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn count(&self, query: &Query) -> OrmResult<u64> {
        let t = self.table(&query.table)?;
        Ok(t.rows.iter().filter(|r| query.condition.matches(r)).count() as u64)
    }

    fn apply_ddl(&mut self, ddl: &Ddl) -> OrmResult<()> {
        match ddl {
            Ddl::CreateTable(schema) => {
                if self.tables.contains_key(&schema.name) {
                    return Err(ModelError::Storage(format!(
                        "relation \"{}\" already exists",
                        schema.name
                    )));
                }
                self.tables
                    .insert(schema.name.clone(), MemoryTable::new(schema.clone()));
            }
            Ddl::DropTable(name) => {
                self.tables.remove(name).ok_or_else(|| missing_relation(name))?;
            }
            Ddl::RenameTable { from, to } => {
                if self.tables.contains_key(to) {
                    return Err(ModelError::Storage(format!("relation \"{}\" already exists", to)));
                }
                let mut t = self.tables.remove(from).ok_or_else(|| missing_relation(from))?;
                t.schema.name = to.clone();
                self.tables.insert(to.clone(), t);
            }
            Ddl::AddColumn { table, column } => {
                let t = self.table_mut(table)?;
                if t.schema.has_column(&column.name) {
                    return Err(ModelError::Storage(format!(
                        "column \"{}\" of relation \"{}\" already exists",
                        column.name, table
                    )));
                }
                let fill = column.default_value.clone().unwrap_or(Value::Null);
                if fill.is_null() && !column.nullable && !t.rows.is_empty() {
                    return Err(ModelError::Storage(format!(
                        "column \"{}\" of relation \"{}\" contains null values",
                        column.name, table
                    )));
                }
                for row in &mut t.rows {
                    row.insert(column.name.clone(), fill.clone());
                }
                t.schema = std::mem::replace(&mut t.schema, TableSchema::new(table.as_str()))
                    .column(column.clone());
            }
            Ddl::DropColumn { table, column } => {
                let t = self.table_mut(table)?;
                if !t.schema.has_column(column) {
                    return Err(ModelError::Storage(format!(
                        "column \"{}\" of relation \"{}\" does not exist",
                        column, table
                    )));
                }
                t.schema.remove_column(column);
                for row in &mut t.rows {
                    row.remove(column);
                }
                t.indexes.retain(|(index, _)| !index.columns.contains(column));
            }
            Ddl::CreateIndex {
                name,
                table,
                columns,
                unique,
            } => {
                let t = self.table_mut(table)?;
                t.check_columns(columns.iter())?;
                if t.indexes.iter().any(|(index, _)| &index.name == name) {
                    return Err(ModelError::Storage(format!("relation \"{}\" already exists", name)));
                }
                t.indexes.push((
                    IndexDef {
                        name: name.clone(),
                        columns: columns.clone(),
                    },
                    *unique,
                ));
                if let Err(err) = t.check_unique(&t.rows) {
                    t.indexes.pop();
                    return Err(err);
                }
            }
            Ddl::DropIndex { name, table } => {
                let t = self.table_mut(table)?;
                let before = t.indexes.len();
                t.indexes.retain(|(index, _)| &index.name != name);
                if t.indexes.len() == before {
                    return Err(ModelError::Storage(format!("index \"{}\" does not exist", name)));
                }
            }
        }
        Ok(())
    }
}

fn missing_relation(name: &str) -> ModelError {
    ModelError::Storage(format!("relation \"{}\" does not exist", name))
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // A panic while holding the lock leaves the tables as they were after
    // the last completed statement
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Statement execution shared by the storage and its transactions
fn execute<T>(
    state: &Mutex<State>,
    kind: StatementKind,
    table: &str,
    in_transaction: bool,
    op: impl FnOnce(&mut State) -> OrmResult<T>,
) -> OrmResult<T> {
    let mut guard = lock(state);
    guard.record(kind, Some(table), in_transaction)?;
    tracing::debug!("memory storage: {:?} on '{}'", kind, table);
    op(&mut guard)
}

/// In-memory storage; clones share the same tables and journal
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table outside the journal
    pub fn create_table(&self, schema: TableSchema) {
        lock(&self.state)
            .tables
            .insert(schema.name.clone(), MemoryTable::new(schema));
    }

    /// Current rows of a table, outside the journal
    pub fn rows(&self, table: &str) -> Vec<Row> {
        lock(&self.state)
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        lock(&self.state).tables.contains_key(table)
    }

    /// Make the next statement of `kind` fail with a storage error
    pub fn fail_next(&self, kind: StatementKind, message: &str) {
        lock(&self.state).failures.push((kind, message.to_string()));
    }

    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.state).journal.clone()
    }

    pub fn count_statements(&self, kind: StatementKind) -> usize {
        lock(&self.state)
            .journal
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    pub fn statement_count(&self) -> usize {
        lock(&self.state).journal.len()
    }

    pub fn clear_journal(&self) {
        lock(&self.state).journal.clear();
    }
}

#[async_trait]
impl Executor for MemoryStorage {
    async fn insert(&self, table: &str, values: &Row, returning: &[String]) -> OrmResult<Row> {
        execute(&self.state, StatementKind::Insert, table, false, |s| {
            s.insert(table, values, returning)
        })
    }

    async fn update(&self, table: &str, values: &Row, condition: &Condition) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Update, table, false, |s| {
            s.update(table, values, condition)
        })
    }

    async fn increment(
        &self,
        table: &str,
        counters: &BTreeMap<String, i64>,
        condition: &Condition,
    ) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Update, table, false, |s| {
            s.increment(table, counters, condition)
        })
    }

    async fn delete(&self, table: &str, condition: &Condition) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Delete, table, false, |s| {
            s.delete(table, condition)
        })
    }

    async fn select(&self, query: &Query) -> OrmResult<Vec<Row>> {
        execute(&self.state, StatementKind::Select, &query.table, false, |s| {
            s.select(query)
        })
    }

    async fn count(&self, query: &Query) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Count, &query.table, false, |s| {
            s.count(query)
        })
    }

    async fn apply_ddl(&self, ddl: &Ddl) -> OrmResult<()> {
        let table = ddl.affected_tables().first().map(|t| t.to_string()).unwrap_or_default();
        execute(&self.state, StatementKind::Ddl, &table, false, |s| s.apply_ddl(ddl))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn begin(&self) -> OrmResult<Box<dyn StorageTransaction>> {
        let mut guard = lock(&self.state);
        guard
            .record(StatementKind::Begin, None, true)
            .map_err(|e| ModelError::Transaction(e.to_string()))?;
        let snapshot = guard.tables.clone();
        tracing::debug!("memory storage: transaction started");
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            snapshot: Some(snapshot),
        }))
    }

    async fn load_table_schema(&self, table: &str) -> OrmResult<Option<TableSchema>> {
        let mut guard = lock(&self.state);
        guard.record(StatementKind::SchemaLoad, Some(table), false)?;
        Ok(guard.tables.get(table).map(|t| t.schema.clone()))
    }
}

/// Transaction over a [`MemoryStorage`]
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    snapshot: Option<BTreeMap<String, MemoryTable>>,
}

impl MemoryTransaction {
    fn restore(&mut self, guard: &mut State) {
        if let Some(snapshot) = self.snapshot.take() {
            guard.tables = snapshot;
        }
    }
}

#[async_trait]
impl Executor for MemoryTransaction {
    async fn insert(&self, table: &str, values: &Row, returning: &[String]) -> OrmResult<Row> {
        execute(&self.state, StatementKind::Insert, table, true, |s| {
            s.insert(table, values, returning)
        })
    }

    async fn update(&self, table: &str, values: &Row, condition: &Condition) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Update, table, true, |s| {
            s.update(table, values, condition)
        })
    }

    async fn increment(
        &self,
        table: &str,
        counters: &BTreeMap<String, i64>,
        condition: &Condition,
    ) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Update, table, true, |s| {
            s.increment(table, counters, condition)
        })
    }

    async fn delete(&self, table: &str, condition: &Condition) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Delete, table, true, |s| {
            s.delete(table, condition)
        })
    }

    async fn select(&self, query: &Query) -> OrmResult<Vec<Row>> {
        execute(&self.state, StatementKind::Select, &query.table, true, |s| {
            s.select(query)
        })
    }

    async fn count(&self, query: &Query) -> OrmResult<u64> {
        execute(&self.state, StatementKind::Count, &query.table, true, |s| {
            s.count(query)
        })
    }

    async fn apply_ddl(&self, ddl: &Ddl) -> OrmResult<()> {
        let table = ddl.affected_tables().first().map(|t| t.to_string()).unwrap_or_default();
        execute(&self.state, StatementKind::Ddl, &table, true, |s| s.apply_ddl(ddl))
    }
}

#[async_trait]
impl StorageTransaction for MemoryTransaction {
    async fn commit(mut self: Box<Self>) -> OrmResult<()> {
        let state = Arc::clone(&self.state);
        let mut guard = lock(&state);
        if let Err(err) = guard.record(StatementKind::Commit, None, true) {
            self.restore(&mut guard);
            return Err(ModelError::Transaction(err.to_string()));
        }
        self.snapshot = None;
        tracing::debug!("memory storage: transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> OrmResult<()> {
        let state = Arc::clone(&self.state);
        let mut guard = lock(&state);
        self.restore(&mut guard);
        guard
            .record(StatementKind::Rollback, None, true)
            .map_err(|e| ModelError::Transaction(e.to_string()))?;
        tracing::debug!("memory storage: transaction rolled back");
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.snapshot.is_some() {
            let state = Arc::clone(&self.state);
            let mut guard = lock(&state);
            self.restore(&mut guard);
            guard.journal.push(Statement {
                kind: StatementKind::Rollback,
                table: None,
                in_transaction: true,
            });
            tracing::debug!("memory storage: unfinished transaction rolled back on drop");
        }
    }
}
