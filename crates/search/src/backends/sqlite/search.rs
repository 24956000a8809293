//! Search and storage implementation for the SQLite backend.

use rusqlite::{Connection, params_from_iter};
use serde_json::{Map, Value};
use tracing::debug;

use crate::backends::insert_path;
use crate::core::{BackendKind, EntityStore, FetchQuery, PredicateBuilder, SearchBackend};
use crate::error::SearchResult;
use crate::resolver::ResolvedAttribute;
use crate::types::{EntityRecord, SearchOperation, SortDirection, TypedValue};

use super::backend::SqliteBackend;
use super::query_builder::{ENTITY_ALIAS, SqlFragment, SqlParam, build_condition, json_path};

impl PredicateBuilder for SqliteBackend {
    type Predicate = SqlFragment;

    fn match_all(&self) -> SqlFragment {
        SqlFragment::always()
    }

    fn predicate(
        &self,
        attribute: &ResolvedAttribute,
        operation: SearchOperation,
        value: &TypedValue,
    ) -> SearchResult<SqlFragment> {
        Ok(build_condition(attribute, operation, value))
    }

    fn and(&self, predicates: Vec<SqlFragment>) -> SqlFragment {
        SqlFragment::all(predicates)
    }

    fn or(&self, predicates: Vec<SqlFragment>) -> SqlFragment {
        SqlFragment::any(predicates)
    }
}

impl SearchBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn fetch(&self, query: &FetchQuery<'_, SqlFragment>) -> SearchResult<Vec<EntityRecord>> {
        let conn = self.get_connection()?;
        fetch_rows(&conn, query)
    }

    fn count(&self, entity_type: &str, predicate: &SqlFragment) -> SearchResult<u64> {
        let conn = self.get_connection()?;
        count_rows(&conn, entity_type, predicate)
    }

    fn fetch_and_count(
        &self,
        query: &FetchQuery<'_, SqlFragment>,
    ) -> SearchResult<(Vec<EntityRecord>, u64)> {
        // both reads share the transaction's snapshot
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let rows = fetch_rows(&tx, query)?;
        let total = count_rows(&tx, query.entity_type, query.predicate)?;
        tx.commit()?;
        Ok((rows, total))
    }
}

fn fetch_rows(
    conn: &Connection,
    query: &FetchQuery<'_, SqlFragment>,
) -> SearchResult<Vec<EntityRecord>> {
    let e = ENTITY_ALIAS;
    let mut params = Vec::new();

    let mut columns = vec![format!("{e}.id")];
    match query.projection {
        None => columns.push(format!("{e}.data")),
        Some(attributes) => {
            columns.push(format!("{e}.data -> '$.id'"));
            for attribute in attributes {
                columns.push(format!("{e}.data -> ?"));
                params.push(SqlParam::String(json_path(&attribute.document_path())));
            }
        }
    }

    params.push(SqlParam::string(query.entity_type));
    params.extend(query.predicate.params.iter().cloned());
    params.push(SqlParam::String(json_path(
        &query.sort.attribute.document_path(),
    )));
    params.push(SqlParam::Integer(i64::try_from(query.limit).unwrap_or(i64::MAX)));
    params.push(SqlParam::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));

    let direction = match query.sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    let sql = format!(
        "SELECT {columns} FROM entities {e} \
         WHERE {e}.entity_type = ? AND ({predicate}) \
         ORDER BY json_extract({e}.data, ?) {direction}, {e}.rowid ASC \
         LIMIT ? OFFSET ?",
        columns = columns.join(", "),
        predicate = query.predicate.sql,
    );
    debug!(sql = %sql, params = params.len(), "Executing SQLite fetch");

    let mut stmt = conn.prepare(&sql)?;
    let value_columns = columns.len() - 1;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            let id: String = row.get(0)?;
            let mut values = Vec::with_capacity(value_columns);
            for index in 1..=value_columns {
                values.push(row.get::<_, Option<String>>(index)?);
            }
            Ok((id, values))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, values)| {
            let data = match query.projection {
                None => parse_document(values.into_iter().next().flatten())?,
                Some(attributes) => project(&values, attributes)?,
            };
            Ok(EntityRecord::new(query.entity_type, id, data))
        })
        .collect()
}

fn count_rows(conn: &Connection, entity_type: &str, predicate: &SqlFragment) -> SearchResult<u64> {
    let e = ENTITY_ALIAS;
    let sql = format!(
        "SELECT COUNT(*) FROM entities {e} WHERE {e}.entity_type = ? AND ({})",
        predicate.sql
    );
    let mut params = vec![SqlParam::string(entity_type)];
    params.extend(predicate.params.iter().cloned());
    debug!(sql = %sql, "Executing SQLite count");

    let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or_default())
}

fn parse_document(text: Option<String>) -> SearchResult<Value> {
    match text {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Value::Null),
    }
}

/// Rebuilds a projected document from `id` followed by one JSON column per
/// attribute.
fn project(values: &[Option<String>], attributes: &[ResolvedAttribute]) -> SearchResult<Value> {
    let mut data = Map::new();
    if let Some(Some(id)) = values.first() {
        data.insert("id".to_string(), serde_json::from_str(id)?);
    }
    for (attribute, value) in attributes.iter().zip(values.iter().skip(1)) {
        let Some(text) = value else {
            continue;
        };
        let value: Value = serde_json::from_str(text)?;
        if !value.is_null() {
            insert_path(&mut data, &attribute.document_path(), value);
        }
    }
    Ok(Value::Object(data))
}

impl EntityStore for SqliteBackend {
    fn upsert(&self, record: EntityRecord) -> SearchResult<()> {
        let data = serde_json::to_string(&record.data)?;
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO entities (entity_type, id, data) VALUES (?1, ?2, ?3)
             ON CONFLICT (entity_type, id) DO UPDATE SET data = excluded.data",
            (&record.entity_type, &record.id, &data),
        )?;
        Ok(())
    }

    fn remove(&self, entity_type: &str, id: &str) -> SearchResult<bool> {
        let conn = self.get_connection()?;
        let removed = conn.execute(
            "DELETE FROM entities WHERE entity_type = ?1 AND id = ?2",
            (entity_type, id),
        )?;
        Ok(removed > 0)
    }

    fn clear(&self) -> SearchResult<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM entities", [])?;
        Ok(())
    }
}
