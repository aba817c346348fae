//! Database module for codevault
//!
//! Handles SQLite storage for the symbol graph including:
//! - Schema creation
//! - Source unit and symbol storage
//! - Dependency edges and symbol references
//! - Query operations
//!
//! Referential integrity is enforced by the schema itself: foreign keys with
//! cascading deletes, a span CHECK and span triggers. Constraint failures
//! surface as [`VaultError::SchemaIntegrity`] and abort the enclosing
//! transaction.

mod schema;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::types::{
    DependencyEdge, SourceUnit, Symbol, SymbolKind, SymbolReference, VaultStats, DEPENDS_ON,
};

const SYMBOL_COLUMNS: &str =
    "key, source_unit_key, start_pos, end_pos, name, kind, description, dependencies, exported";

/// Database handle for the symbol graph
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    // =========================================================================
    // Source Units
    // =========================================================================

    /// Insert or update a source unit. `created_at` of an existing row is kept.
    pub fn upsert_source_unit(&self, unit: &SourceUnit) -> Result<()> {
        upsert_source_unit_row(&self.conn, unit)
    }

    /// Get a source unit by content hash
    pub fn get_source_unit(&self, key: &str) -> Result<Option<SourceUnit>> {
        let result = self
            .conn
            .query_row(
                "SELECT key, description, size_bytes, created_at FROM source_units WHERE key = ?1",
                params![key],
                |row| {
                    Ok(SourceUnit {
                        key: row.get(0)?,
                        description: row.get(1)?,
                        size_bytes: row.get::<_, i64>(2)? as u64,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// All source unit keys, sorted
    pub fn source_unit_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM source_units ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    /// Atomically remove a source unit, its symbols, and every edge or
    /// reference that mentions those symbols.
    ///
    /// Returns whether any row was removed.
    pub fn delete_by_source_unit(&mut self, key: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            DELETE FROM dependency_edges
            WHERE from_key IN (SELECT key FROM symbols WHERE source_unit_key = ?1)
               OR to_key IN (SELECT key FROM symbols WHERE source_unit_key = ?1)
            "#,
            params![key],
        )?;
        tx.execute(
            r#"
            DELETE FROM symbol_references
            WHERE source_unit_key = ?1
               OR definition_key IN (SELECT key FROM symbols WHERE source_unit_key = ?1)
            "#,
            params![key],
        )?;
        let symbols = tx.execute("DELETE FROM symbols WHERE source_unit_key = ?1", params![key])?;
        let units = tx.execute("DELETE FROM source_units WHERE key = ?1", params![key])?;

        tx.commit()?;
        debug!(
            "Deleted source unit {} ({} symbols)",
            key, symbols
        );
        Ok(units + symbols > 0)
    }

    // =========================================================================
    // Symbols
    // =========================================================================

    /// Insert or replace symbols by key in one transaction
    pub fn upsert_symbols(&mut self, symbols: &[Symbol]) -> Result<()> {
        let tx = self.conn.transaction()?;
        upsert_symbol_rows(&tx, symbols, &now())?;
        tx.commit()?;
        Ok(())
    }

    /// Persist a source unit together with its symbols and references.
    ///
    /// Everything is written in one transaction. With `replace`, symbols of
    /// the unit that are absent from `symbols` are deleted and the unit's
    /// references are rewritten. Resolved `depends_on` edges leaving the
    /// given symbols are dropped; [`Database::resolve_dependency_edges`]
    /// rebuilds them. References to unknown definitions are skipped; the
    /// number written is returned.
    pub fn persist_unit(
        &mut self,
        unit: &SourceUnit,
        symbols: &[Symbol],
        references: &[SymbolReference],
        replace: bool,
    ) -> Result<usize> {
        let now = now();
        let tx = self.conn.transaction()?;

        upsert_source_unit_row(&tx, unit)?;

        if replace {
            let keep: Vec<&str> = symbols.iter().map(|s| s.key.as_str()).collect();
            let existing = {
                let mut stmt = tx.prepare("SELECT key FROM symbols WHERE source_unit_key = ?1")?;
                let rows = stmt.query_map(params![unit.key], |row| row.get::<_, String>(0))?;
                let mut keys = Vec::new();
                for row in rows {
                    keys.push(row?);
                }
                keys
            };
            for stale in existing.iter().filter(|k| !keep.contains(&k.as_str())) {
                tx.execute("DELETE FROM symbols WHERE key = ?1", params![stale])?;
            }
            tx.execute(
                "DELETE FROM symbol_references WHERE source_unit_key = ?1",
                params![unit.key],
            )?;
        }

        // Outgoing edges of kept keys may no longer match their dependencies
        for symbol in symbols {
            tx.execute(
                "DELETE FROM dependency_edges WHERE from_key = ?1 AND edge_type = ?2",
                params![symbol.key, DEPENDS_ON],
            )?;
        }

        upsert_symbol_rows(&tx, symbols, &now)?;

        let mut written = 0;
        for reference in references {
            written += tx.execute(
                r#"
                INSERT OR REPLACE INTO symbol_references
                    (source_unit_key, start_pos, end_pos, definition_key, reference_type, created_at)
                SELECT ?1, ?2, ?3, ?4, ?5, ?6
                WHERE EXISTS (SELECT 1 FROM symbols WHERE key = ?4)
                "#,
                params![
                    reference.source_unit_key,
                    reference.start_pos as i64,
                    reference.end_pos as i64,
                    reference.definition_key,
                    reference.reference_type,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(written)
    }

    /// Get a symbol by key
    pub fn get_symbol(&self, key: &str) -> Result<Option<Symbol>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {} FROM symbols WHERE key = ?1", SYMBOL_COLUMNS),
                params![key],
                row_to_symbol,
            )
            .optional()?;
        Ok(result)
    }

    /// Symbols with exactly this name
    pub fn find_symbols_by_name(&self, name: &str) -> Result<Vec<Symbol>> {
        self.query_symbols(
            &format!(
                "SELECT {} FROM symbols WHERE name = ?1 ORDER BY source_unit_key, start_pos",
                SYMBOL_COLUMNS
            ),
            params![name],
        )
    }

    /// Symbols owned by a source unit, in source order
    pub fn find_symbols_by_source_unit(&self, key: &str) -> Result<Vec<Symbol>> {
        self.query_symbols(
            &format!(
                "SELECT {} FROM symbols WHERE source_unit_key = ?1 ORDER BY start_pos",
                SYMBOL_COLUMNS
            ),
            params![key],
        )
    }

    pub fn find_symbols_by_kind(&self, kind: SymbolKind, limit: u32) -> Result<Vec<Symbol>> {
        self.query_symbols(
            &format!(
                "SELECT {} FROM symbols WHERE kind = ?1 ORDER BY name LIMIT ?2",
                SYMBOL_COLUMNS
            ),
            params![kind.as_str(), limit as i64],
        )
    }

    /// Search symbols by name (case-insensitive prefix match)
    pub fn search_symbols(
        &self,
        query: &str,
        kind: Option<SymbolKind>,
        limit: u32,
    ) -> Result<Vec<Symbol>> {
        let pattern = format!("{}%", escape_like(&query.to_lowercase()));

        match kind {
            Some(k) => self.query_symbols(
                &format!(
                    r#"
                    SELECT {} FROM symbols
                    WHERE LOWER(name) LIKE ?1 ESCAPE '\' AND kind = ?2
                    ORDER BY LENGTH(name), name
                    LIMIT ?3
                    "#,
                    SYMBOL_COLUMNS
                ),
                params![pattern, k.as_str(), limit as i64],
            ),
            None => self.query_symbols(
                &format!(
                    r#"
                    SELECT {} FROM symbols
                    WHERE LOWER(name) LIKE ?1 ESCAPE '\'
                    ORDER BY LENGTH(name), name
                    LIMIT ?2
                    "#,
                    SYMBOL_COLUMNS
                ),
                params![pattern, limit as i64],
            ),
        }
    }

    fn query_symbols(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Symbol>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_symbol)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    // =========================================================================
    // Dependency Edges
    // =========================================================================

    /// Insert an edge if both endpoints exist. Returns whether a row was added.
    pub fn insert_edge(&self, edge: &DependencyEdge) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO dependency_edges (from_key, to_key, edge_type)
            SELECT ?1, ?2, ?3
            WHERE EXISTS (SELECT 1 FROM symbols WHERE key = ?1)
              AND EXISTS (SELECT 1 FROM symbols WHERE key = ?2)
            "#,
            params![edge.from_key, edge.to_key, edge.edge_type],
        )?;
        Ok(inserted > 0)
    }

    /// Every stored edge
    pub fn dependency_edges(&self) -> Result<Vec<DependencyEdge>> {
        self.query_edges(
            "SELECT from_key, to_key, edge_type FROM dependency_edges ORDER BY from_key, to_key",
            params![],
        )
    }

    /// Edges leaving a symbol
    pub fn edges_from(&self, key: &str) -> Result<Vec<DependencyEdge>> {
        self.query_edges(
            "SELECT from_key, to_key, edge_type FROM dependency_edges WHERE from_key = ?1",
            params![key],
        )
    }

    /// Edges arriving at a symbol
    pub fn edges_to(&self, key: &str) -> Result<Vec<DependencyEdge>> {
        self.query_edges(
            "SELECT from_key, to_key, edge_type FROM dependency_edges WHERE to_key = ?1",
            params![key],
        )
    }

    fn query_edges(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<DependencyEdge>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(DependencyEdge {
                from_key: row.get(0)?,
                to_key: row.get(1)?,
                edge_type: row.get(2)?,
            })
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Turn the dependency names of the given units' symbols into edges.
    ///
    /// A name resolves to a symbol of the same unit first, then to any
    /// stored symbol with that name. A dotted name `A.b` that does not
    /// resolve falls back to `A`. Names that resolve to nothing are left
    /// as strings on the symbol.
    ///
    /// Units elsewhere in the store whose symbols depend on a name defined
    /// by the given units are resolved again as well, so the graph does not
    /// depend on the order units were added. Each resolved unit's
    /// `depends_on` edges are rebuilt from scratch. Returns the number of
    /// edges written.
    pub fn resolve_dependency_edges(&mut self, unit_keys: &[String]) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let mut targets: BTreeSet<String> = unit_keys.iter().cloned().collect();
        for key in unit_keys {
            targets.extend(dependent_units(&tx, key)?);
        }

        let mut added = 0;
        for unit_key in &targets {
            added += resolve_unit_edges(&tx, unit_key)?;
        }

        tx.commit()?;
        if added > 0 {
            debug!(
                "Resolved {} dependency edges across {} units",
                added,
                targets.len()
            );
        }
        Ok(added)
    }

    /// Units other than `key` holding a symbol whose dependencies name a
    /// symbol defined in `key`
    pub fn dependent_units(&self, key: &str) -> Result<Vec<String>> {
        dependent_units(&self.conn, key)
    }

    // =========================================================================
    // Symbol References
    // =========================================================================

    /// References recorded inside a source unit, in source order
    pub fn references_in_unit(&self, key: &str) -> Result<Vec<SymbolReference>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT source_unit_key, start_pos, end_pos, definition_key, reference_type
            FROM symbol_references WHERE source_unit_key = ?1 ORDER BY start_pos
            "#,
        )?;
        let rows = stmt.query_map(params![key], |row| {
            Ok(SymbolReference {
                source_unit_key: row.get(0)?,
                start_pos: row.get::<_, i64>(1)? as u64,
                end_pos: row.get::<_, i64>(2)? as u64,
                definition_key: row.get(3)?,
                reference_type: row.get(4)?,
            })
        })?;

        let mut refs = Vec::new();
        for row in rows {
            refs.push(row?);
        }
        Ok(refs)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get index statistics
    pub fn get_stats(&self) -> Result<VaultStats> {
        let count = |table: &str| -> Result<u64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as u64)
        };

        let db_size_bytes: u64 = self
            .conn
            .query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
            .unwrap_or(0);

        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM symbols GROUP BY kind ORDER BY kind")?;
        let kind_rows = stmt.query_map([], |row| {
            let kind_str: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((kind_str, count as u64))
        })?;
        let mut symbol_kinds = Vec::new();
        for row in kind_rows {
            let (kind_str, count) = row?;
            if let Some(kind) = SymbolKind::parse(&kind_str) {
                symbol_kinds.push((kind, count));
            }
        }

        Ok(VaultStats {
            source_units: count("source_units")?,
            symbols: count("symbols")?,
            dependency_edges: count("dependency_edges")?,
            references: count("symbol_references")?,
            db_size_bytes,
            symbol_kinds,
        })
    }
}

fn upsert_source_unit_row(conn: &Connection, unit: &SourceUnit) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO source_units (key, description, size_bytes, created_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(key) DO UPDATE SET
            description = excluded.description,
            size_bytes = excluded.size_bytes
        "#,
        params![
            unit.key,
            unit.description,
            unit.size_bytes as i64,
            unit.created_at,
        ],
    )?;
    Ok(())
}

fn upsert_symbol_rows(conn: &Connection, symbols: &[Symbol], now: &str) -> Result<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO symbols (
            key, source_unit_key, start_pos, end_pos, name, kind,
            description, dependencies, exported, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(key) DO UPDATE SET
            source_unit_key = excluded.source_unit_key,
            start_pos = excluded.start_pos,
            end_pos = excluded.end_pos,
            name = excluded.name,
            kind = excluded.kind,
            description = excluded.description,
            dependencies = excluded.dependencies,
            exported = excluded.exported
        "#,
    )?;

    for symbol in symbols {
        if symbol.start_pos >= symbol.end_pos {
            return Err(VaultError::SchemaIntegrity(format!(
                "symbol {} has empty span {}..{}",
                symbol.key, symbol.start_pos, symbol.end_pos
            )));
        }
        let dependencies = serde_json::to_string(&symbol.dependencies)?;
        stmt.execute(params![
            symbol.key,
            symbol.source_unit_key,
            symbol.start_pos as i64,
            symbol.end_pos as i64,
            symbol.name,
            symbol.kind.as_str(),
            symbol.description,
            dependencies,
            symbol.exported,
            now,
        ])?;
    }
    Ok(())
}

fn resolve_name(
    conn: &Connection,
    local: &HashMap<&str, &str>,
    name: &str,
) -> Result<Option<String>> {
    if let Some(key) = local.get(name) {
        return Ok(Some(key.to_string()));
    }
    let key = conn
        .query_row(
            "SELECT key FROM symbols WHERE name = ?1 ORDER BY exported DESC, rowid LIMIT 1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key)
}

fn dependent_units(conn: &Connection, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT s.source_unit_key
        FROM symbols s, json_each(s.dependencies) d
        WHERE s.source_unit_key != ?1
          AND EXISTS (
              SELECT 1 FROM symbols t
              WHERE t.source_unit_key = ?1
                AND (d.value = t.name
                     OR substr(d.value, 1, length(t.name) + 1) = t.name || '.')
          )
        ORDER BY s.source_unit_key
        "#,
    )?;
    let rows = stmt.query_map(params![key], |row| row.get(0))?;

    let mut units = Vec::new();
    for row in rows {
        units.push(row?);
    }
    Ok(units)
}

/// Rebuild the `depends_on` edges leaving the symbols of one unit
fn resolve_unit_edges(conn: &Connection, unit_key: &str) -> Result<usize> {
    let symbols = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM symbols WHERE source_unit_key = ?1",
            SYMBOL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![unit_key], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        symbols
    };

    conn.execute(
        r#"
        DELETE FROM dependency_edges
        WHERE edge_type = ?2
          AND from_key IN (SELECT key FROM symbols WHERE source_unit_key = ?1)
        "#,
        params![unit_key, DEPENDS_ON],
    )?;

    let local: HashMap<&str, &str> = symbols
        .iter()
        .map(|s| (s.name.as_str(), s.key.as_str()))
        .collect();

    let mut added = 0;
    for symbol in &symbols {
        for dependency in &symbol.dependencies {
            let target = match resolve_name(conn, &local, dependency)? {
                Some(t) => t,
                None => match dependency.split_once('.') {
                    Some((head, _)) => match resolve_name(conn, &local, head)? {
                        Some(t) => t,
                        None => continue,
                    },
                    None => continue,
                },
            };
            if target == symbol.key {
                continue;
            }
            added += conn.execute(
                "INSERT OR IGNORE INTO dependency_edges (from_key, to_key, edge_type) VALUES (?1, ?2, ?3)",
                params![symbol.key, target, DEPENDS_ON],
            )?;
        }
    }
    Ok(added)
}

fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<Symbol> {
    let kind_str: String = row.get(5)?;
    let kind = SymbolKind::parse(&kind_str)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(5, kind_str.clone(), Type::Text))?;
    let dependencies_json: String = row.get(7)?;
    let dependencies: Vec<String> = serde_json::from_str(&dependencies_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Symbol {
        key: row.get(0)?,
        source_unit_key: row.get(1)?,
        start_pos: row.get::<_, i64>(2)? as u64,
        end_pos: row.get::<_, i64>(3)? as u64,
        name: row.get(4)?,
        kind,
        description: row.get(6)?,
        dependencies,
        exported: row.get(8)?,
    })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(key: &str, size: u64) -> SourceUnit {
        SourceUnit {
            key: key.to_string(),
            description: format!("unit {}", key),
            size_bytes: size,
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn symbol(key: &str, unit: &str, name: &str, span: (u64, u64), deps: &[&str]) -> Symbol {
        Symbol {
            key: key.to_string(),
            source_unit_key: unit.to_string(),
            start_pos: span.0,
            end_pos: span.1,
            name: name.to_string(),
            kind: SymbolKind::Function,
            description: format!("function {}", name),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            exported: true,
        }
    }

    #[test]
    fn test_persist_and_query() {
        let mut db = Database::in_memory().unwrap();
        let symbols = vec![
            symbol("k1", "u1", "hello", (0, 20), &[]),
            symbol("k2", "u1", "world", (21, 40), &["hello"]),
        ];
        db.persist_unit(&unit("u1", 50), &symbols, &[], false)
            .unwrap();

        assert_eq!(db.get_source_unit("u1").unwrap().unwrap().size_bytes, 50);
        assert_eq!(db.find_symbols_by_source_unit("u1").unwrap(), symbols);
        assert_eq!(db.find_symbols_by_name("world").unwrap()[0].dependencies, vec!["hello"]);
        assert_eq!(db.find_symbols_by_kind(SymbolKind::Function, 10).unwrap().len(), 2);
        assert!(db.find_symbols_by_kind(SymbolKind::Class, 10).unwrap().is_empty());
        assert_eq!(db.source_unit_keys().unwrap(), vec!["u1".to_string()]);
    }

    #[test]
    fn test_upsert_keeps_created_at() {
        let db = Database::in_memory().unwrap();
        db.upsert_source_unit(&unit("u1", 10)).unwrap();
        let mut changed = unit("u1", 10);
        changed.description = "new".to_string();
        changed.created_at = "2030-01-01T00:00:00+00:00".to_string();
        db.upsert_source_unit(&changed).unwrap();

        let stored = db.get_source_unit("u1").unwrap().unwrap();
        assert_eq!(stored.description, "new");
        assert_eq!(stored.created_at, "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_upsert_symbols_replaces_by_key() {
        let mut db = Database::in_memory().unwrap();
        db.upsert_source_unit(&unit("u1", 100)).unwrap();
        db.upsert_source_unit(&unit("u2", 100)).unwrap();
        db.upsert_symbols(&[symbol("k1", "u1", "a", (0, 5), &[])])
            .unwrap();

        // Same key moved to another unit with a new span
        db.upsert_symbols(&[symbol("k1", "u2", "a", (10, 30), &[])])
            .unwrap();

        let all = db.find_symbols_by_name("a").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_unit_key, "u2");
        assert_eq!((all[0].start_pos, all[0].end_pos), (10, 30));
    }

    #[test]
    fn test_symbol_without_unit_is_rejected() {
        let mut db = Database::in_memory().unwrap();
        let err = db
            .upsert_symbols(&[symbol("k1", "missing", "a", (0, 5), &[])])
            .unwrap_err();
        assert!(matches!(err, VaultError::SchemaIntegrity(_)));
        assert!(db.find_symbols_by_name("a").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_spans_are_rejected() {
        let mut db = Database::in_memory().unwrap();
        db.upsert_source_unit(&unit("u1", 10)).unwrap();

        let empty = db.upsert_symbols(&[symbol("k1", "u1", "a", (5, 5), &[])]);
        assert!(matches!(empty, Err(VaultError::SchemaIntegrity(_))));

        let too_long = db.upsert_symbols(&[symbol("k2", "u1", "b", (0, 11), &[])]);
        assert!(matches!(too_long, Err(VaultError::SchemaIntegrity(_))));
    }

    #[test]
    fn test_failed_persist_leaves_no_rows() {
        let mut db = Database::in_memory().unwrap();
        let symbols = vec![
            symbol("k1", "u1", "ok", (0, 5), &[]),
            symbol("k2", "u1", "bad", (0, 500), &[]),
        ];
        assert!(db.persist_unit(&unit("u1", 10), &symbols, &[], false).is_err());
        assert!(db.get_source_unit("u1").unwrap().is_none());
        assert!(db.find_symbols_by_name("ok").unwrap().is_empty());
    }

    #[test]
    fn test_delete_cascades_to_edges_and_references() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(
            &unit("u1", 100),
            &[symbol("a", "u1", "a", (0, 10), &["b"])],
            &[],
            false,
        )
        .unwrap();
        db.persist_unit(
            &unit("u2", 100),
            &[symbol("b", "u2", "b", (0, 10), &["a"])],
            &[SymbolReference {
                source_unit_key: "u2".to_string(),
                start_pos: 20,
                end_pos: 21,
                definition_key: "a".to_string(),
                reference_type: "call".to_string(),
            }],
            false,
        )
        .unwrap();
        assert_eq!(
            db.resolve_dependency_edges(&["u1".to_string(), "u2".to_string()])
                .unwrap(),
            2
        );
        assert_eq!(db.references_in_unit("u2").unwrap().len(), 1);

        assert!(db.delete_by_source_unit("u1").unwrap());

        assert!(db.find_symbols_by_source_unit("u1").unwrap().is_empty());
        assert!(db.get_source_unit("u1").unwrap().is_none());
        assert!(db
            .dependency_edges()
            .unwrap()
            .iter()
            .all(|e| e.from_key != "a" && e.to_key != "a"));
        assert!(db.references_in_unit("u2").unwrap().is_empty());
        assert_eq!(db.find_symbols_by_source_unit("u2").unwrap().len(), 1);

        assert!(!db.delete_by_source_unit("u1").unwrap());
    }

    #[test]
    fn test_edges_only_between_existing_symbols() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(&unit("u1", 100), &[symbol("a", "u1", "a", (0, 10), &[])], &[], false)
            .unwrap();

        let dangling = DependencyEdge {
            from_key: "a".to_string(),
            to_key: "nowhere".to_string(),
            edge_type: DEPENDS_ON.to_string(),
        };
        assert!(!db.insert_edge(&dangling).unwrap());
        assert!(db.dependency_edges().unwrap().is_empty());
    }

    #[test]
    fn test_resolution_prefers_same_unit_and_falls_back_on_dotted_names() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(
            &unit("u1", 100),
            &[symbol("other_config", "u1", "Config", (0, 10), &[])],
            &[],
            false,
        )
        .unwrap();
        db.persist_unit(
            &unit("u2", 100),
            &[
                symbol("local_config", "u2", "Config", (0, 10), &[]),
                symbol("user", "u2", "load", (11, 30), &["Config.defaults", "missing"]),
            ],
            &[],
            false,
        )
        .unwrap();

        assert_eq!(db.resolve_dependency_edges(&["u2".to_string()]).unwrap(), 1);
        let edges = db.edges_from("user").unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to_key, "local_config");
        assert_eq!(edges[0].edge_type, DEPENDS_ON);
        assert_eq!(db.edges_to("local_config").unwrap().len(), 1);
    }

    #[test]
    fn test_resolution_does_not_depend_on_insertion_order() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(
            &unit("u1", 100),
            &[symbol("load", "u1", "load", (0, 10), &["Config"])],
            &[],
            false,
        )
        .unwrap();
        assert_eq!(db.resolve_dependency_edges(&["u1".to_string()]).unwrap(), 0);

        // The definition arrives later, in its own batch
        db.persist_unit(
            &unit("u2", 100),
            &[symbol("config", "u2", "Config", (0, 10), &[])],
            &[],
            false,
        )
        .unwrap();
        assert_eq!(db.dependent_units("u2").unwrap(), vec!["u1".to_string()]);
        assert_eq!(db.resolve_dependency_edges(&["u2".to_string()]).unwrap(), 1);

        let edges = db.edges_from("load").unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to_key, "config");

        // Resolving again rebuilds rather than duplicates
        db.resolve_dependency_edges(&["u1".to_string(), "u2".to_string()])
            .unwrap();
        assert_eq!(db.dependency_edges().unwrap().len(), 1);
    }

    #[test]
    fn test_dependent_units_match_dotted_names() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(
            &unit("u1", 100),
            &[symbol("run", "u1", "run", (0, 10), &["Utils.log", "Utilsx"])],
            &[],
            false,
        )
        .unwrap();
        db.persist_unit(
            &unit("u2", 100),
            &[symbol("utils", "u2", "Utils", (0, 10), &[])],
            &[],
            false,
        )
        .unwrap();

        assert_eq!(db.dependent_units("u2").unwrap(), vec!["u1".to_string()]);
        assert!(db.dependent_units("u1").unwrap().is_empty());
        db.resolve_dependency_edges(&["u2".to_string()]).unwrap();
        assert_eq!(db.edges_to("utils").unwrap().len(), 1);
    }

    #[test]
    fn test_persist_drops_outgoing_edges_of_kept_keys() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(
            &unit("u1", 100),
            &[symbol("config", "u1", "Config", (0, 10), &[])],
            &[],
            false,
        )
        .unwrap();
        db.persist_unit(
            &unit("u2", 100),
            &[symbol("stable", "u2", "load", (0, 10), &["Config"])],
            &[],
            false,
        )
        .unwrap();
        db.resolve_dependency_edges(&["u2".to_string()]).unwrap();
        assert_eq!(db.edges_from("stable").unwrap().len(), 1);

        // Same key, edited content that no longer names Config
        db.persist_unit(
            &unit("u3", 100),
            &[symbol("stable", "u3", "load", (0, 12), &[])],
            &[],
            false,
        )
        .unwrap();
        assert!(db.edges_from("stable").unwrap().is_empty());

        db.resolve_dependency_edges(&["u3".to_string()]).unwrap();
        assert!(db.edges_from("stable").unwrap().is_empty());
    }

    #[test]
    fn test_references_to_unknown_definitions_are_skipped() {
        let mut db = Database::in_memory().unwrap();
        let reference = |start: u64, definition: &str| SymbolReference {
            source_unit_key: "u1".to_string(),
            start_pos: start,
            end_pos: start + 1,
            definition_key: definition.to_string(),
            reference_type: "call".to_string(),
        };

        let written = db
            .persist_unit(
                &unit("u1", 100),
                &[symbol("a", "u1", "a", (0, 10), &[])],
                &[reference(20, "a"), reference(30, "ghost")],
                false,
            )
            .unwrap();

        assert_eq!(written, 1);
        let stored = db.references_in_unit("u1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].definition_key, "a");
    }

    #[test]
    fn test_replace_drops_stale_symbols() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(
            &unit("u1", 100),
            &[
                symbol("a", "u1", "a", (0, 10), &[]),
                symbol("b", "u1", "b", (11, 20), &[]),
            ],
            &[],
            false,
        )
        .unwrap();

        db.persist_unit(&unit("u1", 100), &[symbol("c", "u1", "c", (0, 10), &[])], &[], true)
            .unwrap();

        let names: Vec<String> = db
            .find_symbols_by_source_unit("u1")
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn test_search_symbols_prefix() {
        let mut db = Database::in_memory().unwrap();
        let mut class = symbol("k3", "u1", "HelloService", (40, 60), &[]);
        class.kind = SymbolKind::Class;
        db.persist_unit(
            &unit("u1", 100),
            &[
                symbol("k1", "u1", "hello", (0, 10), &[]),
                symbol("k2", "u1", "helloWorld", (11, 30), &[]),
                class,
                symbol("k4", "u1", "h_x", (61, 70), &[]),
            ],
            &[],
            false,
        )
        .unwrap();

        let found = db.search_symbols("HELLO", None, 10).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].name, "hello");

        let classes = db.search_symbols("hello", Some(SymbolKind::Class), 10).unwrap();
        assert_eq!(classes.len(), 1);

        // LIKE wildcards in the query are literal
        assert!(db.search_symbols("h%", None, 10).unwrap().is_empty());
        assert_eq!(db.search_symbols("h_", None, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut db = Database::in_memory().unwrap();
        db.persist_unit(&unit("u1", 100), &[symbol("a", "u1", "a", (0, 10), &[])], &[], false)
            .unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.source_units, 1);
        assert_eq!(stats.symbols, 1);
        assert_eq!(stats.dependency_edges, 0);
        assert_eq!(stats.symbol_kinds, vec![(SymbolKind::Function, 1)]);
    }
}
