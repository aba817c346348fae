//! Database schema definition

pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Source units: one row per distinct stored content hash
CREATE TABLE IF NOT EXISTS source_units (
    key TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Symbols: named top-level declarations owned by a source unit
CREATE TABLE IF NOT EXISTS symbols (
    key TEXT PRIMARY KEY,
    source_unit_key TEXT NOT NULL,
    start_pos INTEGER NOT NULL,
    end_pos INTEGER NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    description TEXT NOT NULL,
    dependencies TEXT NOT NULL DEFAULT '[]',
    exported INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    CHECK (start_pos >= 0 AND start_pos < end_pos),
    FOREIGN KEY (source_unit_key) REFERENCES source_units(key) ON DELETE CASCADE
);

-- Dependency edges: resolved symbol-to-symbol dependencies
CREATE TABLE IF NOT EXISTS dependency_edges (
    from_key TEXT NOT NULL,
    to_key TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    PRIMARY KEY (from_key, to_key, edge_type),
    FOREIGN KEY (from_key) REFERENCES symbols(key) ON DELETE CASCADE,
    FOREIGN KEY (to_key) REFERENCES symbols(key) ON DELETE CASCADE
);

-- Symbol references: occurrences of a symbol inside a source unit
CREATE TABLE IF NOT EXISTS symbol_references (
    source_unit_key TEXT NOT NULL,
    start_pos INTEGER NOT NULL,
    end_pos INTEGER NOT NULL,
    definition_key TEXT NOT NULL,
    reference_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (source_unit_key, start_pos, end_pos),
    FOREIGN KEY (source_unit_key) REFERENCES source_units(key) ON DELETE CASCADE,
    FOREIGN KEY (definition_key) REFERENCES symbols(key) ON DELETE CASCADE
);

-- A symbol span must lie inside its source unit
CREATE TRIGGER IF NOT EXISTS symbols_span_insert
BEFORE INSERT ON symbols
WHEN NEW.end_pos > (SELECT size_bytes FROM source_units WHERE key = NEW.source_unit_key)
BEGIN
    SELECT RAISE(ABORT, 'symbol span exceeds source unit size');
END;

CREATE TRIGGER IF NOT EXISTS symbols_span_update
BEFORE UPDATE ON symbols
WHEN NEW.end_pos > (SELECT size_bytes FROM source_units WHERE key = NEW.source_unit_key)
BEGIN
    SELECT RAISE(ABORT, 'symbol span exceeds source unit size');
END;

-- Indexes for efficient queries
CREATE INDEX IF NOT EXISTS idx_symbols_source_unit ON symbols(source_unit_key);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_name_lower ON symbols(LOWER(name));
CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind);

CREATE INDEX IF NOT EXISTS idx_edges_from ON dependency_edges(from_key);
CREATE INDEX IF NOT EXISTS idx_edges_to ON dependency_edges(to_key);

CREATE INDEX IF NOT EXISTS idx_references_definition ON symbol_references(definition_key);
"#;
