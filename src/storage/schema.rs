//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Recipe-Harvest
//! database: run tracking, the per-target status table shared by both crawl
//! kinds, the raw-response audit table, and the derived recipe entities.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    kind TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Per-target status bookkeeping, shared by both crawl kinds
CREATE TABLE IF NOT EXISTS targets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    target_id INTEGER NOT NULL,
    payload TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    http_status INTEGER,
    error_text TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_checked TEXT,
    next_eligible TEXT,
    UNIQUE(kind, target_id)
);

CREATE INDEX IF NOT EXISTS idx_targets_kind_status ON targets(kind, status);
CREATE INDEX IF NOT EXISTS idx_targets_next_eligible ON targets(next_eligible);

-- Verbatim remote responses, kept for audit and replay
CREATE TABLE IF NOT EXISTS raw_responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_id INTEGER NOT NULL,
    fetched_at TEXT NOT NULL,
    raw_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_raw_responses_target ON raw_responses(target_id);

-- Derived recipe entities
CREATE TABLE IF NOT EXISTS recipes (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    image_url TEXT,
    ready_in_minutes INTEGER,
    servings INTEGER,
    source_url TEXT,
    vegetarian INTEGER NOT NULL DEFAULT 0,
    vegan INTEGER NOT NULL DEFAULT 0,
    gluten_free INTEGER NOT NULL DEFAULT 0,
    very_popular INTEGER NOT NULL DEFAULT 0,
    preparation_minutes INTEGER,
    cooking_minutes INTEGER,
    aggregate_likes INTEGER,
    instructions TEXT,
    fetched_at TEXT NOT NULL,
    image_downloaded INTEGER NOT NULL DEFAULT 0,
    image_file_type TEXT
);

CREATE TABLE IF NOT EXISTS recipe_ingredients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
    ingredient_id INTEGER,
    name TEXT,
    name_clean TEXT,
    original TEXT,
    original_name TEXT,
    amount REAL,
    unit TEXT
);

CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id);

-- Cuisine lookup table, deduplicated by name
CREATE TABLE IF NOT EXISTS cuisines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS recipe_cuisines (
    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
    cuisine_id INTEGER NOT NULL REFERENCES cuisines(id),
    UNIQUE(recipe_id, cuisine_id)
);

-- Dish type lookup table, deduplicated by name
CREATE TABLE IF NOT EXISTS dish_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS recipe_dish_types (
    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
    dish_type_id INTEGER NOT NULL REFERENCES dish_types(id),
    UNIQUE(recipe_id, dish_type_id)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "runs",
            "targets",
            "raw_responses",
            "recipes",
            "recipe_ingredients",
            "cuisines",
            "recipe_cuisines",
            "dish_types",
            "recipe_dish_types",
        ];

        for table in tables {
            let count: Result<i64, _> = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'",
                    table
                ),
                [],
                |row| row.get(0),
            );
            assert!(count.is_ok());
            assert_eq!(count.unwrap(), 1, "Table {} should exist", table);
        }
    }
}
