//! Database schema and statement definitions
//!
//! Every statement is assembled at compile time from the single table name,
//! values are always bound as parameters.

macro_rules! keys_table {
    () => {
        "keys"
    };
}

/// Name of the table holding all entries
pub const KEYS_TABLE: &str = keys_table!();

/// Counts tables named `?1` in the catalog
pub const FIND_TABLE: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";

/// SQL to create the keys table
pub const CREATE_KEYS_TABLE: &str = concat!(
    r#"CREATE TABLE ""#,
    keys_table!(),
    r#"" (key TEXT NOT NULL PRIMARY KEY, value BLOB)"#
);

/// Insert a value, replacing the existing one on key conflict
pub const UPSERT_KEY: &str = concat!(
    r#"INSERT INTO ""#,
    keys_table!(),
    r#"" ("key", "value") VALUES (?1, ?2)
    ON CONFLICT("key") DO UPDATE SET "value" = excluded."value""#
);

pub const SELECT_VALUE: &str = concat!(
    r#"SELECT "value" FROM ""#,
    keys_table!(),
    r#"" WHERE "key" = ?1"#
);

pub const DELETE_KEY: &str = concat!(
    r#"DELETE FROM ""#,
    keys_table!(),
    r#"" WHERE "key" = ?1"#
);

/// Keys come back in primary-key order
pub const SELECT_KEYS: &str = concat!(
    r#"SELECT "key" FROM ""#,
    keys_table!(),
    r#"" ORDER BY "key""#
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_target_keys_table() {
        for stmt in [CREATE_KEYS_TABLE, UPSERT_KEY, SELECT_VALUE, DELETE_KEY, SELECT_KEYS] {
            assert!(stmt.contains(r#""keys""#), "{stmt}");
        }
    }
}
