//! Forward-only SQL migrations, embedded at compile time and applied in
//! order at startup. Each is idempotent (`CREATE TABLE IF NOT EXISTS` /
//! `CREATE INDEX IF NOT EXISTS`) and tracked in a numbered list so
//! migrations stay reversible-in-principle even though nothing currently
//! rolls one back.

pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "schema",
        sql: include_str!("../../../migrations/0001_schema.sql"),
    },
    Migration {
        version: 2,
        name: "search_indexes",
        sql: include_str!("../../../migrations/0002_search_indexes.sql"),
    },
];
