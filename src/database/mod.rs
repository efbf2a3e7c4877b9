// Copyright 2023 Remi Bernotavicius

use crate::{Error, Result};
use diesel::prelude::Connection as _;
use diesel::RunQueryDsl as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;

pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn establish_connection(path: impl AsRef<Path>) -> Result<Connection> {
    let url = path.as_ref().to_string_lossy();
    open(&url)
}

fn open(url: &str) -> Result<Connection> {
    let mut connection = Connection::establish(url)?;

    // SQLite leaves foreign keys off by default, cascading deletes depend on them.
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(&mut connection)?;

    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(Error::Migration)?;
    if !applied.is_empty() {
        log::info!("applied {} migration(s) to {url}", applied.len());
    }
    Ok(connection)
}

#[cfg(test)]
pub fn in_memory() -> Connection {
    open(":memory:").unwrap()
}

/// An in-memory database holding three recipes, four ingredients and two users.
///
/// `i4` is referenced by no recipe.
#[cfg(test)]
pub fn seeded() -> Connection {
    let mut conn = in_memory();
    diesel::sql_query(
        "INSERT INTO recipes (id, title, description, tag, instructions) VALUES
            (1, 'T1', 'D1', 'Tag1', 'Instructions1'),
            (2, 'T2', 'D2', 'Tag2', 'Instructions2'),
            (3, 'T3', 'D3', 'Tag3', 'Instructions3')",
    )
    .execute(&mut conn)
    .unwrap();
    diesel::sql_query(
        "INSERT INTO ingredients (id, name, lookup_name) VALUES
            (1, 'i1', 'i1'),
            (2, 'i2', 'i2'),
            (3, 'i3', 'i3'),
            (4, 'i4', 'i4')",
    )
    .execute(&mut conn)
    .unwrap();
    diesel::sql_query(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit) VALUES
            (1, 1, 1, 'cup'),
            (2, 1, 1, 'cup'),
            (2, 2, 2, 'cups'),
            (3, 1, 1, 'cup'),
            (3, 2, 2, 'cups'),
            (3, 3, 3, 'cups')",
    )
    .execute(&mut conn)
    .unwrap();
    diesel::sql_query(
        "INSERT INTO users (id, username, first_name, last_name, email, is_admin) VALUES
            (1, 'u1', 'U1F', 'U1L', 'u1@email.com', FALSE),
            (2, 'u2', 'U2F', 'U2L', 'u2@email.com', TRUE)",
    )
    .execute(&mut conn)
    .unwrap();
    conn
}

#[test]
fn migrations() {
    let mut conn = in_memory();

    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
    conn.revert_all_migrations(MIGRATIONS).unwrap();
    assert!(conn.has_pending_migration(MIGRATIONS).unwrap());
    conn.run_pending_migrations(MIGRATIONS).unwrap();
    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
}

#[test]
fn lookup_name_is_unique() {
    let mut conn = seeded();
    let result = diesel::sql_query(
        "INSERT INTO ingredients (name, lookup_name) VALUES ('I1', 'i1')",
    )
    .execute(&mut conn);
    assert!(matches!(
        result,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        ))
    ));
}
