// Copyright 2023 Remi Bernotavicius

//! The shared ingredient dictionary.
//!
//! Every read and write of the `ingredients` table goes through here. Names are matched
//! case-insensitively through the `lookup_name` column, whose UNIQUE constraint keeps a single
//! row per name even when two writers race to create it.

use crate::database;
use crate::database::models::{Ingredient, IngredientId, NewIngredient};
use crate::{Error, Result};
use diesel::prelude::Connection as _;
use diesel::prelude::OptionalExtension as _;
use diesel::result::DatabaseErrorKind;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;

const MAX_CREATE_ATTEMPTS: usize = 3;

fn lookup_key(ingredient_name: &str) -> String {
    ingredient_name.to_lowercase()
}

fn find_by_key(conn: &mut database::Connection, key: &str) -> Result<Option<IngredientId>> {
    use database::schema::ingredients::dsl::*;

    Ok(ingredients
        .select(id)
        .filter(lookup_name.eq(key))
        .first(conn)
        .optional()?)
}

pub fn find(conn: &mut database::Connection, ingredient_name: &str) -> Result<Option<Ingredient>> {
    use database::schema::ingredients::dsl::*;

    Ok(ingredients
        .select(Ingredient::as_select())
        .filter(lookup_name.eq(lookup_key(ingredient_name)))
        .first(conn)
        .optional()?)
}

/// Like [`find`], but an unknown name is an error.
pub fn find_existing(conn: &mut database::Connection, ingredient_name: &str) -> Result<IngredientId> {
    find(conn, ingredient_name)?
        .map(|ingredient| ingredient.id)
        .ok_or_else(|| Error::NotFound(format!("No ingredient named: {ingredient_name}")))
}

/// Returns the dictionary entry for `ingredient_name`, creating it if no entry matches
/// case-insensitively.
pub fn resolve_or_create(
    conn: &mut database::Connection,
    ingredient_name: &str,
) -> Result<IngredientId> {
    use database::schema::ingredients::dsl::*;

    let key = lookup_key(ingredient_name);
    for _ in 0..MAX_CREATE_ATTEMPTS {
        if let Some(existing) = find_by_key(conn, &key)? {
            return Ok(existing);
        }

        // Savepoint, so a lost race doesn't poison an enclosing transaction. SQLite only lets
        // one writer in at a time, so the retry below is for other connections and backends;
        // a single connection inside a write transaction doesn't get there.
        let inserted = conn.transaction(|conn| {
            diesel::insert_into(ingredients)
                .values(NewIngredient {
                    name: ingredient_name,
                    lookup_name: &key,
                })
                .returning(id)
                .get_result::<IngredientId>(conn)
        });
        match inserted {
            Ok(new_id) => {
                log::debug!("added ingredient {ingredient_name:?} as {new_id}");
                return Ok(new_id);
            }
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                log::warn!("ingredient {ingredient_name:?} was created concurrently, looking it up again");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Conflict(format!(
        "couldn't resolve ingredient {ingredient_name:?}"
    )))
}

/// Deletes the ingredient if no recipe uses it anymore. Returns whether it was deleted.
pub fn collect_if_orphaned(
    conn: &mut database::Connection,
    orphan_id: IngredientId,
) -> Result<bool> {
    let referenced: bool = {
        use database::schema::recipe_ingredients::dsl::*;

        diesel::select(diesel::dsl::exists(
            recipe_ingredients.filter(ingredient_id.eq(orphan_id)),
        ))
        .get_result(conn)?
    };

    if referenced {
        return Ok(false);
    }

    let deleted = {
        use database::schema::ingredients::dsl::*;

        diesel::delete(ingredients.filter(id.eq(orphan_id))).execute(conn)?
    };
    if deleted > 0 {
        log::debug!("collected orphaned ingredient {orphan_id}");
    }
    Ok(deleted > 0)
}

/// Deletes every ingredient no recipe uses. Returns how many were deleted.
pub fn collect_orphans(conn: &mut database::Connection) -> Result<usize> {
    use database::schema::ingredients::dsl::*;
    use database::schema::recipe_ingredients;

    let referenced = recipe_ingredients::table.select(recipe_ingredients::ingredient_id);
    let deleted =
        diesel::delete(ingredients.filter(diesel::dsl::not(id.eq_any(referenced)))).execute(conn)?;
    log::info!("collected {deleted} orphaned ingredient(s)");
    Ok(deleted)
}

pub fn list(conn: &mut database::Connection) -> Result<Vec<Ingredient>> {
    use database::schema::ingredients::dsl::*;

    Ok(ingredients
        .select(Ingredient::as_select())
        .order_by(name.asc())
        .load(conn)?)
}

#[test]
fn resolve_is_case_insensitive() {
    let mut conn = database::in_memory();

    let egg = resolve_or_create(&mut conn, "Egg").unwrap();
    assert_eq!(resolve_or_create(&mut conn, "egg").unwrap(), egg);
    assert_eq!(resolve_or_create(&mut conn, "EGG").unwrap(), egg);
    assert_eq!(resolve_or_create(&mut conn, "eGg").unwrap(), egg);

    let all = list(&mut conn).unwrap();
    assert_eq!(
        all,
        vec![Ingredient {
            id: egg,
            name: "Egg".into()
        }]
    );
}

#[test]
fn resolve_finds_existing() {
    let mut conn = database::seeded();

    assert_eq!(
        resolve_or_create(&mut conn, "I2").unwrap(),
        IngredientId::from(2)
    );
    assert_eq!(list(&mut conn).unwrap().len(), 4);
}

#[test]
fn resolve_non_ascii() {
    let mut conn = database::in_memory();

    let creme = resolve_or_create(&mut conn, "Crème Fraîche").unwrap();
    assert_eq!(resolve_or_create(&mut conn, "CRÈME FRAÎCHE").unwrap(), creme);
}

#[test]
fn find_existing_unknown() {
    let mut conn = database::seeded();

    assert_eq!(find_existing(&mut conn, "I3").unwrap(), IngredientId::from(3));
    assert!(matches!(
        find_existing(&mut conn, "saffron"),
        Err(Error::NotFound(_))
    ));
    assert!(find(&mut conn, "saffron").unwrap().is_none());
}

#[test]
fn collect_if_orphaned_keeps_referenced() {
    let mut conn = database::seeded();

    assert!(!collect_if_orphaned(&mut conn, IngredientId::from(1)).unwrap());
    assert!(collect_if_orphaned(&mut conn, IngredientId::from(4)).unwrap());

    let names: Vec<_> = list(&mut conn)
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, ["i1", "i2", "i3"]);
}

#[test]
fn collect_orphans_sweeps_unreferenced() {
    let mut conn = database::seeded();
    resolve_or_create(&mut conn, "i5").unwrap();

    assert_eq!(collect_orphans(&mut conn).unwrap(), 2);
    assert_eq!(collect_orphans(&mut conn).unwrap(), 0);
    assert_eq!(list(&mut conn).unwrap().len(), 3);
}
