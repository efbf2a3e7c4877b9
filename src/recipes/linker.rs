// Copyright 2023 Remi Bernotavicius

use super::dictionary;
use super::payload::IngredientEntry;
use crate::database;
use crate::database::models::{IngredientId, RecipeId, RecipeIngredient};
use crate::Result;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;

/// Links each entry to the recipe. An ingredient already on the recipe gets its quantity and
/// unit replaced, anything else is added. Nothing is unlinked.
pub fn link_ingredients(
    conn: &mut database::Connection,
    recipe: RecipeId,
    entries: &[IngredientEntry],
) -> Result<()> {
    for entry in entries {
        let ingredient = dictionary::resolve_or_create(conn, &entry.name)?;
        link(conn, recipe, ingredient, entry.quantity, &entry.unit)?;
    }
    Ok(())
}

fn link(
    conn: &mut database::Connection,
    recipe: RecipeId,
    ingredient: IngredientId,
    new_quantity: f32,
    new_unit: &str,
) -> Result<()> {
    use database::schema::recipe_ingredients::dsl::*;

    diesel::insert_into(recipe_ingredients)
        .values(RecipeIngredient {
            recipe_id: recipe,
            ingredient_id: ingredient,
            quantity: new_quantity,
            unit: new_unit.into(),
        })
        .on_conflict((recipe_id, ingredient_id))
        .do_update()
        .set((quantity.eq(new_quantity), unit.eq(new_unit)))
        .execute(conn)?;
    Ok(())
}

/// Returns whether the ingredient was on the recipe.
pub fn unlink(
    conn: &mut database::Connection,
    recipe: RecipeId,
    ingredient: IngredientId,
) -> Result<bool> {
    use database::schema::recipe_ingredients::dsl::*;

    let deleted = diesel::delete(
        recipe_ingredients
            .filter(recipe_id.eq(recipe))
            .filter(ingredient_id.eq(ingredient)),
    )
    .execute(conn)?;
    Ok(deleted > 0)
}

/// Takes the named ingredients off the recipe, dropping any that end up unused from the
/// dictionary. Every name must already be in the dictionary.
pub fn unlink_and_collect(
    conn: &mut database::Connection,
    recipe: RecipeId,
    names: &[String],
) -> Result<()> {
    for ingredient_name in names {
        let ingredient = dictionary::find_existing(conn, ingredient_name)?;
        unlink(conn, recipe, ingredient)?;
        dictionary::collect_if_orphaned(conn, ingredient)?;
    }
    Ok(())
}

#[cfg(test)]
pub fn linked(conn: &mut database::Connection, recipe: RecipeId) -> Result<Vec<RecipeIngredient>> {
    use database::schema::recipe_ingredients::dsl::*;
    use diesel::SelectableHelper as _;

    Ok(recipe_ingredients
        .select(RecipeIngredient::as_select())
        .filter(recipe_id.eq(recipe))
        .order_by(ingredient_id.asc())
        .load(conn)?)
}

#[cfg(test)]
fn usage(conn: &mut database::Connection, recipe: i32, ingredient: i32) -> Option<(f32, String)> {
    linked(conn, RecipeId::from(recipe))
        .unwrap()
        .into_iter()
        .find(|u| u.ingredient_id == IngredientId::from(ingredient))
        .map(|u| (u.quantity, u.unit))
}

#[test]
fn link_adds_and_updates_in_place() {
    let mut conn = database::seeded();
    let recipe = RecipeId::from(2);

    link_ingredients(
        &mut conn,
        recipe,
        &[
            IngredientEntry::new("I1", 3.0, "tbsp"),
            IngredientEntry::new("butter", 1.0, "stick"),
        ],
    )
    .unwrap();

    let rows = linked(&mut conn, recipe).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(usage(&mut conn, 2, 1), Some((3.0, "tbsp".into())));
    assert_eq!(usage(&mut conn, 2, 2), Some((2.0, "cups".into())));

    let butter = dictionary::find_existing(&mut conn, "Butter").unwrap();
    assert!(rows.iter().any(|r| r.ingredient_id == butter));
}

#[test]
fn link_same_entry_twice_is_idempotent() {
    let mut conn = database::seeded();
    let recipe = RecipeId::from(1);
    let entries = [IngredientEntry::new("i1", 1.0, "cup")];

    link_ingredients(&mut conn, recipe, &entries).unwrap();
    link_ingredients(&mut conn, recipe, &entries).unwrap();

    let rows = linked(&mut conn, recipe).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ingredient_id, IngredientId::from(1));
    assert_eq!((rows[0].quantity, rows[0].unit.as_str()), (1.0, "cup"));
}

#[test]
fn link_same_name_differing_case_last_wins() {
    let mut conn = database::in_memory();
    let recipe = crate::recipes::create(
        &mut conn,
        &crate::recipes::payload::NewRecipe {
            details: crate::database::models::RecipeDetails {
                title: "Omelette".into(),
                description: "".into(),
                tag: "Breakfast".into(),
                instructions: "".into(),
            },
            ingredients: vec![
                IngredientEntry::new("Egg", 2.0, "pcs"),
                IngredientEntry::new("egg", 1.0, "pcs"),
            ],
        },
    )
    .unwrap();

    let rows = linked(&mut conn, recipe).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].quantity, rows[0].unit.as_str()), (1.0, "pcs"));
    assert_eq!(
        crate::recipes::get_by_id(&mut conn, recipe)
            .unwrap()
            .ingredient_list,
        "1 pcs of Egg"
    );
}

#[test]
fn unlink_and_collect_keeps_shared_ingredients() {
    let mut conn = database::seeded();

    // i3 is only used by recipe 3, i2 by recipes 2 and 3.
    unlink_and_collect(&mut conn, RecipeId::from(3), &["I3".into(), "i2".into()]).unwrap();

    assert_eq!(linked(&mut conn, RecipeId::from(3)).unwrap().len(), 1);
    assert!(dictionary::find(&mut conn, "i3").unwrap().is_none());
    assert!(dictionary::find(&mut conn, "i2").unwrap().is_some());
}

#[test]
fn unlink_and_collect_unknown_name() {
    let mut conn = database::seeded();

    assert!(matches!(
        unlink_and_collect(&mut conn, RecipeId::from(1), &["saffron".into()]),
        Err(crate::Error::NotFound(_))
    ));
}
