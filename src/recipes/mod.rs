// Copyright 2023 Remi Bernotavicius

//! Recipe lifecycle operations.
//!
//! Each write runs in one transaction: the header change, every dictionary lookup, link and
//! removal either all land or none do.

use crate::database;
use crate::database::models::{Recipe, RecipeId};
use crate::{Error, Result};
use diesel::prelude::Connection as _;
use diesel::prelude::OptionalExtension as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;

pub mod dictionary;
pub mod linker;
pub mod payload;

use payload::{
    IngredientLine, IngredientSelection, NewRecipe, RecipeIngredientDetail, RecipeUpdate,
    RecipeWithIngredients,
};

fn not_found(recipe_id: RecipeId) -> Error {
    Error::NotFound(format!("No recipe with ID of: {recipe_id}"))
}

pub fn create(conn: &mut database::Connection, new_recipe: &NewRecipe) -> Result<RecipeId> {
    payload::check_entries(&new_recipe.ingredients)?;

    let new_id = conn.transaction(|conn| {
        use database::schema::recipes::dsl::*;

        let new_id: RecipeId = diesel::insert_into(recipes)
            .values(&new_recipe.details)
            .returning(id)
            .get_result(conn)?;
        linker::link_ingredients(conn, new_id, &new_recipe.ingredients)?;
        Ok::<_, Error>(new_id)
    })?;

    log::info!(
        "added recipe {new_id} {:?} with {} ingredient(s)",
        new_recipe.details.title,
        new_recipe.ingredients.len()
    );
    Ok(new_id)
}

fn find(conn: &mut database::Connection, recipe_id: RecipeId) -> Result<Recipe> {
    use database::schema::recipes::dsl::*;

    recipes
        .find(recipe_id)
        .select(Recipe::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found(recipe_id))
}

fn ingredient_lines(
    conn: &mut database::Connection,
    recipe: RecipeId,
) -> Result<Vec<IngredientLine>> {
    use database::schema::ingredients;
    use database::schema::recipe_ingredients::dsl::*;

    let rows: Vec<(String, f32, String)> = recipe_ingredients
        .inner_join(ingredients::table)
        .filter(recipe_id.eq(recipe))
        .order_by(ingredients::lookup_name.asc())
        .select((ingredients::name, quantity, unit))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(ingredient_name, ingredient_quantity, ingredient_unit)| IngredientLine {
            name: ingredient_name,
            quantity: ingredient_quantity,
            unit: ingredient_unit,
        })
        .collect())
}

/// The recipe with its ingredients summarized into one string.
pub fn get_by_id(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
) -> Result<RecipeWithIngredients> {
    let recipe = find(conn, recipe_id)?;
    let ingredient_list = ingredient_lines(conn, recipe_id)?
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Ok(RecipeWithIngredients {
        recipe,
        ingredient_list,
    })
}

/// One row per ingredient on the recipe, for filling in an edit form.
pub fn ingredient_details(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
) -> Result<Vec<RecipeIngredientDetail>> {
    let recipe = find(conn, recipe_id)?;
    Ok(ingredient_lines(conn, recipe_id)?
        .into_iter()
        .map(|line| RecipeIngredientDetail {
            recipe: recipe.clone(),
            ingredient_name: line.name,
            ingredient_quantity: line.quantity,
            ingredient_unit: line.unit,
        })
        .collect())
}

/// All recipes ordered by id, optionally only those whose tag contains `tag_filter`, ignoring
/// case.
pub fn list(conn: &mut database::Connection, tag_filter: Option<&str>) -> Result<Vec<Recipe>> {
    use database::schema::recipes::dsl::*;
    use diesel::expression_methods::TextExpressionMethods as _;

    let mut query = recipes
        .select(Recipe::as_select())
        .order_by(id.asc())
        .into_boxed();
    if let Some(filter) = tag_filter.filter(|f| !f.is_empty()) {
        query = query.filter(tag.like(format!("%{filter}%")));
    }
    Ok(query.load(conn)?)
}

pub fn list_by_tag(conn: &mut database::Connection, exact_tag: &str) -> Result<Vec<Recipe>> {
    use database::schema::recipes::dsl::*;

    if exact_tag.is_empty() {
        return Err(Error::NotFound("No recipe with an empty tag".into()));
    }

    Ok(recipes
        .select(Recipe::as_select())
        .filter(tag.eq(exact_tag))
        .order_by(id.asc())
        .load(conn)?)
}

pub fn tags(conn: &mut database::Connection) -> Result<Vec<String>> {
    use database::schema::recipes::dsl::*;

    Ok(recipes
        .select(tag)
        .distinct()
        .order_by(tag.asc())
        .load(conn)?)
}

pub fn update(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
    recipe_update: &RecipeUpdate,
) -> Result<()> {
    let (Some(details), Some(ingredient_list)) =
        (&recipe_update.details, &recipe_update.ingredient_list)
    else {
        return Err(Error::BadRequest("No data!".into()));
    };
    payload::check_entries(ingredient_list)?;

    conn.transaction(|conn| {
        let updated = {
            use database::schema::recipes::dsl::*;

            diesel::update(recipes.find(recipe_id))
                .set(details)
                .execute(conn)?
        };
        if updated == 0 {
            return Err(not_found(recipe_id));
        }

        linker::link_ingredients(conn, recipe_id, ingredient_list)?;
        linker::unlink_and_collect(conn, recipe_id, &recipe_update.recipe_ingredients_to_remove)
    })?;

    log::info!("updated recipe {recipe_id}");
    Ok(())
}

/// Deletes the recipe. Its ingredient links go with it through the foreign key cascade, the
/// ingredients themselves stay in the dictionary.
pub fn delete(conn: &mut database::Connection, recipe_id: RecipeId) -> Result<RecipeId> {
    use database::schema::recipes::dsl::*;

    let deleted = diesel::delete(recipes.find(recipe_id)).execute(conn)?;
    if deleted == 0 {
        return Err(not_found(recipe_id));
    }
    log::info!("deleted recipe {recipe_id}");
    Ok(recipe_id)
}

/// Takes the selected ingredient off the recipe. Unlike [`update`], the ingredient stays in the
/// dictionary even if nothing uses it anymore.
pub fn remove_ingredient(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
    selection: &IngredientSelection,
) -> Result<()> {
    let entry = selection.ingredients.get(selection.index).ok_or_else(|| {
        Error::BadRequest(format!(
            "ingredient index {} out of range for {} ingredient(s)",
            selection.index,
            selection.ingredients.len()
        ))
    })?;

    let ingredient = dictionary::find_existing(conn, &entry.name)?;
    if linker::unlink(conn, recipe_id, ingredient)? {
        log::info!("removed {:?} from recipe {recipe_id}", entry.name);
    } else {
        log::debug!("{:?} wasn't on recipe {recipe_id}", entry.name);
    }
    Ok(())
}

#[cfg(test)]
use crate::database::models::RecipeDetails;
#[cfg(test)]
use payload::IngredientEntry;

#[cfg(test)]
fn details(title: &str, tag: &str) -> RecipeDetails {
    RecipeDetails {
        title: title.into(),
        description: format!("{title} description"),
        tag: tag.into(),
        instructions: format!("{title} instructions"),
    }
}

#[test]
fn create_links_every_entry() {
    let mut conn = database::seeded();

    let new_recipe = NewRecipe {
        details: details("New Title", "New Tag"),
        ingredients: vec![
            IngredientEntry::new("New Ingredient 1", 1.0, "cup"),
            IngredientEntry::new("New Ingredient 2", 2.0, "cups"),
            IngredientEntry::new("i1", 1.0, "cups"),
        ],
    };
    let new_id = create(&mut conn, &new_recipe).unwrap();

    let recipe = get_by_id(&mut conn, new_id).unwrap();
    assert_eq!(recipe.recipe.title, "New Title");
    assert_eq!(recipe.recipe.tag, "New Tag");
    assert_eq!(
        recipe.ingredient_list,
        "1 cups of i1, 1 cup of New Ingredient 1, 2 cups of New Ingredient 2"
    );

    let rows = linker::linked(&mut conn, new_id).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(dictionary::list(&mut conn).unwrap().len(), 6);
}

#[test]
fn create_rolls_back_on_bad_entry() {
    let mut conn = database::seeded();

    let new_recipe = NewRecipe {
        details: details("Broken", "Tag"),
        ingredients: vec![
            IngredientEntry::new("flour", 1.0, "cup"),
            IngredientEntry::new("sugar", -1.0, "cup"),
        ],
    };
    assert!(matches!(
        create(&mut conn, &new_recipe),
        Err(Error::BadRequest(_))
    ));
    assert_eq!(list(&mut conn, None).unwrap().len(), 3);
    assert!(dictionary::find(&mut conn, "flour").unwrap().is_none());
}

#[test]
fn shared_ingredient_lifecycle() {
    let mut conn = database::in_memory();

    let first = create(
        &mut conn,
        &NewRecipe {
            details: details("T", "Breakfast"),
            ingredients: vec![IngredientEntry::new("Egg", 2.0, "pcs")],
        },
    )
    .unwrap();
    let second = create(
        &mut conn,
        &NewRecipe {
            details: details("U", "Breakfast"),
            ingredients: vec![IngredientEntry::new("egg", 1.0, "pcs")],
        },
    )
    .unwrap();

    let egg = dictionary::find_existing(&mut conn, "EGG").unwrap();
    assert_eq!(linker::linked(&mut conn, first).unwrap()[0].ingredient_id, egg);
    assert_eq!(linker::linked(&mut conn, second).unwrap()[0].ingredient_id, egg);

    let remove_egg = |title: &str| RecipeUpdate {
        details: Some(details(title, "Breakfast")),
        ingredient_list: Some(vec![]),
        recipe_ingredients_to_remove: vec!["egg".into()],
    };

    update(&mut conn, second, &remove_egg("U")).unwrap();
    assert!(linker::linked(&mut conn, second).unwrap().is_empty());
    assert!(dictionary::find(&mut conn, "egg").unwrap().is_some());

    update(&mut conn, first, &remove_egg("T")).unwrap();
    assert!(dictionary::find(&mut conn, "egg").unwrap().is_none());
}

#[test]
fn get_by_id_summary() {
    let mut conn = database::seeded();

    let recipe = get_by_id(&mut conn, RecipeId::from(1)).unwrap();
    assert_eq!(
        recipe,
        RecipeWithIngredients {
            recipe: Recipe {
                id: RecipeId::from(1),
                title: "T1".into(),
                description: "D1".into(),
                tag: "Tag1".into(),
                instructions: "Instructions1".into(),
            },
            ingredient_list: "1 cup of i1".into(),
        }
    );

    let recipe = get_by_id(&mut conn, RecipeId::from(3)).unwrap();
    assert_eq!(
        recipe.ingredient_list,
        "1 cup of i1, 2 cups of i2, 3 cups of i3"
    );
}

#[test]
fn get_by_id_missing() {
    let mut conn = database::seeded();

    assert!(matches!(
        get_by_id(&mut conn, RecipeId::from(798)),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn get_by_id_without_ingredients() {
    let mut conn = database::in_memory();

    let new_id = create(
        &mut conn,
        &NewRecipe {
            details: details("Water", "Drinks"),
            ingredients: vec![],
        },
    )
    .unwrap();
    assert_eq!(get_by_id(&mut conn, new_id).unwrap().ingredient_list, "");
}

#[test]
fn ingredient_details_rows() {
    let mut conn = database::seeded();

    let rows = ingredient_details(&mut conn, RecipeId::from(2)).unwrap();
    let lines: Vec<_> = rows
        .iter()
        .map(|r| {
            (
                r.recipe.title.as_str(),
                r.ingredient_name.as_str(),
                r.ingredient_quantity,
                r.ingredient_unit.as_str(),
            )
        })
        .collect();
    assert_eq!(lines, [("T2", "i1", 1.0, "cup"), ("T2", "i2", 2.0, "cups")]);

    assert!(matches!(
        ingredient_details(&mut conn, RecipeId::from(798)),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn list_all_and_filtered() {
    let mut conn = database::seeded();

    let titles = |recipes: Vec<Recipe>| -> Vec<String> {
        recipes.into_iter().map(|r| r.title).collect()
    };

    assert_eq!(titles(list(&mut conn, None).unwrap()), ["T1", "T2", "T3"]);
    assert_eq!(titles(list(&mut conn, Some("")).unwrap()), ["T1", "T2", "T3"]);
    assert_eq!(titles(list(&mut conn, Some("tag2")).unwrap()), ["T2"]);
    assert_eq!(titles(list(&mut conn, Some("AG")).unwrap()), ["T1", "T2", "T3"]);
    assert!(list(&mut conn, Some("nope")).unwrap().is_empty());
}

#[test]
fn list_by_exact_tag() {
    let mut conn = database::seeded();

    let recipes = list_by_tag(&mut conn, "Tag1").unwrap();
    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0].title, "T1");

    assert!(list_by_tag(&mut conn, "tag1").unwrap().is_empty());
    assert!(matches!(
        list_by_tag(&mut conn, ""),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn distinct_tags() {
    let mut conn = database::seeded();
    create(
        &mut conn,
        &NewRecipe {
            details: details("T4", "Tag1"),
            ingredients: vec![],
        },
    )
    .unwrap();

    assert_eq!(tags(&mut conn).unwrap(), ["Tag1", "Tag2", "Tag3"]);
}

#[test]
fn update_revises_in_place() {
    let mut conn = database::seeded();
    let recipe = RecipeId::from(3);

    let recipe_update = RecipeUpdate {
        details: Some(details("T3", "New Tag")),
        ingredient_list: Some(vec![
            IngredientEntry::new("i2", 5.0, "tbsp"),
            IngredientEntry::new("Butter", 1.0, "stick"),
        ]),
        recipe_ingredients_to_remove: vec![],
    };
    update(&mut conn, recipe, &recipe_update).unwrap();

    let updated = get_by_id(&mut conn, recipe).unwrap();
    assert_eq!(updated.recipe.tag, "New Tag");
    assert_eq!(updated.recipe.description, "T3 description");
    // i1 and i3 were left out of the list but not removed.
    assert_eq!(
        updated.ingredient_list,
        "1 stick of Butter, 1 cup of i1, 5 tbsp of i2, 3 cups of i3"
    );
    assert_eq!(linker::linked(&mut conn, recipe).unwrap().len(), 4);
}

#[test]
fn update_unchanged_entry() {
    let mut conn = database::seeded();
    let recipe = RecipeId::from(1);
    let before = linker::linked(&mut conn, recipe).unwrap();

    let recipe_update = RecipeUpdate {
        details: Some(details("T1", "Tag1")),
        ingredient_list: Some(vec![IngredientEntry::new("i1", 1.0, "cup")]),
        recipe_ingredients_to_remove: vec![],
    };
    update(&mut conn, recipe, &recipe_update).unwrap();

    let after = linker::linked(&mut conn, recipe).unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].ingredient_id, before[0].ingredient_id);
    assert_eq!(after[0].quantity, before[0].quantity);
    assert_eq!(after[0].unit, before[0].unit);
}

#[test]
fn update_empty_payload() {
    let mut conn = database::seeded();

    let empty: RecipeUpdate = serde_json::from_str("{}").unwrap();
    assert!(matches!(
        update(&mut conn, RecipeId::from(1), &empty),
        Err(Error::BadRequest(_))
    ));

    let no_ingredients = RecipeUpdate {
        details: Some(details("T1", "Tag1")),
        ..Default::default()
    };
    assert!(matches!(
        update(&mut conn, RecipeId::from(1), &no_ingredients),
        Err(Error::BadRequest(_))
    ));
    assert_eq!(get_by_id(&mut conn, RecipeId::from(1)).unwrap().recipe.title, "T1");
}

#[test]
fn update_missing_recipe() {
    let mut conn = database::seeded();

    let recipe_update = RecipeUpdate {
        details: Some(details("Ghost", "Tag")),
        ingredient_list: Some(vec![IngredientEntry::new("ectoplasm", 1.0, "cup")]),
        recipe_ingredients_to_remove: vec![],
    };
    assert!(matches!(
        update(&mut conn, RecipeId::from(798), &recipe_update),
        Err(Error::NotFound(_))
    ));
    assert!(dictionary::find(&mut conn, "ectoplasm").unwrap().is_none());
}

#[test]
fn update_rolls_back_on_unknown_removal() {
    let mut conn = database::seeded();
    let recipe = RecipeId::from(1);

    let recipe_update = RecipeUpdate {
        details: Some(details("Changed", "Tag1")),
        ingredient_list: Some(vec![IngredientEntry::new("i1", 9.0, "cups")]),
        recipe_ingredients_to_remove: vec!["saffron".into()],
    };
    assert!(matches!(
        update(&mut conn, recipe, &recipe_update),
        Err(Error::NotFound(_))
    ));

    let unchanged = get_by_id(&mut conn, recipe).unwrap();
    assert_eq!(unchanged.recipe.title, "T1");
    assert_eq!(unchanged.ingredient_list, "1 cup of i1");
}

#[test]
fn delete_cascades_links() {
    let mut conn = database::seeded();

    assert_eq!(
        delete(&mut conn, RecipeId::from(3)).unwrap(),
        RecipeId::from(3)
    );
    assert!(linker::linked(&mut conn, RecipeId::from(3)).unwrap().is_empty());
    assert!(matches!(
        get_by_id(&mut conn, RecipeId::from(3)),
        Err(Error::NotFound(_))
    ));
    // i3 is now unused, but only explicit removal collects it.
    assert!(dictionary::find(&mut conn, "i3").unwrap().is_some());
}

#[test]
fn delete_missing() {
    let mut conn = database::seeded();

    assert!(matches!(
        delete(&mut conn, RecipeId::from(798)),
        Err(Error::NotFound(_))
    ));
    assert_eq!(list(&mut conn, None).unwrap().len(), 3);
}

#[test]
fn remove_ingredient_by_index() {
    let mut conn = database::seeded();
    let recipe = RecipeId::from(3);

    let selection = IngredientSelection {
        ingredients: vec![
            IngredientEntry::new("i1", 1.0, "cup"),
            IngredientEntry::new("I3", 3.0, "cups"),
        ],
        index: 1,
    };
    remove_ingredient(&mut conn, recipe, &selection).unwrap();

    assert_eq!(
        get_by_id(&mut conn, recipe).unwrap().ingredient_list,
        "1 cup of i1, 2 cups of i2"
    );
    assert!(dictionary::find(&mut conn, "i3").unwrap().is_some());
}

#[test]
fn remove_ingredient_bad_selection() {
    let mut conn = database::seeded();

    let out_of_range = IngredientSelection {
        ingredients: vec![IngredientEntry::new("i1", 1.0, "cup")],
        index: 1,
    };
    assert!(matches!(
        remove_ingredient(&mut conn, RecipeId::from(1), &out_of_range),
        Err(Error::BadRequest(_))
    ));

    let unknown = IngredientSelection {
        ingredients: vec![IngredientEntry::new("saffron", 1.0, "pinch")],
        index: 0,
    };
    assert!(matches!(
        remove_ingredient(&mut conn, RecipeId::from(1), &unknown),
        Err(Error::NotFound(_))
    ));
}
