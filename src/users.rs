// Copyright 2023 Remi Bernotavicius

//! Users and the recipes they've marked as favorites.

use crate::database;
use crate::database::models::{Favorite, NewUser, Recipe, RecipeId, User, UserId, UserUpdate};
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use serde::Serialize;

pub fn register(conn: &mut database::Connection, new_user: &NewUser) -> Result<User> {
    use database::schema::users::dsl::*;

    let duplicate: bool = diesel::select(diesel::dsl::exists(
        users.filter(username.eq(&new_user.username)),
    ))
    .get_result(conn)?;
    if duplicate {
        return Err(Error::BadRequest(format!(
            "Duplicate username: {}",
            new_user.username
        )));
    }

    let user = diesel::insert_into(users)
        .values(new_user)
        .returning(User::as_returning())
        .get_result(conn)?;
    log::info!("registered user {:?}", new_user.username);
    Ok(user)
}

pub fn get(conn: &mut database::Connection, wanted: &str) -> Result<User> {
    use database::schema::users::dsl::*;

    users
        .select(User::as_select())
        .filter(username.eq(wanted))
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("No user: {wanted}")))
}

pub fn list(conn: &mut database::Connection) -> Result<Vec<User>> {
    use database::schema::users::dsl::*;

    Ok(users
        .select(User::as_select())
        .order_by(username.asc())
        .load(conn)?)
}

pub fn update(
    conn: &mut database::Connection,
    wanted: &str,
    user_update: &UserUpdate,
) -> Result<User> {
    use database::schema::users::dsl::*;

    if user_update.is_empty() {
        return Err(Error::BadRequest("No data!".into()));
    }

    let user = diesel::update(users.filter(username.eq(wanted)))
        .set(user_update)
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("No user: {wanted}")))?;
    log::info!("updated user {wanted:?}");
    Ok(user)
}

/// Deletes the user along with their favorites.
pub fn remove(conn: &mut database::Connection, unwanted: &str) -> Result<()> {
    use database::schema::users::dsl::*;

    let deleted = diesel::delete(users.filter(username.eq(unwanted))).execute(conn)?;
    if deleted == 0 {
        return Err(Error::NotFound(format!("No user: {unwanted}")));
    }
    log::info!("removed user {unwanted:?}");
    Ok(())
}

fn recipe_exists(conn: &mut database::Connection, wanted: RecipeId) -> Result<bool> {
    use database::schema::recipes::dsl::*;

    Ok(diesel::select(diesel::dsl::exists(recipes.find(wanted))).get_result(conn)?)
}

/// Adding a recipe that is already a favorite does nothing.
pub fn add_favorite(
    conn: &mut database::Connection,
    user_name: &str,
    favorite_recipe: RecipeId,
) -> Result<()> {
    use database::schema::favorites::dsl::*;

    let user = get(conn, user_name)?;
    if !recipe_exists(conn, favorite_recipe)? {
        return Err(Error::NotFound(format!(
            "No recipe with ID of: {favorite_recipe}"
        )));
    }

    diesel::insert_into(favorites)
        .values(Favorite {
            user_id: user.id,
            recipe_id: favorite_recipe,
        })
        .on_conflict_do_nothing()
        .execute(conn)?;
    log::info!("{user_name:?} favorited recipe {favorite_recipe}");
    Ok(())
}

pub fn remove_favorite(
    conn: &mut database::Connection,
    user_name: &str,
    favorite_recipe: RecipeId,
) -> Result<()> {
    use database::schema::favorites::dsl::*;

    let user = get(conn, user_name)?;
    let deleted = diesel::delete(
        favorites
            .filter(user_id.eq(user.id))
            .filter(recipe_id.eq(favorite_recipe)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(Error::NotFound("Favorite not found".into()));
    }
    log::info!("{user_name:?} unfavorited recipe {favorite_recipe}");
    Ok(())
}

pub fn favorite_ids(conn: &mut database::Connection, user_name: &str) -> Result<Vec<RecipeId>> {
    use database::schema::favorites::dsl::*;

    let user = get(conn, user_name)?;
    let ids: Vec<RecipeId> = favorites
        .select(recipe_id)
        .filter(user_id.eq(user.id))
        .order_by(recipe_id.asc())
        .load(conn)?;
    if ids.is_empty() {
        return Err(Error::NotFound("Couldnt find any favorites!".into()));
    }
    Ok(ids)
}

pub fn favorite_details(conn: &mut database::Connection, user_name: &str) -> Result<Vec<Recipe>> {
    use database::schema::{favorites, recipes};

    let user = get(conn, user_name)?;
    Ok(favorites::table
        .inner_join(recipes::table)
        .filter(favorites::user_id.eq(user.id))
        .order_by(recipes::id.asc())
        .select(Recipe::as_select())
        .load(conn)?)
}

#[derive(Serialize, Debug, PartialEq)]
pub struct UserFavorites {
    pub username: String,
    /// Comma separated, e.g. `"1,2"`.
    pub favorite_recipe_ids: String,
}

/// Every user with at least one favorite, ordered by when they joined.
pub fn all_favorites(conn: &mut database::Connection) -> Result<Vec<UserFavorites>> {
    use database::schema::{favorites, users};

    let rows: Vec<(UserId, String, RecipeId)> = favorites::table
        .inner_join(users::table)
        .order_by((users::id.asc(), favorites::recipe_id.asc()))
        .select((users::id, users::username, favorites::recipe_id))
        .load(conn)?;

    let mut result: Vec<(UserId, UserFavorites)> = vec![];
    for (owner, owner_name, favorite) in rows {
        if let Some((last, entry)) = result.last_mut() {
            if *last == owner {
                entry.favorite_recipe_ids += &format!(",{favorite}");
                continue;
            }
        }
        result.push((
            owner,
            UserFavorites {
                username: owner_name,
                favorite_recipe_ids: favorite.to_string(),
            },
        ));
    }
    Ok(result.into_iter().map(|(_, f)| f).collect())
}

#[cfg(test)]
fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.into(),
        first_name: "First".into(),
        last_name: "Last".into(),
        email: format!("{name}@email.com"),
        is_admin: false,
    }
}

#[test]
fn register_and_get() {
    let mut conn = database::seeded();

    let user = register(&mut conn, &new_user("new")).unwrap();
    assert_eq!(user.username, "new");
    assert_eq!(user.email, "new@email.com");
    assert!(!user.is_admin);
    assert_eq!(get(&mut conn, "new").unwrap(), user);

    let names: Vec<_> = list(&mut conn)
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, ["new", "u1", "u2"]);
}

#[test]
fn register_duplicate() {
    let mut conn = database::seeded();

    assert!(matches!(
        register(&mut conn, &new_user("u1")),
        Err(Error::BadRequest(_))
    ));
}

#[test]
fn update_some_fields() {
    let mut conn = database::seeded();

    let user_update: UserUpdate =
        serde_json::from_str(r#"{ "lastName": "Changed", "isAdmin": true }"#).unwrap();
    let user = update(&mut conn, "u1", &user_update).unwrap();
    assert_eq!(user.first_name, "U1F");
    assert_eq!(user.last_name, "Changed");
    assert_eq!(user.email, "u1@email.com");
    assert!(user.is_admin);
    assert_eq!(get(&mut conn, "u1").unwrap(), user);
}

#[test]
fn update_missing_or_empty() {
    let mut conn = database::seeded();

    let user_update = UserUpdate {
        email: Some("nope@email.com".into()),
        ..Default::default()
    };
    assert!(matches!(
        update(&mut conn, "nope", &user_update),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        update(&mut conn, "u1", &UserUpdate::default()),
        Err(Error::BadRequest(_))
    ));
    assert_eq!(get(&mut conn, "u1").unwrap().email, "u1@email.com");
}

#[test]
fn get_and_remove_missing() {
    let mut conn = database::seeded();

    assert!(matches!(get(&mut conn, "nope"), Err(Error::NotFound(_))));
    assert!(matches!(remove(&mut conn, "nope"), Err(Error::NotFound(_))));
}

#[test]
fn favorites_add_and_remove() {
    let mut conn = database::seeded();

    add_favorite(&mut conn, "u1", RecipeId::from(3)).unwrap();
    add_favorite(&mut conn, "u1", RecipeId::from(1)).unwrap();
    add_favorite(&mut conn, "u1", RecipeId::from(1)).unwrap();
    assert_eq!(
        favorite_ids(&mut conn, "u1").unwrap(),
        [RecipeId::from(1), RecipeId::from(3)]
    );

    let titles: Vec<_> = favorite_details(&mut conn, "u1")
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, ["T1", "T3"]);

    remove_favorite(&mut conn, "u1", RecipeId::from(1)).unwrap();
    assert_eq!(favorite_ids(&mut conn, "u1").unwrap(), [RecipeId::from(3)]);

    remove_favorite(&mut conn, "u1", RecipeId::from(3)).unwrap();
    assert!(matches!(
        favorite_ids(&mut conn, "u1"),
        Err(Error::NotFound(_))
    ));
    assert!(favorite_details(&mut conn, "u1").unwrap().is_empty());
    assert!(matches!(
        remove_favorite(&mut conn, "u1", RecipeId::from(1)),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn favorites_missing_user_or_recipe() {
    let mut conn = database::seeded();

    assert!(matches!(
        add_favorite(&mut conn, "nope", RecipeId::from(1)),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        add_favorite(&mut conn, "u1", RecipeId::from(798)),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn all_favorites_grouped_by_user() {
    use maplit::hashset;

    let mut conn = database::seeded();
    add_favorite(&mut conn, "u2", RecipeId::from(2)).unwrap();
    add_favorite(&mut conn, "u1", RecipeId::from(1)).unwrap();
    add_favorite(&mut conn, "u2", RecipeId::from(1)).unwrap();

    assert_eq!(
        all_favorites(&mut conn).unwrap(),
        [
            UserFavorites {
                username: "u1".into(),
                favorite_recipe_ids: "1".into(),
            },
            UserFavorites {
                username: "u2".into(),
                favorite_recipe_ids: "1,2".into(),
            },
        ]
    );

    // Favorites go away with their recipe or their user.
    crate::recipes::delete(&mut conn, RecipeId::from(1)).unwrap();
    remove(&mut conn, "u1").unwrap();
    let remaining: std::collections::HashSet<_> = all_favorites(&mut conn)
        .unwrap()
        .into_iter()
        .map(|f| (f.username, f.favorite_recipe_ids))
        .collect();
    assert_eq!(remaining, hashset! {("u2".to_string(), "2".to_string())});
}
