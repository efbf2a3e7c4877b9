// Copyright 2023 Remi Bernotavicius

use derive_more::Display;
use diesel::associations::{Associations, Identifiable};
use diesel::deserialize::Queryable;
use diesel::expression::Selectable;
use diesel::prelude::{AsChangeset, Insertable};
use diesel_derive_newtype::DieselNewType;
use serde::{Deserialize, Serialize};

#[derive(
    DieselNewType, Debug, Display, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Serialize,
)]
pub struct IngredientId(i32);

impl From<i32> for IngredientId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// An entry in the shared ingredient dictionary.
#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Clone, Serialize)]
#[diesel(table_name = crate::database::schema::ingredients)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::database::schema::ingredients)]
pub struct NewIngredient<'a> {
    pub name: &'a str,
    pub lookup_name: &'a str,
}

#[derive(
    DieselNewType,
    Debug,
    Display,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Copy,
    Clone,
    Serialize,
    Deserialize,
)]
pub struct RecipeId(i32);

impl From<i32> for RecipeId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Clone, Serialize)]
#[diesel(table_name = crate::database::schema::recipes)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub description: String,
    pub tag: String,
    pub instructions: String,
}

/// The header fields of a recipe, as submitted on create and update.
#[derive(Insertable, AsChangeset, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::recipes)]
pub struct RecipeDetails {
    pub title: String,
    pub description: String,
    pub tag: String,
    pub instructions: String,
}

#[derive(Associations, Queryable, Selectable, Identifiable, Insertable, Debug, Clone)]
#[diesel(belongs_to(Recipe))]
#[diesel(belongs_to(Ingredient))]
#[diesel(primary_key(recipe_id, ingredient_id))]
#[diesel(table_name = crate::database::schema::recipe_ingredients)]
pub struct RecipeIngredient {
    pub recipe_id: RecipeId,
    pub ingredient_id: IngredientId,
    pub quantity: f32,
    pub unit: String,
}

#[derive(
    DieselNewType, Debug, Display, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Serialize,
)]
pub struct UserId(i32);

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Clone, Serialize)]
#[diesel(table_name = crate::database::schema::users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Insertable, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::database::schema::users)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Fields left out stay as they are.
#[derive(AsChangeset, Deserialize, Debug, Clone, Default)]
#[diesel(table_name = crate::database::schema::users)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub is_admin: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.is_admin.is_none()
    }
}

#[derive(Associations, Queryable, Selectable, Identifiable, Insertable, Debug, Clone)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Recipe))]
#[diesel(primary_key(user_id, recipe_id))]
#[diesel(table_name = crate::database::schema::favorites)]
pub struct Favorite {
    pub user_id: UserId,
    pub recipe_id: RecipeId,
}
