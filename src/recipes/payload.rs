// Copyright 2023 Remi Bernotavicius

use crate::database::models::{Recipe, RecipeDetails};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One line of a recipe's ingredient list as submitted by a caller.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IngredientEntry {
    pub name: String,
    pub quantity: f32,
    pub unit: String,
}

impl IngredientEntry {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, quantity: f32, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }

    fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::BadRequest("ingredient name is empty".into()));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(Error::BadRequest(format!(
                "quantity of {:?} must be a positive number, got {}",
                self.name, self.quantity
            )));
        }
        Ok(())
    }
}

pub(super) fn check_entries(entries: &[IngredientEntry]) -> Result<()> {
    entries.iter().try_for_each(IngredientEntry::check)
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewRecipe {
    pub details: RecipeDetails,
    pub ingredients: Vec<IngredientEntry>,
}

/// Ingredients left out of `ingredient_list` stay on the recipe. Only the names in
/// `recipe_ingredients_to_remove` are taken off.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecipeUpdate {
    #[serde(default)]
    pub details: Option<RecipeDetails>,
    #[serde(default)]
    pub ingredient_list: Option<Vec<IngredientEntry>>,
    #[serde(default)]
    pub recipe_ingredients_to_remove: Vec<String>,
}

/// A caller's copy of a recipe's ingredients with one of them picked out.
#[derive(Deserialize, Debug, Clone)]
pub struct IngredientSelection {
    pub ingredients: Vec<IngredientEntry>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientLine {
    pub name: String,
    pub quantity: f32,
    pub unit: String,
}

impl fmt::Display for IngredientLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} of {}", self.quantity, self.unit, self.name)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeWithIngredients {
    #[serde(flatten)]
    pub recipe: Recipe,
    /// e.g. `"1 pcs of egg, 2 cups of flour"`, ordered by ingredient name.
    pub ingredient_list: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeIngredientDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredient_name: String,
    pub ingredient_quantity: f32,
    pub ingredient_unit: String,
}

#[test]
fn ingredient_line() {
    let line = IngredientLine {
        name: "i1".into(),
        quantity: 1.0,
        unit: "cup".into(),
    };
    assert_eq!(line.to_string(), "1 cup of i1");

    let line = IngredientLine {
        name: "flour".into(),
        quantity: 0.5,
        unit: "cups".into(),
    };
    assert_eq!(line.to_string(), "0.5 cups of flour");
}

#[test]
fn check_rejects_bad_entries() {
    assert!(check_entries(&[IngredientEntry::new("egg", 2.0, "pcs")]).is_ok());
    assert!(check_entries(&[]).is_ok());

    for bad in [
        IngredientEntry::new("", 1.0, "cup"),
        IngredientEntry::new("egg", 0.0, "pcs"),
        IngredientEntry::new("egg", -1.0, "pcs"),
        IngredientEntry::new("egg", f32::NAN, "pcs"),
    ] {
        assert!(matches!(
            check_entries(&[IngredientEntry::new("salt", 1.0, "tsp"), bad]),
            Err(Error::BadRequest(_))
        ));
    }
}

#[test]
fn update_payload_shape() {
    let update: RecipeUpdate = serde_json::from_str(
        r#"{
            "details": {
                "title": "T1",
                "description": "D",
                "instructions": "I",
                "tag": "Tag"
            },
            "ingredientList": [{ "name": "i1", "quantity": 1, "unit": "cup" }],
            "recipeIngredientsToRemove": ["i2"]
        }"#,
    )
    .unwrap();
    assert_eq!(update.details.unwrap().title, "T1");
    assert_eq!(
        update.ingredient_list.unwrap(),
        vec![IngredientEntry::new("i1", 1.0, "cup")]
    );
    assert_eq!(update.recipe_ingredients_to_remove, ["i2"]);

    let empty: RecipeUpdate = serde_json::from_str("{}").unwrap();
    assert!(empty.details.is_none());
    assert!(empty.ingredient_list.is_none());
    assert!(empty.recipe_ingredients_to_remove.is_empty());
}
