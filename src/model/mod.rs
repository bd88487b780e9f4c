//! Domain schema for the remote recipe API
//!
//! This module defines the deserialized shape of the recipe endpoint's JSON
//! body: the fields the pipeline consumes plus the nested ingredient,
//! cuisine and dish-type collections.

mod recipe;

pub use recipe::{IngredientEntry, RecipeResponse};
