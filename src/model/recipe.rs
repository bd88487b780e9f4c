use serde::Deserialize;

/// Top-level recipe record returned by the remote API
///
/// Booleans default to false and collections to empty when the remote
/// response omits them; a missing `id` or `title` makes the response
/// malformed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: i64,

    pub title: String,

    /// URL of the recipe's image, if it has one
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub ready_in_minutes: Option<i64>,

    #[serde(default)]
    pub servings: Option<i64>,

    #[serde(default)]
    pub source_url: Option<String>,

    #[serde(default)]
    pub vegetarian: bool,

    #[serde(default)]
    pub vegan: bool,

    #[serde(default)]
    pub gluten_free: bool,

    #[serde(default)]
    pub very_popular: bool,

    #[serde(default)]
    pub preparation_minutes: Option<i64>,

    #[serde(default)]
    pub cooking_minutes: Option<i64>,

    #[serde(default)]
    pub aggregate_likes: Option<i64>,

    #[serde(default)]
    pub instructions: Option<String>,

    #[serde(default)]
    pub extended_ingredients: Vec<IngredientEntry>,

    #[serde(default)]
    pub cuisines: Vec<String>,

    #[serde(default)]
    pub dish_types: Vec<String>,
}

/// One entry of the recipe's nested ingredient collection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientEntry {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub name_clean: Option<String>,

    #[serde(default)]
    pub original: Option<String>,

    #[serde(default)]
    pub original_name: Option<String>,

    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default)]
    pub unit: Option<String>,
}
