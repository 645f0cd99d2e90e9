//! Recipes API.

use crate::client::{ApiRequest, LarderClient};
use crate::error::Result;
use crate::types::{CookRequest, NewRecipe, Page, Recipe, RecipeQuery};

/// Recipes API client.
pub struct RecipesApi {
    client: LarderClient,
}

impl RecipesApi {
    pub(crate) fn new(client: LarderClient) -> Self {
        Self { client }
    }

    /// List public recipes matching the query.
    pub async fn list(&self, query: &RecipeQuery) -> Result<Page<Recipe>> {
        let request = ApiRequest::get("recipes").query(query)?;
        self.client.execute(request).await
    }

    /// Get a recipe by ID.
    pub async fn get(&self, id: &str) -> Result<Recipe> {
        self.client
            .execute(ApiRequest::get(format!("recipes/{}", id)))
            .await
    }

    /// Create a new recipe.
    ///
    /// Blank ingredient and instruction lines are dropped before sending.
    pub async fn create(&self, recipe: NewRecipe) -> Result<Recipe> {
        let recipe = recipe.normalized();
        recipe.validate()?;
        let request = ApiRequest::post("recipes").json(&recipe)?;
        self.client.execute(request).await
    }

    /// Replace an existing recipe.
    pub async fn update(&self, id: &str, recipe: NewRecipe) -> Result<Recipe> {
        let recipe = recipe.normalized();
        recipe.validate()?;
        let request = ApiRequest::put(format!("recipes/{}", id)).json(&recipe)?;
        self.client.execute(request).await
    }

    /// Delete a recipe.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .execute_unit(ApiRequest::delete(format!("recipes/{}", id)))
            .await
    }

    /// Add a recipe to the user's saved list.
    pub async fn save(&self, id: &str) -> Result<()> {
        self.client
            .execute_unit(ApiRequest::post(format!("recipes/{}/save", id)))
            .await
    }

    /// Remove a recipe from the user's saved list.
    pub async fn unsave(&self, id: &str) -> Result<()> {
        self.client
            .execute_unit(ApiRequest::delete(format!("recipes/{}/save", id)))
            .await
    }

    /// Flip the saved state of a recipe. Returns the new state.
    pub async fn toggle_save(&self, recipe: &Recipe) -> Result<bool> {
        if recipe.is_saved_by_user {
            self.unsave(&recipe.id).await?;
            Ok(false)
        } else {
            self.save(&recipe.id).await?;
            Ok(true)
        }
    }

    /// Record that the user cooked a recipe.
    pub async fn cook(&self, id: &str, cook: &CookRequest) -> Result<()> {
        let request = ApiRequest::post(format!("recipes/{}/cook", id)).json(cook)?;
        self.client.execute_unit(request).await
    }

    /// Recipes the user saved.
    pub async fn saved(&self, query: &RecipeQuery) -> Result<Page<Recipe>> {
        let request = ApiRequest::get("recipes/saved/list").query(query)?;
        self.client.execute(request).await
    }

    /// Recipes the user has cooked.
    pub async fn cooked(&self, query: &RecipeQuery) -> Result<Page<Recipe>> {
        let request = ApiRequest::get("recipes/cooked/list").query(query)?;
        self.client.execute(request).await
    }
}
