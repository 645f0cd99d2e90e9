//! Request and response types for the Larder API.
//!
//! These types mirror the server's API contract. Field names are camelCase
//! on the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::session::TokenPair;

/// Default page size used by recipe listings.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Accept identifiers serialized either as strings or as integers.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last", falling back to the username or email.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        self.username.clone().unwrap_or_else(|| self.email.clone())
    }
}

/// Response payload of login and registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: User,
    pub tokens: TokenPair,
}

/// Credentials for `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `PUT /auth/profile`. Only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Recipes
// ─────────────────────────────────────────────────────────────────────────────

/// How hard a recipe is to cook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        };
        f.write_str(s)
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            other => Err(Error::Validation(format!("unknown difficulty '{}'", other))),
        }
    }
}

/// Author summary embedded in a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeAuthor {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// A recipe as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<u32>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<RecipeAuthor>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub total_saves: u32,
    #[serde(default)]
    pub total_cooked: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub is_saved_by_user: bool,
    #[serde(default)]
    pub is_cooked_by_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
}

fn default_true() -> bool {
    true
}

/// Body for creating or updating a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipe {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub servings: Option<u32>,
    pub difficulty: Difficulty,
    pub is_public: bool,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
}

impl NewRecipe {
    /// A public, easy recipe with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            image_url: None,
            prep_time: None,
            cook_time: None,
            servings: None,
            difficulty: Difficulty::default(),
            is_public: true,
            ingredients: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// Trim entries and drop blank ingredient and instruction lines.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.ingredients = non_blank(self.ingredients);
        self.instructions = non_blank(self.instructions);
        self
    }

    /// Reject a recipe the server would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("recipe title is required".to_string()));
        }
        if self.ingredients.iter().all(|i| i.trim().is_empty()) {
            return Err(Error::Validation(
                "at least one ingredient is required".to_string(),
            ));
        }
        if self.instructions.iter().all(|i| i.trim().is_empty()) {
            return Err(Error::Validation(
                "at least one instruction is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_blank(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Body of `POST /recipes/{id}/cook`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookRequest {
    /// 1 to 5.
    pub rating: u8,
    pub notes: Option<String>,
}

impl CookRequest {
    /// Build a cook record, rejecting ratings outside 1..=5.
    pub fn new(rating: u8, notes: Option<String>) -> Result<Self> {
        if !(1..=5).contains(&rating) {
            return Err(Error::Validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
        let notes = notes.filter(|n| !n.trim().is_empty());
        Ok(Self { rating, notes })
    }
}

/// Field to sort recipe listings by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    Title,
    PrepTime,
    CookTime,
    Difficulty,
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "createdAt" | "created" | "date" => Ok(SortField::CreatedAt),
            "title" => Ok(SortField::Title),
            "prepTime" | "prep" => Ok(SortField::PrepTime),
            "cookTime" | "cook" => Ok(SortField::CookTime),
            "difficulty" => Ok(SortField::Difficulty),
            other => Err(Error::Validation(format!("unknown sort field '{}'", other))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::Validation(format!("unknown sort order '{}'", other))),
        }
    }
}

/// Filters applied to a recipe listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prep_time: Option<u32>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

/// Query parameters for recipe listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeQuery {
    #[serde(flatten)]
    pub filters: RecipeFilters,
    pub page: u32,
    pub limit: u32,
}

impl Default for RecipeQuery {
    fn default() -> Self {
        Self {
            filters: RecipeFilters::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RecipeQuery {
    /// Apply new filters. Any change in filters starts over at page 1.
    pub fn with_filters(mut self, filters: RecipeFilters) -> Self {
        if filters != self.filters {
            self.page = 1;
        }
        self.filters = filters;
        self
    }

    /// Jump to a page (pages are 1-based).
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }
}

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u32,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub items: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dashboard
// ─────────────────────────────────────────────────────────────────────────────

/// Per-user activity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub recipes_created: u32,
    #[serde(default)]
    pub recipes_saved: u32,
    #[serde(default)]
    pub recipes_cooked: u32,
}

/// Dashboard overview: community recipes plus the user's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default)]
    pub items: Vec<Recipe>,
    #[serde(default)]
    pub user_stats: UserStats,
}

/// Recipes authored by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyRecipes {
    #[serde(default)]
    pub items: Vec<Recipe>,
}
