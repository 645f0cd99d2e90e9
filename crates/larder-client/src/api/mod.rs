//! API endpoint implementations.

mod auth;
mod dashboard;
mod recipes;

pub use auth::AuthApi;
pub use dashboard::DashboardApi;
pub use recipes::RecipesApi;
