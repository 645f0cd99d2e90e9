//! Dashboard API.

use serde::Serialize;

use crate::client::{ApiRequest, LarderClient};
use crate::error::Result;
use crate::types::{Dashboard, MyRecipes};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery<'a> {
    user_id: &'a str,
}

/// Dashboard API client.
pub struct DashboardApi {
    client: LarderClient,
}

impl DashboardApi {
    pub(crate) fn new(client: LarderClient) -> Self {
        Self { client }
    }

    /// Community recipes and the user's activity counters.
    pub async fn overview(&self, user_id: &str) -> Result<Dashboard> {
        let request = ApiRequest::get("dashboard").query(&UserQuery { user_id })?;
        self.client.execute(request).await
    }

    /// Recipes created by the user.
    pub async fn my_recipes(&self, user_id: &str) -> Result<MyRecipes> {
        let request = ApiRequest::get("my-recipes").query(&UserQuery { user_id })?;
        self.client.execute(request).await
    }
}
