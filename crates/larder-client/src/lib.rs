//! HTTP client SDK for the Larder recipe service.
//!
//! This crate provides a typed client for the Larder REST API with a
//! session-aware request pipeline: bearer credentials are attached
//! automatically, an expired access token is refreshed once and the failed
//! call retried, and an unrecoverable session is cleared and reported
//! through [`SessionEvent::Expired`].
//!
//! # Example
//!
//! ```no_run
//! use larder_client::{LarderClient, LoginRequest, Result, SessionEvent};
//!
//! # async fn example() -> Result<()> {
//! let store = larder_client::session::create_token_store("/tmp/larder".as_ref());
//! let client = LarderClient::builder()
//!     .base_url("http://localhost:8080/api")
//!     .token_store(store)
//!     .build()?;
//!
//! // React to the session ending wherever the host wants to.
//! let mut events = client.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let SessionEvent::Expired { reason } = event {
//!             eprintln!("please log in again ({})", reason);
//!         }
//!     }
//! });
//!
//! client
//!     .auth()
//!     .login(LoginRequest::new("cook@example.com", "hunter22"))
//!     .await?;
//!
//! for recipe in client.recipes().list(&Default::default()).await?.items {
//!     println!("{}", recipe.title);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Auth**: Register, login, logout, profile, session restore
//! - **Recipes**: List, CRUD, save/unsave, cook, saved and cooked lists
//! - **Dashboard**: Overview with user stats, the user's own recipes

pub mod api;
pub mod client;
pub mod error;
pub mod events;
pub mod session;
pub mod types;

pub use client::{ApiRequest, ClientBuilder, LarderClient, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use events::{ExpiryReason, SessionEvent};
pub use session::{
    Credentials, FileTokenStore, MemoryTokenStore, SessionStatus, SharedTokenStore, TokenPair,
    TokenStore,
};
pub use types::*;

// Re-export the cancellation token accepted by `LarderClient::send_cancellable`.
pub use tokio_util::sync::CancellationToken;
