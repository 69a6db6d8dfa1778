//! Client-side management of a login session's JSON Web Token
//!
//! A client talking to a token-authenticated backend needs a current token on
//! every outbound request. This library hands out that token and keeps it
//! current: it refreshes the token in the background on a fixed interval,
//! refreshes it on demand when it has expired, and prompts the user to log in
//! when there is no token at all.
//!
//! Concurrent callers never cause duplicate work. While a refresh or a login
//! prompt is in flight, every other caller that needs a token waits on that
//! same operation and receives the same outcome.
//!
//! # General Flow
//!
//! On application start-up, set up a [`LoginConfig`] with the endpoints of the
//! token authority and the callbacks that show and hide a login prompt, then
//! construct a [`LoginManager`] around a token store, a token exchange, and an
//! event notifier.
//!
//! The login prompt is expected to collect credentials from the user and call
//! [`LoginManager::login()`], which stores the issued token and dismisses the
//! prompt.
//!
//! ```
//! use jwt_login::{
//!     events::BroadcastNotifier,
//!     exchange::{Credentials, HttpTokenExchange},
//!     stores::InMemoryTokenStore,
//!     BoxError, LoginConfig, LoginManager,
//! };
//! use std::sync::{Arc, OnceLock};
//!
//! # async fn ask_user() -> Credentials { Credentials::new("alice", "hunter2") }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager_slot = Arc::new(OnceLock::<LoginManager>::new());
//!
//! let display = {
//!     let manager_slot = manager_slot.clone();
//!     move || {
//!         let manager_slot = manager_slot.clone();
//!         async move {
//!             let credentials = ask_user().await;
//!             let manager = manager_slot.get().ok_or("session not ready")?;
//!             manager.login(&credentials).await?;
//!             Ok::<(), BoxError>(())
//!         }
//!     }
//! };
//!
//! let config = LoginConfig::new()
//!     .with_login_url("https://example.com/auth/login".parse()?)
//!     .with_refresh_url("https://example.com/auth/refresh".parse()?)
//!     .with_display_login(display)
//!     .with_hide_login(|| async { Ok::<(), BoxError>(()) });
//!
//! let exchange = HttpTokenExchange::from_config(reqwest::Client::new(), &config)?;
//! let notifier = BroadcastNotifier::default();
//!
//! let manager = LoginManager::new(config, InMemoryTokenStore::new(), exchange, notifier);
//! let _ = manager_slot.set(manager.clone());
//!
//! # /* Commented out due to this trying to interact with the world.
//! let token = manager.get_token(None).await?;
//! # */
//! # Ok(())
//! # }
//! ```
//!
//! This crate includes an example of an interactive terminal login using a file
//! store in the examples folder. Refer to that example for more details on usage.
//!
//! # Features
//!
//! The following features are supported by this crate, all of which are enabled by default:
//!
//! * `file`: Provides a token store backed by a file on the local filesystem.
//! * `http`: Provides a token exchange that talks to JSON login and refresh endpoints.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
pub mod config;
mod error;
pub mod events;
pub mod exchange;
pub mod expiry;
pub mod ignore;
mod manager;
mod single_flight;
pub mod stores;

#[cfg(test)]
mod test_util;

pub use braids::*;
pub use config::{ConfigError, LoginConfig};
pub use error::{BoxError, LoginError, SharedError};
pub use manager::{LoginManager, SessionState};
