//! Security tokens and the machinery for issuing and reusing them
//!
//! A [`SecurityToken`] is granted by a security token service (STS) for one
//! target service and is valid until an absolute expiry. Because contacting
//! the STS is expensive, tokens are kept in a [`TokenStore`] keyed by the
//! identity and service they were issued for, and reused until they expire.
//!
//! The [`trust`] module describes the issue exchange with the token service
//! and the [`TrustChannel`][trust::TrustChannel] seam through which requests
//! are sent.
//!
//! ```
//! use std::sync::Arc;
//! use aliri_clock::DurationSecs;
//! use trustline_tokens::{InMemoryTokenStore, SecurityToken, TokenCacheKey, TokenStore};
//!
//! let store = InMemoryTokenStore::new();
//! let token = Arc::new(SecurityToken::valid_for("material", DurationSecs(300)));
//! let key = TokenCacheKey::from_static("alice_http://localhost/service");
//!
//! assert!(store.add(key.clone(), token.clone(), token.valid_to()));
//! assert!(store.contains(&key));
//! ```
//!
//! # Features
//!
//! * `http`: Provides a [`TrustChannel`][trust::TrustChannel] which sends
//!   requests to the token service over HTTP using [reqwest]. Enabled by
//!   default.

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
pub mod store;
mod token;
pub mod trust;

pub use braids::*;
pub use store::{InMemoryTokenStore, TokenStore};
pub use token::{SecurityToken, TokenStatus};
