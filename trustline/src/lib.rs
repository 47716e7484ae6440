//! Channel factories and federated client sessions
//!
//! This crate builds and reuses channel factories for RPC contracts and,
//! for endpoints secured by a federation binding, obtains tokens from a
//! security token service on behalf of the caller.
//!
//! The pieces fit together as follows:
//!
//! * A [`ChannelFactoryManager`] resolves the single configured endpoint for
//!   a [`Contract`][channel::Contract] and keeps one
//!   [`ChannelFactory`][factory::ChannelFactory] per contract.
//! * Factories for federation endpoints are configured with federated
//!   credentials as soon as they are created.
//! * A [`SessionManager`] looks up a token for the caller's identity and the
//!   service address in a [`TokenStore`][trustline_tokens::TokenStore]. On a
//!   miss, a [`TokenIssuer`][issuer::TokenIssuer] requests one from the
//!   token service named by the binding, and the result is cached until it
//!   expires.
//! * [`Clients`] ties these together behind `create`.
//!
//! Identities are never read from ambient state. Each call supplies a
//! [`CallContext`].
//!
//! # Features
//!
//! * `http`: Requests tokens from token services over HTTP using [reqwest].
//!   Enabled by default.

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

pub mod binding;
pub mod channel;
mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod factory;
mod federation;
pub mod issuer;
pub mod provider;
mod session;

#[cfg(test)]
mod test_util;

pub use client::{Clients, ClientsBuilder};
pub use error::Error;
pub use provider::{ChannelFactoryManager, ChannelFactoryProvider};
pub use session::{token_cache_key, CallContext, Identity, SessionManager};
