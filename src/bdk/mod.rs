// SPDX-License-Identifier: MIT

//! Block development kit
//!
//! Variant-agnostic building blocks shared by the whole crate:
//! - [`error`] - typed errors
//! - [`port`] - the per-block Port Registry
//! - [`connector`] - edges between ports
//! - [`modifier`] - named value transforms carried by connectors
//! - [`http`] - outbound HTTP transport

pub mod connector;
pub mod error;
pub mod http;
pub mod modifier;
pub mod port;
