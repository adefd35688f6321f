// SPDX-License-Identifier: MIT

//! Graph container and its serialized form

pub mod container;
pub mod snapshot;

pub use container::{BindingPolicy, Graph};
pub use snapshot::{BlockSnapshot, EdgeSnapshot, GraphSnapshot, PortSnapshot};
