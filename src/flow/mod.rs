// SPDX-License-Identifier: MIT

pub mod blocks;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod graph;
pub mod loader;
pub mod server;
