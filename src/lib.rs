// SPDX-License-Identifier: MIT

pub mod bdk;
pub mod flow;
