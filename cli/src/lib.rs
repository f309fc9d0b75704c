// SPDX-License-Identifier: MIT OR Apache-2.0

//! pichess CLI - terminal front-end for the pichess client
//!
//! Command parsing and text rendering live here so they can be tested
//! without a backend; the binary wires them to a session controller.

pub mod commands;
pub mod render;

pub use commands::{parse_command, Command};
