// SPDX-License-Identifier: MIT OR Apache-2.0

//! pichess Network - backend access for the pichess client
//!
//! This crate provides:
//! - [`http::HttpGateway`], the [`pichess_core::BackendGateway`] speaking the
//!   JSON API of the chess backend bridge
//! - [`config::ClientConfig`], the client configuration file

#![deny(unsafe_code)]

pub mod config;
pub mod http;

pub use config::{load_config, save_config, ClientConfig};
pub use http::HttpGateway;
