//! Deploys, links and upgrades proxied contracts across environments,
//! keeping a per-environment record of every contract a run handled.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod audit;
pub mod chain;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod manager;
pub mod plan;
pub mod proxy_admin;
pub mod records;
pub mod roles;
mod solidity;
pub mod types;
pub mod utils;
