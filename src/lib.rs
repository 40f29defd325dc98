//! stubnet: a serverless stub gateway plus a virtual node agent
//!
//! - [`gateway`] registers stubs and assigns deployment versions
//! - [`agent`] reports node status and proxies pod lifecycle calls for a
//!   remote compute backend

pub mod agent;
pub mod cli;
pub mod config;
pub mod events;
pub mod gateway;
pub mod objects;
pub mod repository;
pub mod types;
