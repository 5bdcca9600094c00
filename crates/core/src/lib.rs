//! Conversion pipeline and persistent media registry behind the audiovault
//! server.

pub mod artifact;
pub mod config;
pub mod job;
pub mod logging;
pub mod media;
pub mod message;
pub mod registry;
pub mod replay;
pub mod runtime;
pub mod server;
pub mod session;
pub mod store;
pub mod verify;
