// src/lib.rs — Library root for parley

pub mod agent;
pub mod cli;
pub mod core;
pub mod extract;
pub mod infra;
pub mod util;
