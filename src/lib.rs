#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod analyzer;
pub mod asynch;
pub mod command;
pub mod config;
pub mod context;
pub mod datapack;
pub mod error;
pub mod hex;
pub mod modem;
pub mod modules;
pub mod parser;
pub mod registration;
pub mod sequencer;
pub mod service;
pub mod urc;

#[cfg(test)]
mod test_helpers;
