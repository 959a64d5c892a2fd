//! A small fleet of Discord bots that keep watch over voice channels.
//!
//! Each bot identity can guard one voice channel at a time for a stay
//! duration decided by the requesting member's tier, then heads back to an
//! idle channel.

pub mod bot;
pub mod commands;
pub mod config;
pub mod constants;
pub mod handlers;
pub mod services;
pub mod utils;
