//! Rail control server.
//!
//! Coordinates a shared railway network where each station is run by at
//! most one remote controller. Trains moving onto single-track sections
//! need the far station's approval; controllers hear about trains that
//! affect them; a controller leaving never strands a train.

pub mod approval;
pub mod config;
pub mod control;
pub mod domain;
pub mod handoff;
pub mod notify;
pub mod service;
pub mod topology;
pub mod web;
