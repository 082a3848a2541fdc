//! Rail network topology.
//!
//! Stations and directed sections are loaded once and are immutable
//! thereafter. This module derives the properties the control protocol
//! needs from them: effective section distance and whether a section is
//! single-track (and so needs approval to enter).

mod error;
mod graph;
mod layout;
mod network;

pub use error::TopologyError;
pub use graph::NetworkTopology;
pub use layout::{InMemoryLayouts, LayoutDirectory, LayoutSource};
pub use network::{Network, Section, TrackMode};
