//! Topology queries over a loaded network.
//!
//! Exit spans are fetched lazily, once per station, and cached until an
//! explicit clear (e.g. on network reload). A station whose layout cannot
//! be read contributes a span of zero instead of failing the query.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use moka::sync::Cache as MokaCache;
use tracing::{debug, warn};

use crate::domain::StationId;

use super::layout::LayoutSource;
use super::network::{Network, Section, TrackMode};

/// Graph view of the network with derived section properties.
pub struct NetworkTopology {
    network: Network,
    layouts: Arc<dyn LayoutSource>,
    exit_spans: MokaCache<StationId, f64>,
}

impl NetworkTopology {
    /// Create a topology over `network`, reading exit spans from `layouts`.
    pub fn new(network: Network, layouts: Arc<dyn LayoutSource>) -> Self {
        Self {
            network,
            layouts,
            exit_spans: MokaCache::builder().build(),
        }
    }

    /// Whether the station is part of the network.
    pub fn contains(&self, station: &StationId) -> bool {
        self.network.contains(station)
    }

    /// Find the section between two stations.
    ///
    /// Prefers the record oriented `a -> b`, falling back to `b -> a`.
    pub fn find_section(&self, a: &StationId, b: &StationId) -> Option<&Section> {
        let sections = self.network.sections();
        sections
            .iter()
            .find(|s| &s.from == a && &s.to == b)
            .or_else(|| sections.iter().find(|s| &s.from == b && &s.to == a))
    }

    /// Effective length of the section between two stations.
    ///
    /// Base distance (zero when no section exists) plus half the exit span
    /// of each endpoint.
    pub fn section_distance(&self, a: &StationId, b: &StationId) -> f64 {
        let base = self.find_section(a, b).map_or(0.0, |s| s.distance);
        base + self.exit_span(a) / 2.0 + self.exit_span(b) / 2.0
    }

    /// Whether the pair of stations is joined by a single track.
    ///
    /// True when exactly one directed record joins them, or when any record
    /// joining them is explicitly marked single-track. The explicit flag is
    /// a fallback because derived connections may lack mode data.
    pub fn is_single_track(&self, a: &StationId, b: &StationId) -> bool {
        let mut count = 0;
        let mut flagged = false;
        for section in self.network.sections().iter().filter(|s| s.joins(a, b)) {
            count += 1;
            flagged |= section.mode == Some(TrackMode::Single);
        }
        count == 1 || flagged
    }

    /// Cached exit span for a station, zero if its layout is unavailable.
    pub fn exit_span(&self, station: &StationId) -> f64 {
        let layouts = &self.layouts;
        match self
            .exit_spans
            .try_get_with(station.clone(), || layouts.exit_span(station))
        {
            Ok(span) => span,
            Err(e) => {
                warn!(station = %station, error = %e, "exit span unavailable, using 0");
                0.0
            }
        }
    }

    /// Drop all cached exit spans.
    pub fn clear_exit_span_cache(&self) {
        debug!("clearing exit span cache");
        self.exit_spans.invalidate_all();
    }

    /// A deterministic linear ordering of stations for display.
    ///
    /// Starts from the first station with no inbound section (or the first
    /// station if every station has one), follows the first outbound section
    /// until it revisits a station or dead-ends, then appends the remaining
    /// stations in declaration order.
    pub fn derive_station_order(&self) -> Vec<StationId> {
        let stations = self.network.stations();
        let sections = self.network.sections();

        let Some(first) = stations.first() else {
            return Vec::new();
        };

        let mut inbound: HashMap<&StationId, usize> = HashMap::new();
        for section in sections {
            *inbound.entry(&section.to).or_default() += 1;
        }

        let start = stations
            .iter()
            .find(|s| !inbound.contains_key(s))
            .unwrap_or(first);

        let mut visited: HashSet<&StationId> = HashSet::new();
        let mut order = Vec::with_capacity(stations.len());
        let mut current = start;

        loop {
            visited.insert(current);
            order.push(current.clone());

            let next = sections.iter().find(|s| &s.from == current).map(|s| &s.to);
            match next {
                Some(next) if !visited.contains(next) => current = next,
                _ => break,
            }
        }

        for station in stations {
            if !visited.contains(station) {
                order.push(station.clone());
            }
        }

        order
    }
}
