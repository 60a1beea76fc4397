//! Host-side runtime for snnc models
//!
//! Mirrors what the generated simulation keeps per host, so models can be
//! stepped and tested without compiling the emitted C:
//! - [`state`]: per-population delay rings of spike lists, spike times and
//!   variables, owned by one [`SimulationContext`] per host
//! - [`detector`]: the threshold edge detector used for true spikes
//! - [`exchange`]: the blocking count-then-indices spike exchange over an
//!   in-process channel mesh

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod detector;
pub mod error;
pub mod exchange;
pub mod state;

pub use detector::{rising_edges, PopulationDetector, SpikeEdgeDetector};
pub use error::{Result, RuntimeError};
pub use exchange::{channel_mesh, execute_exchange, ChannelEndpoint, SpikeTransport};
pub use state::{PopulationState, SimulationContext, SpikeQueue, INITIAL_SPIKE_TIME};
