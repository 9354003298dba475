//! Agent Router Module
//!
//! Turns a classified [`Intent`](crate::intent::Intent) into a
//! [`RoutingDecision`]: one agent when a single domain clearly owns the
//! request, a swarm when it spans domains or looks too complex.
//!
//! # Strategy Selection
//!
//! ```text
//! Intent                                   | Strategy      | Agents
//! -----------------------------------------|---------------|-----------------------------
//! domains == [general] / no candidates     | single_agent  | general agent (x0.8)
//! 1 domain, complexity < 7, conf >= 0.6    | single_agent  | top candidate
//! anything else                            | swarm         | rank-interleaved, max 4 (x0.85)
//! ```

pub mod error;
pub mod selector;

pub use error::{RoutingError, RoutingResult};
pub use selector::{AgentSelector, ContextMap, RoutingDecision, RoutingStrategy, SelectorConfig};
