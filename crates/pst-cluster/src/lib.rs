//! # pst-cluster
//!
//! Membership plumbing for partial state transfer.
//!
//! - [`membership`] - the read-only view of who is in the cluster, plus an
//!   in-process cluster used to wire nodes together
//! - [`barrier`] - the startup gate that waits until a fixed number of members
//!   has joined, or gives up at a deadline
//!
//! ```text
//!            poll current_size()
//!   ┌──────────────────────────────┐
//!   │                              │
//!   ▼        size < N, time left   │
//! WaitingForPeers ─────────────────┘
//!   │                  │
//!   │ size ≥ N         │ deadline passed
//!   ▼                  ▼
//! Formed            TimedOut
//! ```

pub mod barrier;
pub mod membership;

pub use barrier::{
    BarrierConfig, BarrierConfigBuilder, BarrierConfigError, BarrierOutcome, BarrierState,
    ClusterBarrier,
};
pub use membership::{LocalCluster, LocalView, MembershipView, NodeId};
