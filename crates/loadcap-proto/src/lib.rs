//! loadcap-proto — the `LoadBalancingManager` RPC contract.
//!
//! Every backend in a loadcap fleet serves this service. The controller
//! uses the generated client; the reference backend in `loadcap-core`
//! implements the generated server trait.

/// Generated protobuf types and gRPC service stubs for `loadcap.v1`.
pub mod v1 {
    include!("generated/loadcap.v1.rs");
}

pub use v1::load_balancing_manager_client::LoadBalancingManagerClient;
pub use v1::load_balancing_manager_server::{LoadBalancingManager, LoadBalancingManagerServer};

/// Wire value sent for "no cap".
pub const UNBOUNDED: i32 = -1;
