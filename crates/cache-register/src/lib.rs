//! Cluster-wide LWW register holding the cluster's shared status snapshot,
//! replicated via a lightweight HTTP gossip layer (periodic broadcast plus
//! majority-write quorum fan-out) rather than a full CRDT substrate.

mod register;

pub use register::{ReadConsistency, StatusRegister, WriteConsistency};
