//! Token-ring distributed mutual exclusion.
//!
//! Members register in a shared append-only [`registry`], forming a ring in
//! registration order. A single token circulates around it; a member runs its
//! critical section only when the token arrives and it has asked for it.
pub mod api;
pub mod audit;
pub mod cli;
pub mod error;
pub mod node;
pub mod registry;
pub mod settings;
pub mod transport;
