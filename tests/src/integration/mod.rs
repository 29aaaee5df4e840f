//! Cross-crate flows over a shared in-process broker.

mod correlation;
mod people_flow;
