pub(crate) mod graph;
pub mod manager;
