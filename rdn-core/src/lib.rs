pub mod error;
pub mod graph;
pub mod hash;
pub mod multiset;
pub mod network;
pub mod process;
pub mod resource;
pub mod scenario;
pub mod task;

pub use error::RdnError;
pub use graph::Graph;
pub use hash::{flow_graph_hash, merkle_tree, HashGraph, Hasher};
pub use multiset::MultisetSpec;
pub use network::ResourceDemandNetwork;
pub use process::Process;
pub use resource::Resource;
pub use task::Task;
