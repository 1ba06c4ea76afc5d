pub mod builder;
pub mod graph;
pub mod types;

pub use builder::{ActionBuilder, ConfigurationBuilder, PlanBuilder};
pub use graph::{ActionGraph, ActionTree, PlanNode};
pub use types::*;
