pub mod context;
pub mod draw;
pub mod layer;
pub mod node;
pub mod op;
pub mod processor;
pub mod reconcile;
