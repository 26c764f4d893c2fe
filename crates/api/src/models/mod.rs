pub mod facts;
pub mod graph;
pub mod id;
pub mod summary;
pub mod unit;

pub use facts::*;
pub use graph::*;
pub use id::*;
pub use summary::*;
pub use unit::*;
