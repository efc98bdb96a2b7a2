pub mod cluster;
pub mod metadata;
pub mod spec;
pub mod version;

pub use cluster::*;
pub use metadata::*;
pub use spec::*;
pub use version::*;
