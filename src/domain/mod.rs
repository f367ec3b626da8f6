pub mod network;
pub mod table;
pub mod types;

pub use network::*;
pub use table::*;
pub use types::*;
