mod identity;
mod manager;
mod memory;
mod store;
mod token;

pub use identity::*;
pub use manager::*;
pub use memory::*;
pub use store::*;
pub use token::*;
