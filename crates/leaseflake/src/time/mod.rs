mod clock;
mod interface;
mod wall_clock;

pub use clock::*;
pub use interface::*;
pub use wall_clock::*;
