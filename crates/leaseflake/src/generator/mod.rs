mod leased;
mod status;

pub use leased::*;
pub use status::*;
