mod licenses;
mod questions;
mod sessions;
mod stats;
mod universities;

pub use licenses::*;
pub use questions::*;
pub use sessions::*;
pub use stats::*;
pub use universities::*;
