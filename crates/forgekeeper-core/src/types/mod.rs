mod recovery;
mod retention;
mod risk;
mod snapshot;
mod tier;
mod verification;

pub use recovery::*;
pub use retention::*;
pub use risk::*;
pub use snapshot::*;
pub use tier::*;
pub use verification::*;
