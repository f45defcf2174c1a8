pub mod args;
pub mod chain;
pub mod sequencer;

pub mod prelude {
    pub use crate::args::CallArgs;
    pub use crate::chain::{chain_function, ChainExt};
    pub use crate::sequencer::{QueuedCall, Sequencer};
}
