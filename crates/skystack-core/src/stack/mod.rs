pub mod accumulator;
mod driver;
mod footprint;
pub mod median;
pub mod sigma_clip;

pub use accumulator::{Accumulator, Location};
pub use driver::{resolve_inputs, stack, stack_reported, StackOutcome, StackSummary};
pub use sigma_clip::{ClipState, PassReport, SigmaClipParams, SigmaClipper, SkyAdjustment};
