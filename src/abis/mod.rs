pub mod staking;

pub use staking::{Delegate, Mint, Undelegate};
