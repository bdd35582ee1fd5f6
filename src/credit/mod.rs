//! Credit accounting for regulated resources.

mod key;
mod manager;
mod registry;
mod resource;
mod sleeper;

pub use key::{BalanceKey, ResourceKey, DEFAULT_KEY_PREFIX, WINDOW};
pub use manager::CreditManager;
pub use registry::{RegisteredResource, Rejection, ResourceRegistry};
pub use resource::{RegulatedResource, ResourceId, StaticResource};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper};
