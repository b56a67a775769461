//! In-process adapters for the domain ports.
//!
//! Used by the `simulate` command and the test suites in place of a viewer's
//! inventory, asset service and avatar.

mod assets;
mod avatar;
mod inventory;

pub use assets::InMemoryAssets;
pub use avatar::RecordingAvatar;
pub use inventory::InMemoryInventory;
