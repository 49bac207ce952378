//! Account identity: ids, records and the store that owns them.

mod id;
mod model;
mod store;

pub use id::AccountId;
pub use model::{default_title, Account, AccountKind, AccountSecret, HardwareDescriptor};
pub use store::AccountStore;
