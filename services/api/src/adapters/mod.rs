pub mod accounts;
pub mod db;
pub mod identity;

pub use accounts::{AccountDirectory, InMemoryAccountDirectory};
pub use db::DbAdapter;
pub use identity::{PickerAnswer, PickerIdentityProvider, PickerPrompt};
