pub mod account;
pub mod session;

pub use account::{NewAccount, StoredAccount};
pub use session::Session;
