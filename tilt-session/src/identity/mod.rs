mod identity_store;

pub use identity_store::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
