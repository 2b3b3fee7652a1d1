pub mod http;
pub mod traits;

#[cfg(any(feature = "test-fixtures", test))]
pub mod mock;

pub use traits::MessagingRpc;
