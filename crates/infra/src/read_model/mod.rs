//! Disposable read models, rebuilt from the event streams.

pub mod wallet_directory;

pub use wallet_directory::{WalletDirectory, WalletDirectoryError};
