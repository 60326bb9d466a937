//! Sample business domains wired through the interceptor pipeline.
//!
//! - [`wallet`]: Wallet transfers between stored-value accounts and banking accounts

pub mod wallet;

pub use wallet::{
    declare_wallet_metadata, register_wallet_operations, wallet_metadata, BankingAccount,
    ConsoleBankingAccount, ConsoleWalletRepo, FeeSchedule, FixedFee, Wallet, WalletClient,
    WalletRepo,
};
