//! Wallet domain: moves money between stored-value wallet accounts and
//! external banking accounts.
//!
//! The business logic in [`Wallet`] knows nothing about logging, roles,
//! caching or transactions. Those concerns are attached by
//! [`declare_wallet_metadata`] and applied by the interceptor pipeline when
//! calls go through a [`WalletClient`].
//!
//! Amounts and fees are whole `i64` units (for example cents). Fractional
//! values are not representable; callers scale to the smallest unit first.

use std::sync::Arc;

use cutpoint_core::{
    ConfigurationError, Marker, MetadataRegistry, MetadataRegistryBuilder, OperationId, Role,
    Value,
};
use tracing::info;
use uuid::Uuid;

use crate::service::dispatcher::Dispatcher;
use crate::service::invocation::InvocationError;
use crate::service::router::{handler_fn, OperationRouter};

/// Service name shared by every wallet operation.
pub const WALLET_SERVICE: &str = "Wallet";

pub const WITHDRAW: &str = "withdraw";
pub const STORE_VALUE: &str = "store_value";
pub const CREATE_GUID: &str = "create_guid";

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Balance store for wallet accounts.
pub trait WalletRepo: Send + Sync {
    /// Add `delta` (negative to debit) to `account`.
    fn update_delta(&self, account: &str, delta: i64) -> anyhow::Result<()>;
}

/// External banking account gateway.
pub trait BankingAccount: Send + Sync {
    /// Deposit `amount` into `banking_account`.
    fn saving(&self, banking_account: &str, amount: i64) -> anyhow::Result<()>;
    /// Take `amount` out of `banking_account`.
    fn withdraw(&self, banking_account: &str, amount: i64) -> anyhow::Result<()>;
}

/// Fee charged when paying out to a banking account.
pub trait FeeSchedule: Send + Sync {
    fn fee(&self, banking_account: &str) -> i64;
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

pub struct Wallet {
    repo: Arc<dyn WalletRepo>,
    bank: Arc<dyn BankingAccount>,
    fees: Arc<dyn FeeSchedule>,
}

impl Wallet {
    #[must_use]
    pub fn new(
        repo: Arc<dyn WalletRepo>,
        bank: Arc<dyn BankingAccount>,
        fees: Arc<dyn FeeSchedule>,
    ) -> Self {
        Self { repo, bank, fees }
    }

    /// Pays `amount` out of wallet `account` into `banking_account`, less the fee.
    ///
    /// # Errors
    ///
    /// Returns an error if the amounts overflow or a collaborator fails.
    pub fn withdraw(&self, account: &str, amount: i64, banking_account: &str) -> anyhow::Result<()> {
        let debit = amount
            .checked_neg()
            .ok_or_else(|| anyhow::anyhow!("amount {amount} cannot be debited"))?;
        self.repo.update_delta(account, debit)?;

        let fee = self.fees.fee(banking_account);
        let payout = amount
            .checked_sub(fee)
            .ok_or_else(|| anyhow::anyhow!("fee {fee} overflows amount {amount}"))?;
        self.bank.saving(banking_account, payout)
    }

    /// Tops up wallet `account` with `amount` taken from `banking_account`.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator fails.
    pub fn store_value(&self, banking_account: &str, amount: i64, account: &str) -> anyhow::Result<()> {
        self.bank.withdraw(banking_account, amount)?;
        self.repo.update_delta(account, amount)
    }

    /// Fresh identifier for `name`. Every call yields a new value; `seed` only
    /// takes part in the cache key.
    #[must_use]
    pub fn create_guid(&self, name: &str, seed: i64) -> String {
        let guid = Uuid::new_v4().to_string();
        info!(name, seed, %guid, "guid created");
        guid
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[must_use]
pub fn operation(method: &str) -> OperationId {
    OperationId::new(WALLET_SERVICE, method)
}

fn str_arg<'a>(args: &'a [Value], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("argument {index} ({name}) must be a string"))
}

fn int_arg(args: &[Value], index: usize, name: &str) -> anyhow::Result<i64> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow::anyhow!("argument {index} ({name}) must be an integer"))
}

fn run_withdraw(wallet: &Wallet, args: &[Value]) -> anyhow::Result<Value> {
    let account = str_arg(args, 0, "account")?;
    let amount = int_arg(args, 1, "amount")?;
    let banking_account = str_arg(args, 2, "banking_account")?;
    wallet.withdraw(account, amount, banking_account)?;
    Ok(Value::Null)
}

fn run_store_value(wallet: &Wallet, args: &[Value]) -> anyhow::Result<Value> {
    let banking_account = str_arg(args, 0, "banking_account")?;
    let amount = int_arg(args, 1, "amount")?;
    let account = str_arg(args, 2, "account")?;
    wallet.store_value(banking_account, amount, account)?;
    Ok(Value::Null)
}

fn run_create_guid(wallet: &Wallet, args: &[Value]) -> anyhow::Result<Value> {
    let name = str_arg(args, 0, "name")?;
    let seed = int_arg(args, 1, "seed")?;
    Ok(Value::String(wallet.create_guid(name, seed)))
}

/// Installs the wallet operations on `router`.
pub fn register_wallet_operations(router: &mut OperationRouter, wallet: Arc<Wallet>) {
    let w = Arc::clone(&wallet);
    router.register(
        operation(WITHDRAW),
        handler_fn(move |args| {
            let wallet = Arc::clone(&w);
            async move { run_withdraw(&wallet, &args) }
        }),
    );

    let w = Arc::clone(&wallet);
    router.register(
        operation(STORE_VALUE),
        handler_fn(move |args| {
            let wallet = Arc::clone(&w);
            async move { run_store_value(&wallet, &args) }
        }),
    );

    router.register(
        operation(CREATE_GUID),
        handler_fn(move |args| {
            let wallet = Arc::clone(&wallet);
            async move { run_create_guid(&wallet, &args) }
        }),
    );
}

/// Declares the markers of every wallet operation on `builder`.
///
/// - `withdraw`, `store_value`: logged, restricted to `member`/`admin`,
///   transactional with `admin` notified on abort
/// - `create_guid`: logged, results cached for one second
#[must_use]
pub fn declare_wallet_metadata(builder: MetadataRegistryBuilder) -> MetadataRegistryBuilder {
    let guarded = || {
        vec![
            Marker::LogParameters,
            Marker::Authorized {
                role: Role::new("member"),
            },
            Marker::Authorized {
                role: Role::new("admin"),
            },
            Marker::Transaction {
                notify: Role::new("admin"),
            },
        ]
    };
    builder
        .operation(operation(WITHDRAW), guarded())
        .operation(operation(STORE_VALUE), guarded())
        .operation(
            operation(CREATE_GUID),
            [Marker::LogParameters, Marker::CacheResult { duration_ms: 1000 }],
        )
}

/// Registry containing only the wallet operations.
///
/// # Errors
///
/// Propagates any [`ConfigurationError`] from validation.
pub fn wallet_metadata() -> Result<MetadataRegistry, ConfigurationError> {
    declare_wallet_metadata(MetadataRegistry::builder()).build()
}

// ---------------------------------------------------------------------------
// WalletClient
// ---------------------------------------------------------------------------

/// Typed front door to the wallet operations. Every call goes through the
/// dispatcher and therefore through every interceptor stage.
#[derive(Clone)]
pub struct WalletClient {
    dispatcher: Dispatcher,
}

impl WalletClient {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// # Errors
    ///
    /// Returns the error raised by the pipeline or the operation.
    pub async fn withdraw(
        &self,
        account: &str,
        amount: i64,
        banking_account: &str,
    ) -> Result<(), InvocationError> {
        self.dispatcher
            .invoke(
                operation(WITHDRAW),
                vec![account.into(), amount.into(), banking_account.into()],
            )
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Returns the error raised by the pipeline or the operation.
    pub async fn store_value(
        &self,
        banking_account: &str,
        amount: i64,
        account: &str,
    ) -> Result<(), InvocationError> {
        self.dispatcher
            .invoke(
                operation(STORE_VALUE),
                vec![banking_account.into(), amount.into(), account.into()],
            )
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Returns the error raised by the pipeline or the operation.
    pub async fn create_guid(&self, name: &str, seed: i64) -> Result<String, InvocationError> {
        let value = self
            .dispatcher
            .invoke(operation(CREATE_GUID), vec![name.into(), seed.into()])
            .await?;
        Ok(value.render())
    }
}

// ---------------------------------------------------------------------------
// Console collaborators
// ---------------------------------------------------------------------------

/// Wallet repository that only reports what it would do.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleWalletRepo;

impl WalletRepo for ConsoleWalletRepo {
    fn update_delta(&self, account: &str, delta: i64) -> anyhow::Result<()> {
        info!(target: "cutpoint::wallet", "UpdateDelta({account},{delta})");
        Ok(())
    }
}

/// Banking gateway that only reports what it would do.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleBankingAccount;

impl BankingAccount for ConsoleBankingAccount {
    fn saving(&self, banking_account: &str, amount: i64) -> anyhow::Result<()> {
        info!(target: "cutpoint::wallet", "Saving({banking_account},{amount})");
        Ok(())
    }

    fn withdraw(&self, banking_account: &str, amount: i64) -> anyhow::Result<()> {
        info!(target: "cutpoint::wallet", "Withdraw({banking_account},{amount})");
        Ok(())
    }
}

/// Same fee for every banking account.
#[derive(Debug, Clone, Copy)]
pub struct FixedFee(pub i64);

impl Default for FixedFee {
    fn default() -> Self {
        Self(5)
    }
}

impl FeeSchedule for FixedFee {
    fn fee(&self, _banking_account: &str) -> i64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
