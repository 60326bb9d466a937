//! Cutpoint Pipeline: declarative interceptor stages (logging, authorization,
//! caching, transactions) composed as `tower` layers around business operations.

pub mod adapters;
pub mod cache;
pub mod service;
pub mod traits;

#[cfg(test)]
mod testing;

pub use traits::{
    CallerContext, InvocationLog, InvocationRecord, Notifier, TransactionError,
    TransactionManager, TransactionScope,
};
