//! # portfolio
//!
//! Portfolio valuation on top of a pluggable [`LedgerStore`].
//!
//! | Store                   | Selected when                                  |
//! |-------------------------|------------------------------------------------|
//! | [`InMemoryLedger`]      | default                                        |
//! | `db::PgLedger`          | `postgres` feature and `DATABASE_URL` is set   |

#[cfg(feature = "postgres")]
pub mod db;
pub mod ledger;
pub mod valuer;

pub use ledger::{InMemoryLedger, LedgerError, LedgerStore};
pub use valuer::PortfolioValuer;
