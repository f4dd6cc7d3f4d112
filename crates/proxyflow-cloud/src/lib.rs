//! proxyflow cloud inventory
//!
//! Async side of planning. Providers answer read-only lookups for existing
//! objects; [`prefetch`] asks them once per lookup key and hands the
//! synchronous core a [`LookupCache`](proxyflow_core::LookupCache).
//! [`ChangeSet`] turns emitted documents into a reviewable list of actions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 proxyflow CLI                    │
//! │           (validate / plan / synth)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               proxyflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait InventoryProvider { find(...) }    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │   prefetch   │  │  change set  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ static (JSON) │ │      aws      │
//! │   inventory   │ │   inventory   │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod inventory;
pub mod provider;

// Re-exports
pub use action::{Action, ActionType, ChangeSet, PlanSummary};
pub use error::{CloudError, Result};
pub use inventory::{StaticInventory, prefetch};
pub use provider::{AuthStatus, InventoryProvider};
