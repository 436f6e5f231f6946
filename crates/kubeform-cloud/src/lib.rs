//! kubeform cloud infrastructure
//!
//! Provider abstraction plus the bookkeeping the deployer needs to make runs
//! repeatable: desired resource sets, plans, and the state file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  kubeform CLI                    │
//! │             (kubeform up/preview/down)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 kubeform-core                    │
//! │   layout → plan → deployer → inventory/ansible   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                kubeform-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          trait CloudProvider              │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Plan/Action  │  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │   openstack   │
//! │   provider    │
//! └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod resource;
pub mod state;

pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{
    AuthStatus, CloudProvider, FloatingIpInfo, InstanceInfo, InstanceSpec, KeypairInfo,
};
pub use resource::{ResourceConfig, ResourceSet, ResourceType, resource_key};
pub use state::{
    GlobalState, OutputValue, ResourceState, ResourceStatus, StateLock, StateManager,
};
