// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod catalog;
pub mod fetch;
pub mod identity;
pub mod payment;
pub mod session;
pub mod token;

pub use catalog::{CatalogClient, CatalogService, RecommendationSeeds};
pub use fetch::{FetchController, FetchState, HomeFeedCache};
pub use identity::IdentityClient;
pub use payment::{PayAttempt, PaymentService, RandomExecutor, TransactionExecutor, TransactionOutcome};
pub use session::SessionService;
pub use token::TokenManager;
