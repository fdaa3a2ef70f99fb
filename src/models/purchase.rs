// SPDX-License-Identifier: MIT

//! Simulated purchase model.
//!
//! Purchases are ephemeral: they live in an in-memory map for the duration
//! of the checkout flow and are never persisted.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Fixed simulated gas fee added to every purchase.
pub const GAS_FEE: f64 = 0.002;

/// Seconds the UI counts down before redirecting after a successful purchase.
pub const SUCCESS_REDIRECT_SECS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ItemType {
    Nft,
    Music,
}

/// Purchase lifecycle: `pending → processing → {success, failed}`,
/// with `failed → pending` allowed via explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum PurchaseStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl PurchaseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PurchaseStatus::Success | PurchaseStatus::Failed)
    }
}

/// An in-flight simulated purchase.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub price: f64,
    pub gas_fee: f64,
    pub total: f64,
    pub status: PurchaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Set on success; the frontend counts down then redirects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_countdown_secs: Option<u32>,
}

impl Purchase {
    /// Create a pending purchase with the total rounded to avoid float noise.
    pub fn new(id: String, user_id: String, item_type: ItemType, item_id: String, price: f64) -> Self {
        let total = ((price + GAS_FEE) * 1e6).round() / 1e6;
        Self {
            id,
            user_id,
            item_type,
            item_id,
            price,
            gas_fee: GAS_FEE,
            total,
            status: PurchaseStatus::Pending,
            failure_reason: None,
            redirect_countdown_secs: None,
        }
    }
}
