// SPDX-License-Identifier: MIT

//! Simulated wallet and checkout flow.
//!
//! The payment never touches a chain: `processing` resolves after a fixed
//! delay and the outcome comes from a `TransactionExecutor` strategy. The
//! default executor rejects roughly 10% of transactions at random; tests
//! inject deterministic executors instead.

use crate::error::AppError;
use crate::models::purchase::{ItemType, Purchase, PurchaseStatus, SUCCESS_REDIRECT_SECS};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Fixed simulated settlement delay.
const SETTLEMENT_DELAY: Duration = Duration::from_secs(3);

/// Default probability that the simulated transaction fails.
const DEFAULT_FAILURE_RATE: f64 = 0.1;

/// Outcome of a simulated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Confirmed,
    Rejected(String),
}

/// Strategy deciding how a processing transaction resolves.
pub trait TransactionExecutor: Send + Sync {
    fn decide(&self, purchase: &Purchase) -> TransactionOutcome;
}

/// Default executor: pseudo-random failures at a fixed rate.
pub struct RandomExecutor {
    failure_rate: f64,
}

impl Default for RandomExecutor {
    fn default() -> Self {
        Self {
            failure_rate: DEFAULT_FAILURE_RATE,
        }
    }
}

impl TransactionExecutor for RandomExecutor {
    fn decide(&self, _purchase: &Purchase) -> TransactionOutcome {
        if rand::random::<f64>() < self.failure_rate {
            TransactionOutcome::Rejected("Transaction rejected by network".to_string())
        } else {
            TransactionOutcome::Confirmed
        }
    }
}

/// Result of a pay attempt.
#[derive(Debug, Clone)]
pub enum PayAttempt {
    /// Moved to `processing`; settlement runs in the background.
    Accepted(Purchase),
    /// No wallet connected: state stays `pending`, UI prompts connection.
    WalletRequired(Purchase),
}

/// Wallet registry plus in-flight purchases.
///
/// Purchases are ephemeral: held only in this map, never persisted.
#[derive(Clone)]
pub struct PaymentService {
    wallets: Arc<DashMap<String, String>>,
    purchases: Arc<DashMap<String, Purchase>>,
    executor: Arc<dyn TransactionExecutor>,
    settlement_delay: Duration,
}

impl Default for PaymentService {
    fn default() -> Self {
        Self::new(Arc::new(RandomExecutor::default()), SETTLEMENT_DELAY)
    }
}

impl PaymentService {
    pub fn new(executor: Arc<dyn TransactionExecutor>, settlement_delay: Duration) -> Self {
        Self {
            wallets: Arc::new(DashMap::new()),
            purchases: Arc::new(DashMap::new()),
            executor,
            settlement_delay,
        }
    }

    // ─── Wallet Registry ─────────────────────────────────────────

    /// Register the address the browser extension reported for this user.
    /// Addresses are normalized to lowercase before validation, so a
    /// checksummed or `0X`-prefixed address is accepted.
    pub fn connect_wallet(&self, uid: &str, address: &str) -> Result<String, AppError> {
        let normalized = address.trim().to_lowercase();
        if !is_valid_address(&normalized) {
            return Err(AppError::Validation(
                "Wallet address must be 0x-prefixed 40 hex characters".to_string(),
            ));
        }

        self.wallets.insert(uid.to_string(), normalized.clone());
        tracing::info!(uid, address = %normalized, "Wallet connected");
        Ok(normalized)
    }

    /// Handle an account-changed notification: a new address replaces the
    /// old one, an empty account list disconnects.
    pub fn account_changed(&self, uid: &str, address: Option<&str>) -> Result<(), AppError> {
        match address {
            Some(addr) => {
                self.connect_wallet(uid, addr)?;
            }
            None => self.disconnect_wallet(uid),
        }
        Ok(())
    }

    /// Forget the user's wallet. Idempotent.
    pub fn disconnect_wallet(&self, uid: &str) {
        self.wallets.remove(uid);
        tracing::info!(uid, "Wallet disconnected");
    }

    pub fn wallet_address(&self, uid: &str) -> Option<String> {
        self.wallets.get(uid).map(|a| a.clone())
    }

    // ─── Purchase Lifecycle ──────────────────────────────────────

    /// Create a pending purchase quote.
    pub fn create_purchase(
        &self,
        uid: &str,
        item_type: ItemType,
        item_id: &str,
        price: f64,
    ) -> Result<Purchase, AppError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(AppError::Validation(
                "Price must be a positive number".to_string(),
            ));
        }

        let purchase = Purchase::new(
            uuid::Uuid::new_v4().to_string(),
            uid.to_string(),
            item_type,
            item_id.to_string(),
            price,
        );
        self.purchases.insert(purchase.id.clone(), purchase.clone());

        tracing::info!(
            uid,
            purchase_id = %purchase.id,
            total = purchase.total,
            "Purchase quoted"
        );
        Ok(purchase)
    }

    /// Get a purchase, scoped to its owner.
    pub fn get_purchase(&self, uid: &str, purchase_id: &str) -> Result<Purchase, AppError> {
        match self.purchases.get(purchase_id) {
            Some(p) if p.user_id == uid => Ok(p.clone()),
            _ => Err(AppError::NotFound(format!("Purchase {}", purchase_id))),
        }
    }

    /// Attempt to pay: `pending → processing`, which requires a connected
    /// wallet. Without one the purchase stays `pending` and the caller
    /// shows a connect prompt. Settlement resolves in the background after
    /// the fixed delay via the executor strategy.
    pub fn pay(&self, uid: &str, purchase_id: &str) -> Result<PayAttempt, AppError> {
        let mut entry = match self.purchases.get_mut(purchase_id) {
            Some(p) if p.user_id == uid => p,
            _ => return Err(AppError::NotFound(format!("Purchase {}", purchase_id))),
        };

        if entry.status != PurchaseStatus::Pending {
            return Err(AppError::BadRequest(format!(
                "Purchase is {:?}, expected pending",
                entry.status
            )));
        }

        if self.wallet_address(uid).is_none() {
            tracing::info!(uid, purchase_id, "Pay attempted without a wallet");
            return Ok(PayAttempt::WalletRequired(entry.clone()));
        }

        entry.status = PurchaseStatus::Processing;
        let snapshot = entry.clone();
        drop(entry);

        let purchases = Arc::clone(&self.purchases);
        let executor = Arc::clone(&self.executor);
        let delay = self.settlement_delay;
        let id = purchase_id.to_string();
        let task_snapshot = snapshot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let outcome = executor.decide(&task_snapshot);
            if let Some(mut entry) = purchases.get_mut(&id) {
                match outcome {
                    TransactionOutcome::Confirmed => {
                        entry.status = PurchaseStatus::Success;
                        entry.failure_reason = None;
                        entry.redirect_countdown_secs = Some(SUCCESS_REDIRECT_SECS);
                        tracing::info!(purchase_id = %id, "Purchase settled");
                    }
                    TransactionOutcome::Rejected(reason) => {
                        entry.status = PurchaseStatus::Failed;
                        entry.failure_reason = Some(reason);
                        tracing::info!(purchase_id = %id, "Purchase failed");
                    }
                }
            }
        });

        Ok(PayAttempt::Accepted(snapshot))
    }

    /// Explicit retry: `failed → pending`.
    pub fn retry(&self, uid: &str, purchase_id: &str) -> Result<Purchase, AppError> {
        let mut entry = match self.purchases.get_mut(purchase_id) {
            Some(p) if p.user_id == uid => p,
            _ => return Err(AppError::NotFound(format!("Purchase {}", purchase_id))),
        };

        if entry.status != PurchaseStatus::Failed {
            return Err(AppError::BadRequest(format!(
                "Purchase is {:?}, only failed purchases can be retried",
                entry.status
            )));
        }

        entry.status = PurchaseStatus::Pending;
        entry.failure_reason = None;
        Ok(entry.clone())
    }
}

fn is_valid_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Executor with a fixed outcome for deterministic tests.
    struct FixedExecutor(TransactionOutcome);

    impl TransactionExecutor for FixedExecutor {
        fn decide(&self, _purchase: &Purchase) -> TransactionOutcome {
            self.0.clone()
        }
    }

    fn instant_service(outcome: TransactionOutcome) -> PaymentService {
        PaymentService::new(Arc::new(FixedExecutor(outcome)), Duration::ZERO)
    }

    async fn wait_for_settlement(service: &PaymentService, uid: &str, id: &str) -> Purchase {
        for _ in 0..100 {
            let p = service.get_purchase(uid, id).unwrap();
            if p.status.is_terminal() {
                return p;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("purchase never settled");
    }

    #[tokio::test]
    async fn pay_without_wallet_leaves_pending() {
        let service = instant_service(TransactionOutcome::Confirmed);
        let purchase = service
            .create_purchase("u1", ItemType::Music, "6", 0.03)
            .unwrap();
        assert_eq!(purchase.total, 0.032);

        let attempt = service.pay("u1", &purchase.id).unwrap();
        assert!(matches!(attempt, PayAttempt::WalletRequired(_)));

        let after = service.get_purchase("u1", &purchase.id).unwrap();
        assert_eq!(after.status, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn pay_with_wallet_settles_successfully() {
        let service = instant_service(TransactionOutcome::Confirmed);
        service
            .connect_wallet("u1", "0x00112233445566778899aabbccddeeff00112233")
            .unwrap();

        let purchase = service
            .create_purchase("u1", ItemType::Nft, "42", 1.5)
            .unwrap();
        let attempt = service.pay("u1", &purchase.id).unwrap();
        assert!(matches!(attempt, PayAttempt::Accepted(_)));

        let settled = wait_for_settlement(&service, "u1", &purchase.id).await;
        assert_eq!(settled.status, PurchaseStatus::Success);
        assert_eq!(settled.redirect_countdown_secs, Some(SUCCESS_REDIRECT_SECS));
    }

    #[tokio::test]
    async fn failed_purchase_can_be_retried() {
        let service = instant_service(TransactionOutcome::Rejected("nope".to_string()));
        service
            .connect_wallet("u1", "0x00112233445566778899aabbccddeeff00112233")
            .unwrap();

        let purchase = service
            .create_purchase("u1", ItemType::Music, "6", 0.03)
            .unwrap();
        service.pay("u1", &purchase.id).unwrap();

        let failed = wait_for_settlement(&service, "u1", &purchase.id).await;
        assert_eq!(failed.status, PurchaseStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("nope"));

        let retried = service.retry("u1", &purchase.id).unwrap();
        assert_eq!(retried.status, PurchaseStatus::Pending);
        assert!(retried.failure_reason.is_none());
    }

    #[tokio::test]
    async fn retry_of_pending_purchase_is_rejected() {
        let service = instant_service(TransactionOutcome::Confirmed);
        let purchase = service
            .create_purchase("u1", ItemType::Music, "6", 0.03)
            .unwrap();

        let err = service.retry("u1", &purchase.id).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn wallet_address_validation() {
        let service = instant_service(TransactionOutcome::Confirmed);
        assert!(service.connect_wallet("u1", "not-an-address").is_err());
        assert!(service
            .connect_wallet("u1", "0x00112233445566778899AABBCCDDEEFF00112233")
            .is_ok());
        // normalized to lowercase
        assert_eq!(
            service.wallet_address("u1").unwrap(),
            "0x00112233445566778899aabbccddeeff00112233"
        );
    }

    #[test]
    fn wallet_address_uppercase_prefix_is_accepted() {
        let service = instant_service(TransactionOutcome::Confirmed);
        assert!(service
            .connect_wallet("u1", "  0X00112233445566778899AABBCCDDEEFF00112233 ")
            .is_ok());
        assert_eq!(
            service.wallet_address("u1").unwrap(),
            "0x00112233445566778899aabbccddeeff00112233"
        );
    }

    #[test]
    fn account_changed_with_no_accounts_disconnects() {
        let service = instant_service(TransactionOutcome::Confirmed);
        service
            .connect_wallet("u1", "0x00112233445566778899aabbccddeeff00112233")
            .unwrap();

        service.account_changed("u1", None).unwrap();
        assert!(service.wallet_address("u1").is_none());
    }

    #[test]
    fn purchases_are_scoped_to_their_owner() {
        let service = instant_service(TransactionOutcome::Confirmed);
        let purchase = service
            .create_purchase("u1", ItemType::Music, "6", 0.03)
            .unwrap();

        assert!(service.get_purchase("u2", &purchase.id).is_err());
    }
}
