// SPDX-License-Identifier: MIT

//! Wallet and purchase routes. Backed entirely by the in-memory
//! [`PaymentService`]; nothing here touches the document store.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::purchase::{ItemType, Purchase};
use crate::services::PayAttempt;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/wallet", get(wallet_status))
        .route("/api/wallet/connect", post(connect_wallet))
        .route("/api/wallet/disconnect", post(disconnect_wallet))
        .route("/api/wallet/account-changed", post(account_changed))
        .route("/api/market/purchases", post(create_purchase))
        .route("/api/market/purchases/{id}", get(get_purchase))
        .route("/api/market/purchases/{id}/pay", post(pay))
        .route("/api/market/purchases/{id}/retry", post(retry))
}

// ─── Wallet ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConnectWalletRequest {
    pub address: String,
}

#[derive(Deserialize)]
pub struct AccountChangedRequest {
    /// `None` means the wallet reported no remaining accounts.
    pub address: Option<String>,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub connected: bool,
    pub address: Option<String>,
}

async fn wallet_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<WalletResponse> {
    let address = state.payments.wallet_address(&user.uid);
    Json(WalletResponse {
        connected: address.is_some(),
        address,
    })
}

async fn connect_wallet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ConnectWalletRequest>,
) -> Result<Json<WalletResponse>> {
    let address = state.payments.connect_wallet(&user.uid, &payload.address)?;
    tracing::info!(uid = %user.uid, "Wallet connected");

    Ok(Json(WalletResponse {
        connected: true,
        address: Some(address),
    }))
}

async fn disconnect_wallet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<WalletResponse> {
    state.payments.disconnect_wallet(&user.uid);
    Json(WalletResponse {
        connected: false,
        address: None,
    })
}

/// Mirror a wallet-side account switch. A `null` address disconnects.
async fn account_changed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AccountChangedRequest>,
) -> Result<Json<WalletResponse>> {
    state
        .payments
        .account_changed(&user.uid, payload.address.as_deref())?;
    let address = state.payments.wallet_address(&user.uid);

    Ok(Json(WalletResponse {
        connected: address.is_some(),
        address,
    }))
}

// ─── Purchases ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreatePurchaseRequest {
    pub item_type: ItemType,
    pub item_id: String,
    pub price: f64,
}

/// Pay response. `wallet_required` tells the client to open the wallet
/// connect flow; the purchase itself stays `pending` in that case.
#[derive(Serialize)]
pub struct PayResponse {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub wallet_required: bool,
}

async fn create_purchase(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePurchaseRequest>,
) -> Result<Json<Purchase>> {
    let purchase = state.payments.create_purchase(
        &user.uid,
        payload.item_type,
        &payload.item_id,
        payload.price,
    )?;
    Ok(Json(purchase))
}

async fn get_purchase(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Purchase>> {
    let purchase = state.payments.get_purchase(&user.uid, &id)?;
    Ok(Json(purchase))
}

async fn pay(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PayResponse>> {
    let response = match state.payments.pay(&user.uid, &id)? {
        PayAttempt::Accepted(purchase) => PayResponse {
            purchase,
            wallet_required: false,
        },
        PayAttempt::WalletRequired(purchase) => PayResponse {
            purchase,
            wallet_required: true,
        },
    };
    Ok(Json(response))
}

/// Reset a failed purchase back to `pending` so it can be paid again.
async fn retry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Purchase>> {
    let purchase = state.payments.retry(&user.uid, &id)?;
    Ok(Json(purchase))
}
