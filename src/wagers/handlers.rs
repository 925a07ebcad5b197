// Request handlers for the wager endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::{compute_activity, list_active_wagers};
use crate::auth::AuthUser;
use crate::chain::{Address, EtherAmount, GameHash, Wei};
use crate::error::ApiError;
use crate::escrow::EscrowContract;
use crate::models::*;
use crate::AppState;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))
}

fn parse_wager_id(raw: &str) -> Result<u64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid wager id '{}'", raw)))
}

fn parse_address(field: &str, raw: Option<String>) -> Result<Address, ApiError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} is required", field)))?;
    raw.parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid {} address: {}", field, e)))
}

fn parse_stake(amount: Option<EtherAmount>) -> Result<Wei, ApiError> {
    let amount = amount.ok_or_else(|| ApiError::bad_request("amount is required"))?;
    let stake = amount
        .to_wei()
        .map_err(|e| ApiError::bad_request(format!("Invalid amount: {}", e)))?;
    if stake.is_zero() {
        return Err(ApiError::bad_request("amount must be greater than zero"));
    }
    Ok(stake)
}

async fn contract(state: &AppState) -> Result<Arc<dyn EscrowContract>, ApiError> {
    state
        .bootstrap
        .ensure_ready()
        .await
        .map_err(|e| ApiError::from_escrow(e, "Wager service not available"))
}

/// Push a freshly written wager into the index so reads see our own writes
async fn refresh_index(state: &AppState, contract: &dyn EscrowContract, index: u64) {
    if let Some(wager_index) = &state.index {
        if wager_index.refresh(contract, index).await.is_err() {
            warn!(
                "Wager {} left pending in the index, serving live reads until it catches up",
                index
            );
        }
    }
}

/// Create a new wager, staking `amount` from the caller's wallet
pub async fn create_wager(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<CreateWagerRequest>, JsonRejection>,
) -> Result<Json<CreateWagerResponse>, ApiError> {
    let req = body(payload)?;
    let opponent = parse_address("opponent", req.opponent)?;
    let stake = parse_stake(req.amount)?;
    let game_hash = req
        .game_hash
        .as_deref()
        .and_then(GameHash::from_input)
        .ok_or_else(|| ApiError::bad_request("gameHash is required"))?;
    let from = user.require_wallet()?;

    info!(
        "Wager: create by user='{}' ({}) against {} for {}",
        user.id, from, opponent, stake
    );

    let contract = contract(&state).await?;
    let created = contract
        .create_wager(from, opponent, game_hash, stake)
        .await
        .map_err(|e| {
            warn!("Error creating wager: {}", e);
            ApiError::from_escrow(e, "Error creating wager")
        })?;
    refresh_index(&state, contract.as_ref(), created.wager_index).await;

    Ok(Json(CreateWagerResponse {
        wager_id: created.wager_index,
        transaction_hash: created.tx_hash,
    }))
}

/// Accept a wager by matching its stake
pub async fn accept_wager(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(wager_id): Path<String>,
    payload: Result<Json<AcceptWagerRequest>, JsonRejection>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let index = parse_wager_id(&wager_id)?;
    let req = body(payload)?;
    let stake = parse_stake(req.amount)?;
    let from = user.require_wallet()?;

    info!("Wager: accept {} by user='{}' ({}) with {}", index, user.id, from, stake);

    let contract = contract(&state).await?;
    let tx_hash = contract
        .accept_wager(from, index, stake)
        .await
        .map_err(|e| {
            warn!("Error accepting wager {}: {}", index, e);
            ApiError::from_escrow(e, "Error accepting wager")
        })?;
    refresh_index(&state, contract.as_ref(), index).await;

    Ok(Json(TransactionResponse {
        success: true,
        transaction_hash: tx_hash,
    }))
}

/// Declare the winner of a wager
pub async fn resolve_wager(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(wager_id): Path<String>,
    payload: Result<Json<ResolveWagerRequest>, JsonRejection>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let index = parse_wager_id(&wager_id)?;
    let req = body(payload)?;
    let winner = parse_address("winner", req.winner)?;
    let from = user.require_wallet()?;

    info!("Wager: resolve {} by user='{}' ({}), winner {}", index, user.id, from, winner);

    let contract = contract(&state).await?;
    let tx_hash = contract
        .resolve_wager(from, index, winner)
        .await
        .map_err(|e| {
            warn!("Error resolving wager {}: {}", index, e);
            ApiError::from_escrow(e, "Error resolving wager")
        })?;
    refresh_index(&state, contract.as_ref(), index).await;

    Ok(Json(TransactionResponse {
        success: true,
        transaction_hash: tx_hash,
    }))
}

/// Wager details, always read live from the contract
pub async fn get_wager(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(wager_id): Path<String>,
) -> Result<Json<WagerView>, ApiError> {
    let index = parse_wager_id(&wager_id)?;
    let contract = contract(&state).await?;
    let wager = contract
        .wager(index)
        .await
        .map_err(|e| ApiError::from_escrow(e, "Error fetching wager details"))?;
    Ok(Json(WagerView::from(&wager)))
}

/// Unresolved wagers the caller takes part in
pub async fn get_active_wagers(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<WagerView>>, ApiError> {
    info!("Fetching active wagers for user='{}' ({:?})", user.id, user.wallet);

    let contract = contract(&state).await?;
    let wallet = user.wallet.as_ref();
    let wagers = match state.synced_index() {
        Some(index) => list_active_wagers(index.as_ref(), wallet).await,
        None => list_active_wagers(contract.as_ref(), wallet).await,
    }
    .map_err(|e| ApiError::from_escrow(e, "Error fetching active wagers"))?;

    Ok(Json(wagers.iter().map(WagerView::from).collect()))
}

/// Platform-wide activity over the last seven days
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<ActivityResponse>, ApiError> {
    let contract = contract(&state).await?;
    let now = Utc::now();
    let snapshot = match state.synced_index() {
        Some(index) => compute_activity(index.as_ref(), now).await,
        None => compute_activity(contract.as_ref(), now).await,
    }
    .map_err(|e| ApiError::from_escrow(e, "Error fetching wager activity"))?;

    Ok(Json(ActivityResponse::from(&snapshot)))
}
