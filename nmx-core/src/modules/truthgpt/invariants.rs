// src/modules/truthgpt/invariants.rs

//! TruthGPT invariants.

use super::keeper::TruthGptKeeper;
use super::store;
use crate::coins::Coins;
use crate::context::Context;
use crate::errors::Result;
use crate::modules::auth::module_accounts;
use crate::modules::bank::BankKeeper;
use crate::modules::crisis::InvariantRegistry;
use crate::store::names;

/// The module account covers the fees of every open query
pub fn escrow_invariant(bank: &BankKeeper, ctx: &mut Context<'_>) -> Result<Option<String>> {
    let escrowed = store::all_queries(ctx)?
        .into_iter()
        .filter(|q| q.status.is_open())
        .try_fold(Coins::empty(), |acc, q| acc.checked_add(&q.fee))?;
    let module = bank.auth().module_address(module_accounts::TRUTHGPT);
    let balance = bank.get_all_balances(ctx, &module)?;
    if balance.is_all_gte(&escrowed) {
        Ok(None)
    } else {
        Ok(Some(format!("module balance {} does not cover escrowed fees {}", balance, escrowed)))
    }
}

/// Every response answers a stored query and names a known model or none
pub fn responses_invariant(ctx: &mut Context<'_>) -> Result<Option<String>> {
    for response in store::all_responses(ctx)? {
        if store::get_query(ctx, &response.query_id)?.is_none() {
            return Ok(Some(format!(
                "response {} answers unknown query {}",
                response.id, response.query_id
            )));
        }
        if !response.processed_by.is_empty() && store::get_model(ctx, &response.processed_by)?.is_none() {
            return Ok(Some(format!(
                "response {} was processed by unknown model {}",
                response.id, response.processed_by
            )));
        }
    }
    Ok(None)
}

/// Registers the TruthGPT invariants
pub fn register(keeper: &TruthGptKeeper, registry: &mut InvariantRegistry) {
    let bank = keeper.bank().clone();
    registry.register(names::TRUTHGPT, "escrow", move |ctx| escrow_invariant(&bank, ctx));
    registry.register(names::TRUTHGPT, "responses", responses_invariant);
}
