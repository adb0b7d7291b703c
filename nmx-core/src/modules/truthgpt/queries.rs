// src/modules/truthgpt/queries.rs

//! Oracle query lifecycle.
//!
//! A query escrows its fee on submission and is dispatched by the next
//! BeginBlock. With a zero `response_quorum` every listed source answers
//! at dispatch and the query completes in the same block; otherwise the
//! query waits for source owners to submit answers and fails, refunding
//! the fee, once `query_timeout_blocks` pass without a quorum.
//!
//! On completion the escrowed fee is split among the answering sources'
//! owners by trust score. Shares are floored; the leftover units go one
//! at a time to responders in ascending source id order.

use super::keeper::TruthGptKeeper;
use super::msgs::{MsgCreateOracleQuery, MsgSubmitSourceResponse};
use super::params::TruthGptParams;
use super::store;
use super::types::{
    dispatch_confidence, response_id, DataSourceStatus, OracleQuery, OracleResponse, QueryStatus, SourceResponse,
    SourceResponseStatus,
};
use crate::coins::{Coin, Coins};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::{Dec, Int};
use crate::modules::auth::module_accounts;
use tracing::{debug, info, warn};

/// Splits every denom of `fee` in proportion to `weights`
///
/// All-zero weights split equally. The units lost to flooring are handed
/// out one by one from the first weight onward.
pub fn split_fee(fee: &Coins, weights: &[Dec]) -> Result<Vec<Coins>> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }
    let mut total: i128 = weights.iter().map(|w| w.raw().max(0)).sum();
    let equal = total == 0;
    if equal {
        total = weights.len() as i128;
    }

    let mut shares: Vec<Vec<Coin>> = vec![Vec::new(); weights.len()];
    for coin in fee.iter() {
        let mut amounts = Vec::with_capacity(weights.len());
        let mut paid = Int::ZERO;
        for weight in weights {
            let w = if equal { 1 } else { weight.raw().max(0) };
            let amount = coin
                .amount
                .mul_ratio(w, total)
                .ok_or_else(|| NmxError::Overflow(format!("splitting {}", coin)))?;
            paid = paid.checked_add(amount)?;
            amounts.push(amount);
        }
        let mut remainder = coin.amount.checked_sub(paid)?;
        let mut i = 0;
        while remainder.is_positive() {
            let slot = i % weights.len();
            amounts[slot] = amounts[slot].checked_add(Int::new(1))?;
            remainder = remainder.checked_sub(Int::new(1))?;
            i += 1;
        }
        for (share, amount) in shares.iter_mut().zip(amounts) {
            share.push(Coin::new(coin.denom.clone(), amount));
        }
    }
    shares.into_iter().map(Coins::new).collect()
}

impl TruthGptKeeper {
    /// Executes [`MsgCreateOracleQuery`]
    ///
    /// # Returns
    /// Id of the pending query
    pub fn create_query(&self, ctx: &mut Context<'_>, msg: &MsgCreateOracleQuery) -> Result<String> {
        let params = self.params(ctx)?;
        let min = &params.min_query_fee;
        if msg.fee.amount_of(&min.denom) < min.amount {
            return Err(NmxError::InsufficientFee(format!(
                "query fee {} is below the minimum {}",
                msg.fee, min
            )));
        }
        for source_id in &msg.data_sources {
            let source = self.data_source(ctx, source_id)?;
            match source.status {
                DataSourceStatus::Blocked => {
                    return Err(NmxError::DataSourceBlocked(source_id.clone()));
                }
                DataSourceStatus::Inactive => {
                    return Err(NmxError::InvalidState(format!("data source {} is inactive", source_id)));
                }
                DataSourceStatus::Pending | DataSourceStatus::Active => {}
            }
        }

        self.bank
            .send_coins_to_module(ctx, &msg.requester, module_accounts::TRUTHGPT, &msg.fee)?;

        let id = ctx.derive_id("query");
        if store::get_query(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("oracle query {}", id)));
        }
        let query = OracleQuery {
            id: id.clone(),
            requester: msg.requester,
            query_type: msg.query_type.clone(),
            query: msg.query.clone(),
            data_sources: msg.data_sources.clone(),
            status: QueryStatus::Pending,
            fee: msg.fee.clone(),
            created_at: ctx.block_time(),
            created_height: ctx.height(),
            dispatched_height: None,
            completed_at: None,
            response_id: None,
            source_responses: Vec::new(),
            callback_data: msg.callback_data.clone(),
        };
        store::set_query(ctx, &query)?;
        ctx.emit(
            Event::new(types::ORACLE_QUERY)
                .attr("query_id", &id)
                .attr("requester", msg.requester)
                .attr("query_type", &msg.query_type)
                .attr("fee", &msg.fee),
        );
        debug!("oracle query {} escrowed {}", id, msg.fee);
        Ok(id)
    }

    /// Executes [`MsgSubmitSourceResponse`]
    ///
    /// # Returns
    /// Status of the query after the answer
    pub fn submit_source_response(&self, ctx: &mut Context<'_>, msg: &MsgSubmitSourceResponse) -> Result<QueryStatus> {
        let params = self.params(ctx)?;
        let mut query = self.query(ctx, &msg.query_id)?;
        if query.status != QueryStatus::Processing {
            return Err(NmxError::InvalidState(format!(
                "oracle query {} is not awaiting answers",
                query.id
            )));
        }
        let source = self.data_source(ctx, &msg.source_id)?;
        if source.owner != msg.responder {
            return Err(NmxError::Unauthorized(format!(
                "{} does not own data source {}",
                msg.responder, msg.source_id
            )));
        }
        let now = ctx.block_time();
        let stub = query
            .source_responses
            .iter_mut()
            .find(|r| r.source_id == msg.source_id)
            .ok_or_else(|| NmxError::NotFound(format!("data source {} in query {}", msg.source_id, msg.query_id)))?;
        if stub.status != SourceResponseStatus::Awaiting {
            return Err(NmxError::InvalidState(format!(
                "data source {} already answered query {}",
                msg.source_id, msg.query_id
            )));
        }
        stub.response = msg.response.clone();
        stub.confidence = msg.confidence;
        stub.timestamp = now;
        stub.status = SourceResponseStatus::Success;

        let elapsed = ctx.height().saturating_sub(query.dispatched_height.unwrap_or(query.created_height));
        let on_time = elapsed <= params.query_timeout_blocks / 2;
        if let Some(mut rank) = store::get_rank(ctx, &msg.source_id)? {
            rank.record_response(on_time, !msg.response.is_empty(), msg.confidence);
            store::set_rank(ctx, &rank)?;
        }

        let quorum = (params.response_quorum as usize).min(query.data_sources.len());
        if query.answered() >= quorum {
            self.complete_query(ctx, &mut query, &params)?;
        } else {
            store::set_query(ctx, &query)?;
        }
        Ok(query.status)
    }

    /// Fails processing queries whose timeout passed, then dispatches
    /// pending ones. Closed queries are never visited.
    pub fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        let params = self.params(ctx)?;
        let height = ctx.height();
        for mut query in store::open_queries(ctx)? {
            match query.status {
                QueryStatus::Processing => {
                    let dispatched = query.dispatched_height.unwrap_or(query.created_height);
                    if height.saturating_sub(dispatched) >= params.query_timeout_blocks {
                        self.fail_query(ctx, &mut query)?;
                    }
                }
                QueryStatus::Pending => self.dispatch_query(ctx, &mut query, &params)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn dispatch_query(&self, ctx: &mut Context<'_>, query: &mut OracleQuery, params: &TruthGptParams) -> Result<()> {
        let now = ctx.block_time();
        query.dispatched_height = Some(ctx.height());
        query.status = QueryStatus::Processing;
        query.source_responses = query
            .data_sources
            .iter()
            .map(|id| SourceResponse::awaiting(id, now))
            .collect();

        let answer_now = params.response_quorum == 0;
        for response in query.source_responses.iter_mut() {
            let Some(mut rank) = store::get_rank(ctx, &response.source_id)? else {
                continue;
            };
            rank.assigned += 1;
            if answer_now {
                response.confidence = dispatch_confidence();
                response.status = SourceResponseStatus::Success;
                rank.record_response(true, true, dispatch_confidence());
            }
            store::set_rank(ctx, &rank)?;
        }

        if answer_now {
            self.complete_query(ctx, query, params)
        } else {
            store::set_query(ctx, query)?;
            debug!("oracle query {} dispatched to {} sources", query.id, query.data_sources.len());
            Ok(())
        }
    }

    fn complete_query(&self, ctx: &mut Context<'_>, query: &mut OracleQuery, params: &TruthGptParams) -> Result<()> {
        let now = ctx.block_time();
        let mut answers: Vec<&SourceResponse> = query
            .source_responses
            .iter()
            .filter(|r| r.status == SourceResponseStatus::Success)
            .collect();
        answers.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        let confidence_sum: Dec = answers.iter().map(|r| r.confidence).sum();
        let confidence = confidence_sum.quo_int(answers.len() as i128).unwrap_or(Dec::ZERO);
        let processed_by = if store::get_model(ctx, &params.default_model_id)?.is_some() {
            params.default_model_id.clone()
        } else {
            String::new()
        };

        let mut payees = Vec::with_capacity(answers.len());
        let mut weights = Vec::with_capacity(answers.len());
        for answer in &answers {
            let owner = store::get_source(ctx, &answer.source_id)?.map(|s| s.owner);
            let trust = store::get_rank(ctx, &answer.source_id)?
                .map(|r| r.trust_score)
                .unwrap_or(Dec::ZERO);
            payees.push((answer.source_id.clone(), owner));
            weights.push(trust);
        }

        for response in query.source_responses.iter_mut() {
            if response.status == SourceResponseStatus::Awaiting {
                response.status = SourceResponseStatus::Failed;
            }
        }
        let response = OracleResponse {
            id: response_id(&query.id),
            query_id: query.id.clone(),
            source_responses: query.source_responses.clone(),
            confidence,
            processed_by,
            created_at: now,
        };
        store::set_response(ctx, &response)?;

        query.status = QueryStatus::Completed;
        query.completed_at = Some(now);
        query.response_id = Some(response.id.clone());
        store::set_query(ctx, query)?;

        let shares = split_fee(&query.fee, &weights)?;
        let mut refund = Coins::empty();
        for ((source_id, owner), share) in payees.into_iter().zip(shares) {
            match owner {
                Some(owner) => self
                    .bank
                    .send_coins_from_module(ctx, module_accounts::TRUTHGPT, &owner, &share)?,
                None => {
                    warn!(
                        "data source {} vanished before payout of query {}, refunding {}",
                        source_id, query.id, share
                    );
                    refund = refund.checked_add(&share)?;
                }
            }
        }
        if !refund.is_empty() {
            self.bank
                .send_coins_from_module(ctx, module_accounts::TRUTHGPT, &query.requester, &refund)?;
        }

        ctx.emit(
            Event::new(types::ORACLE_RESPONSE)
                .attr("query_id", &query.id)
                .attr("response_id", &response.id)
                .attr("confidence", confidence)
                .attr("responders", answers_len(&response)),
        );
        info!("oracle query {} completed with confidence {}", query.id, confidence);
        Ok(())
    }

    fn fail_query(&self, ctx: &mut Context<'_>, query: &mut OracleQuery) -> Result<()> {
        self.bank
            .send_coins_from_module(ctx, module_accounts::TRUTHGPT, &query.requester, &query.fee)?;
        for response in query.source_responses.iter_mut() {
            if response.status == SourceResponseStatus::Awaiting {
                response.status = SourceResponseStatus::Failed;
            }
        }
        query.status = QueryStatus::Failed;
        query.completed_at = Some(ctx.block_time());
        store::set_query(ctx, query)?;
        ctx.emit(
            Event::new(types::ORACLE_QUERY_FAILED)
                .attr("query_id", &query.id)
                .attr("answered", query.answered())
                .attr("refund", &query.fee),
        );
        warn!("oracle query {} timed out with {} answers", query.id, query.answered());
        Ok(())
    }
}

fn answers_len(response: &OracleResponse) -> usize {
    response
        .source_responses
        .iter()
        .filter(|r| r.status == SourceResponseStatus::Success)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fee_by_trust() {
        let fee = Coins::single("unmx", 100u64);
        let shares = split_fee(&fee, &[Dec::percent(50), Dec::percent(50)]).unwrap();
        assert_eq!(shares[0].amount_of("unmx"), Int::new(50));
        assert_eq!(shares[1].amount_of("unmx"), Int::new(50));

        let shares = split_fee(&fee, &[Dec::percent(60), Dec::percent(30)]).unwrap();
        assert_eq!(shares[0].amount_of("unmx"), Int::new(67));
        assert_eq!(shares[1].amount_of("unmx"), Int::new(33));
    }

    #[test]
    fn test_split_fee_remainder_goes_first() {
        let fee = Coins::single("unmx", 100u64);
        let third = Dec::from_ratio(1, 3);
        let shares = split_fee(&fee, &[third, third, third]).unwrap();
        let amounts: Vec<Int> = shares.iter().map(|s| s.amount_of("unmx")).collect();
        assert_eq!(amounts, vec![Int::new(34), Int::new(33), Int::new(33)]);
    }

    #[test]
    fn test_split_fee_zero_weights_split_equally() {
        let fee = Coins::new(vec![Coin::new("uatom", 5u64), Coin::new("unmx", 10u64)]).unwrap();
        let shares = split_fee(&fee, &[Dec::ZERO, Dec::ZERO]).unwrap();
        assert_eq!(shares[0].amount_of("uatom"), Int::new(3));
        assert_eq!(shares[1].amount_of("uatom"), Int::new(2));
        assert_eq!(shares[0].amount_of("unmx"), Int::new(5));
        assert!(split_fee(&fee, &[]).unwrap().is_empty());
    }
}
