// src/modules/distribution.rs

//! Fee distribution.
//!
//! At the start of every block the fee collector's balance moves into the
//! distribution module account and is paid out to the operator accounts of
//! the validators that signed the previous block, pro rata to the power
//! they signed with. Amounts are floored per denom; whatever the floor
//! leaves behind, or the whole balance when nobody signed, stays in the
//! module account as the community pool.

use crate::abci;
use crate::coins::{Coin, Coins};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::genesis::AppState;
use crate::math::Int;
use crate::modules::auth::module_accounts;
use crate::modules::bank::BankKeeper;
use crate::modules::crisis::InvariantRegistry;
use crate::modules::staking::StakingKeeper;
use crate::modules::{query_result, AppModule};
use crate::store::names;
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const COMMUNITY_POOL: &[u8] = &[0x01];

/// Distribution genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionGenesis {
    /// Undistributed remainder held by the module account
    #[serde(default)]
    pub community_pool: Coins,
}

/// Distribution keeper
#[derive(Debug, Clone)]
pub struct DistributionKeeper {
    staking: StakingKeeper,
}

impl DistributionKeeper {
    /// Creates a keeper paying the signers known to `staking`
    pub fn new(staking: StakingKeeper) -> Self {
        Self { staking }
    }

    fn bank(&self) -> &BankKeeper {
        self.staking.bank()
    }

    /// Coins held back from distribution
    pub fn community_pool(&self, ctx: &mut Context<'_>) -> Result<Coins> {
        Ok(ctx.kv(names::DISTRIBUTION).get(COMMUNITY_POOL)?.unwrap_or_default())
    }

    fn set_community_pool(&self, ctx: &mut Context<'_>, pool: &Coins) -> Result<()> {
        ctx.kv(names::DISTRIBUTION).set(COMMUNITY_POOL, pool)
    }

    /// Pays the collected fees to the signers of the previous block
    ///
    /// # Returns
    /// Amount paid to each operator account
    pub fn allocate_fees(&self, ctx: &mut Context<'_>) -> Result<BTreeMap<AccAddress, Coins>> {
        let collector = self.bank().auth().module_address(module_accounts::FEE_COLLECTOR);
        let collected = self.bank().get_all_balances(ctx, &collector)?;
        if collected.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.bank()
            .send_module_to_module(ctx, module_accounts::FEE_COLLECTOR, module_accounts::DISTRIBUTION, &collected)?;

        let mut signers = Vec::new();
        let mut total_power: i128 = 0;
        for vote in abci::last_commit(ctx)?.votes {
            if !vote.signed_last_block || vote.validator.power <= 0 {
                continue;
            }
            match self.staking.validator_by_cons(ctx, &vote.validator.address)? {
                Some(validator) => {
                    total_power += i128::from(vote.validator.power);
                    signers.push((validator.operator_account(), i128::from(vote.validator.power)));
                }
                None => debug!("no validator for signer {}", vote.validator.address),
            }
        }

        let mut payouts: BTreeMap<AccAddress, Vec<Coin>> = BTreeMap::new();
        let mut remainder = Vec::new();
        for coin in collected.iter() {
            let mut paid = Int::ZERO;
            if total_power > 0 {
                for (operator, power) in &signers {
                    let share = coin
                        .amount
                        .mul_ratio(*power, total_power)
                        .ok_or_else(|| NmxError::Overflow(format!("reward share of {}", coin)))?;
                    if share.is_positive() {
                        paid = paid.checked_add(share)?;
                        push_coin(payouts.entry(*operator).or_default(), &coin.denom, share)?;
                    }
                }
            }
            let left = coin.amount.checked_sub(paid)?;
            if left.is_positive() {
                remainder.push(Coin::new(coin.denom.clone(), left));
            }
        }

        let mut paid_out = BTreeMap::new();
        for (operator, coins) in payouts {
            let coins = Coins::new(coins)?;
            self.bank()
                .send_coins_from_module(ctx, module_accounts::DISTRIBUTION, &operator, &coins)?;
            ctx.emit(
                Event::new(types::REWARDS)
                    .attr("recipient", operator)
                    .attr("amount", &coins),
            );
            paid_out.insert(operator, coins);
        }

        let remainder = Coins::new(remainder)?;
        if !remainder.is_empty() {
            let pool = self.community_pool(ctx)?.checked_add(&remainder)?;
            self.set_community_pool(ctx, &pool)?;
            ctx.emit(Event::new(types::COMMUNITY_POOL).attr("amount", &remainder));
        }
        debug!(
            "distributed {} to {} signers at height {}",
            collected,
            paid_out.len(),
            ctx.height()
        );
        Ok(paid_out)
    }

    /// Writes the distribution genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &DistributionGenesis) -> Result<()> {
        self.bank().auth().ensure_module_account(ctx, module_accounts::DISTRIBUTION)?;
        self.set_community_pool(ctx, &genesis.community_pool)
    }

    /// Reads the distribution genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<DistributionGenesis> {
        Ok(DistributionGenesis {
            community_pool: self.community_pool(ctx)?,
        })
    }
}

fn push_coin(coins: &mut Vec<Coin>, denom: &str, amount: Int) -> Result<()> {
    match coins.iter_mut().find(|c| c.denom == denom) {
        Some(existing) => existing.amount = existing.amount.checked_add(amount)?,
        None => coins.push(Coin::new(denom, amount)),
    }
    Ok(())
}

/// Distribution module account holds exactly the community pool between blocks
pub fn community_pool_invariant(keeper: &DistributionKeeper, ctx: &mut Context<'_>) -> Result<Option<String>> {
    let module = keeper.bank().auth().module_address(module_accounts::DISTRIBUTION);
    let held = keeper.bank().get_all_balances(ctx, &module)?;
    let pool = keeper.community_pool(ctx)?;
    if held != pool {
        return Ok(Some(format!("distribution account holds {} but the pool is {}", held, pool)));
    }
    Ok(None)
}

/// Distribution module
#[derive(Debug, Clone)]
pub struct DistributionModule {
    keeper: DistributionKeeper,
}

impl DistributionModule {
    /// Wraps a keeper
    pub fn new(keeper: DistributionKeeper) -> Self {
        Self { keeper }
    }
}

impl AppModule for DistributionModule {
    fn name(&self) -> &'static str {
        names::DISTRIBUTION
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        state.distribution.community_pool.validate()
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.distribution)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.distribution = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.allocate_fees(ctx).map(|_| ())
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        let keeper = self.keeper.clone();
        registry.register(names::DISTRIBUTION, "community-pool", move |ctx| {
            community_pool_invariant(&keeper, ctx)
        });
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, _data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "community_pool" => query_result(&self.keeper.community_pool(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("distribution/{}", endpoint))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abci::{Header, LastCommitInfo, RequestBeginBlock, VoteInfo, VoteValidator};
    use crate::context::test_support::*;
    use crate::context::ExecMode;
    use crate::modules::staking::test_support::{create_bonded_validator, create_test_staking};
    use nmx_crypto::{ConsAddress, ValAddress};

    fn create_test_distribution() -> DistributionKeeper {
        DistributionKeeper::new(create_test_staking())
    }

    fn collect_fees(keeper: &DistributionKeeper, ctx: &mut Context<'_>, amount: i128) {
        let coins = Coins::single(crate::BOND_DENOM, Int::new(amount));
        keeper.bank().mint_coins(ctx, module_accounts::NEUROPOS, &coins).unwrap();
        keeper
            .bank()
            .send_module_to_module(ctx, module_accounts::NEUROPOS, module_accounts::FEE_COLLECTOR, &coins)
            .unwrap();
    }

    fn record_votes(ctx: &mut Context<'_>, votes: Vec<VoteInfo>) {
        let req = RequestBeginBlock {
            header: Header {
                chain_id: "nmx-test".to_string(),
                height: ctx.height(),
                time: ctx.block_time(),
                proposer_address: ConsAddress::new([0u8; 20]),
            },
            last_commit_info: LastCommitInfo { round: 0, votes },
            byzantine_validators: Vec::new(),
        };
        abci::record_block_evidence(ctx, &req).unwrap();
    }

    fn create_test_vote(keeper: &DistributionKeeper, ctx: &mut Context<'_>, val: &ValAddress, signed: bool) -> VoteInfo {
        let validator = keeper.staking.validator(ctx, val).unwrap();
        VoteInfo {
            validator: VoteValidator {
                address: validator.cons_address(),
                power: validator.consensus_power(),
            },
            signed_last_block: signed,
        }
    }

    fn balance(keeper: &DistributionKeeper, ctx: &mut Context<'_>, b: u8) -> Int {
        keeper
            .bank()
            .get_balance(ctx, &AccAddress::new([b; 20]), crate::BOND_DENOM)
            .unwrap()
    }

    #[test]
    fn test_fees_split_by_signed_power() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(2), ExecMode::BeginBlock);
        let keeper = create_test_distribution();
        let v1 = create_bonded_validator(&keeper.staking, &mut ctx, 1, 1_000_000);
        let v2 = create_bonded_validator(&keeper.staking, &mut ctx, 2, 3_000_000);
        let votes = vec![
            create_test_vote(&keeper, &mut ctx, &v1, true),
            create_test_vote(&keeper, &mut ctx, &v2, true),
        ];
        record_votes(&mut ctx, votes);
        collect_fees(&keeper, &mut ctx, 1_001);

        let paid = keeper.allocate_fees(&mut ctx).unwrap();
        assert_eq!(paid.len(), 2);
        assert_eq!(balance(&keeper, &mut ctx, 1), Int::new(250));
        assert_eq!(balance(&keeper, &mut ctx, 2), Int::new(750));
        assert_eq!(
            keeper.community_pool(&mut ctx).unwrap(),
            Coins::single(crate::BOND_DENOM, 1u64)
        );
        assert_eq!(community_pool_invariant(&keeper, &mut ctx).unwrap(), None);
    }

    #[test]
    fn test_absent_signer_gets_nothing() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(2), ExecMode::BeginBlock);
        let keeper = create_test_distribution();
        let v1 = create_bonded_validator(&keeper.staking, &mut ctx, 1, 1_000_000);
        let v2 = create_bonded_validator(&keeper.staking, &mut ctx, 2, 3_000_000);
        let votes = vec![
            create_test_vote(&keeper, &mut ctx, &v1, true),
            create_test_vote(&keeper, &mut ctx, &v2, false),
        ];
        record_votes(&mut ctx, votes);
        collect_fees(&keeper, &mut ctx, 500);

        keeper.allocate_fees(&mut ctx).unwrap();
        assert_eq!(balance(&keeper, &mut ctx, 1), Int::new(500));
        assert!(balance(&keeper, &mut ctx, 2).is_zero());
        assert!(keeper.community_pool(&mut ctx).unwrap().is_empty());
    }

    #[test]
    fn test_no_signers_fills_community_pool() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(2), ExecMode::BeginBlock);
        let keeper = create_test_distribution();
        collect_fees(&keeper, &mut ctx, 70);
        assert!(keeper.allocate_fees(&mut ctx).unwrap().is_empty());
        collect_fees(&keeper, &mut ctx, 30);
        keeper.allocate_fees(&mut ctx).unwrap();
        assert_eq!(
            keeper.community_pool(&mut ctx).unwrap(),
            Coins::single(crate::BOND_DENOM, 100u64)
        );
        assert_eq!(community_pool_invariant(&keeper, &mut ctx).unwrap(), None);

        let exported = keeper.export_genesis(&mut ctx).unwrap();
        assert_eq!(exported.community_pool.amount_of(crate::BOND_DENOM), Int::new(100));
    }

    #[test]
    fn test_pool_mismatch_breaks_invariant() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Genesis);
        let keeper = create_test_distribution();
        keeper
            .init_genesis(
                &mut ctx,
                &DistributionGenesis {
                    community_pool: Coins::single(crate::BOND_DENOM, 5u64),
                },
            )
            .unwrap();
        let detail = community_pool_invariant(&keeper, &mut ctx).unwrap();
        assert!(detail.unwrap().contains("pool is 5unmx"));
    }
}
