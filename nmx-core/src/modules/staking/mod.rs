// src/modules/staking/mod.rs

//! NeuroPoS staking core.
//!
//! Validators, delegations, unbondings and redelegations, the two token
//! pools and the validator-set diff reported to consensus. Shares are
//! translated to tokens through each validator's `tokens / shares` ratio,
//! which is how slashing dilutes every delegator alike.

pub mod delegation;
pub mod genesis;
pub mod hooks;
pub mod invariants;
pub mod keeper;
pub mod msgs;
pub mod params;
pub mod slash;
pub(crate) mod store;
pub mod types;
pub mod validator_set;

pub use genesis::StakingGenesis;
pub use hooks::ValidatorHooks;
pub use keeper::StakingKeeper;
pub use msgs::{MsgBeginRedelegate, MsgCreateValidator, MsgDelegate, MsgEditValidator, MsgUndelegate};
pub use params::{StakingParam, StakingParams};
pub use types::*;

use crate::abci::ValidatorUpdate;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::crisis::InvariantRegistry;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use nmx_crypto::{AccAddress, ValAddress};
use serde::Deserialize;

#[derive(Deserialize)]
struct ValidatorQuery {
    address: ValAddress,
}

#[derive(Deserialize)]
struct DelegationQuery {
    delegator: AccAddress,
    validator: ValAddress,
}

/// Staking module
#[derive(Debug, Clone)]
pub struct StakingModule {
    keeper: StakingKeeper,
}

impl StakingModule {
    /// Wraps a keeper
    pub fn new(keeper: StakingKeeper) -> Self {
        Self { keeper }
    }

    /// Keeper
    pub fn keeper(&self) -> &StakingKeeper {
        &self.keeper
    }
}

impl AppModule for StakingModule {
    fn name(&self) -> &'static str {
        names::STAKING
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        genesis::validate_genesis(&state.staking)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.staking)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.staking = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.track_historical_info(ctx)
    }

    fn end_block(&self, ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
        self.keeper.complete_mature_entries(ctx)?;
        self.keeper.unbond_mature_validators(ctx)?;
        self.keeper.apply_validator_set_updates(ctx)
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        invariants::register(&self.keeper, registry);
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::CreateValidator(m) => {
                let validator = self.keeper.create_validator(ctx, m)?;
                msg_result(&validator.operator_address)
            }
            Msg::EditValidator(m) => {
                self.keeper.edit_validator(ctx, m)?;
                msg_result(&())
            }
            Msg::Delegate(m) => msg_result(&self.keeper.delegate(ctx, m)?),
            Msg::Undelegate(m) => msg_result(&self.keeper.undelegate(ctx, m)?),
            Msg::BeginRedelegate(m) => msg_result(&self.keeper.begin_redelegate(ctx, m)?),
            other => Err(NmxError::UnknownRequest(format!("staking cannot handle {}", other.type_name()))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "validator" => {
                let q: ValidatorQuery = query_params(data)?;
                query_result(&self.keeper.validator(ctx, &q.address)?)
            }
            "validators" => query_result(&self.keeper.all_validators(ctx)?),
            "delegation" => {
                let q: DelegationQuery = query_params(data)?;
                let delegation = self
                    .keeper
                    .get_delegation(ctx, &q.delegator, &q.validator)?
                    .ok_or_else(|| NmxError::NoDelegation(format!("{} -> {}", q.delegator, q.validator)))?;
                query_result(&delegation)
            }
            "validator-delegations" => {
                let q: ValidatorQuery = query_params(data)?;
                query_result(&self.keeper.validator_delegations(ctx, &q.address)?)
            }
            "unbonding" => {
                let q: DelegationQuery = query_params(data)?;
                let ubd = self
                    .keeper
                    .get_unbonding(ctx, &q.delegator, &q.validator)?
                    .ok_or_else(|| NmxError::NotFound(format!("unbonding {} -> {}", q.delegator, q.validator)))?;
                query_result(&ubd)
            }
            "params" => query_result(&self.keeper.params(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("staking/{}", endpoint))),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::coins::{Coin, Coins};
    use crate::math::{Dec, Int};
    use crate::modules::auth::{default_module_permissions, module_accounts, AuthKeeper};
    use crate::modules::bank::BankKeeper;
    use nmx_crypto::PublicKey;

    pub fn create_test_staking() -> StakingKeeper {
        StakingKeeper::new(BankKeeper::new(AuthKeeper::new(default_module_permissions())))
    }

    pub fn create_test_operator(b: u8) -> (AccAddress, ValAddress, PublicKey) {
        (AccAddress::new([b; 20]), ValAddress::new([b; 20]), PublicKey([b; 32]))
    }

    /// Mints `amount` unmx to `addr`
    pub fn fund(keeper: &StakingKeeper, ctx: &mut Context<'_>, addr: &AccAddress, amount: i128) {
        let coins = Coins::single(crate::BOND_DENOM, Int::new(amount));
        keeper.bank().mint_coins(ctx, module_accounts::NEUROPOS, &coins).unwrap();
        keeper
            .bank()
            .send_coins_from_module(ctx, module_accounts::NEUROPOS, addr, &coins)
            .unwrap();
    }

    pub fn create_validator_msg(b: u8, self_bond: i128) -> MsgCreateValidator {
        let (acc, val, pk) = create_test_operator(b);
        MsgCreateValidator {
            description: Description::with_moniker(format!("validator-{}", b)),
            commission: CommissionRates {
                rate: Dec::percent(10),
                max_rate: Dec::percent(20),
                max_change_rate: Dec::percent(1),
            },
            min_self_delegation: Int::new(1_000_000),
            delegator_address: acc,
            validator_address: val,
            pubkey: pk,
            value: Coin::new(crate::BOND_DENOM, Int::new(self_bond)),
        }
    }

    /// Funds, creates and bonds a validator
    pub fn create_bonded_validator(keeper: &StakingKeeper, ctx: &mut Context<'_>, b: u8, self_bond: i128) -> ValAddress {
        let msg = create_validator_msg(b, self_bond);
        fund(keeper, ctx, &msg.delegator_address, self_bond);
        keeper.create_validator(ctx, &msg).unwrap();
        keeper.apply_validator_set_updates(ctx).unwrap();
        msg.validator_address
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::coins::Coin;
    use crate::context::test_support::*;
    use crate::context::{BlockHeader, ExecMode};
    use crate::math::{Dec, Int};
    use crate::modules::auth::module_accounts;
    use crate::store::VersionedStore;
    use crate::time::Timestamp;
    use std::time::Duration;

    fn header_at(height: u64, time: Timestamp) -> BlockHeader {
        BlockHeader {
            time,
            ..create_test_header(height)
        }
    }

    fn pool_balance(keeper: &StakingKeeper, ctx: &mut Context<'_>, pool: &str) -> Int {
        let addr = keeper.bank().auth().module_address(pool);
        keeper.bank().get_balance(ctx, &addr, crate::BOND_DENOM).unwrap()
    }

    fn assert_invariants(keeper: &StakingKeeper, ctx: &mut Context<'_>) {
        assert_eq!(invariants::module_accounts_invariant(keeper, ctx).unwrap(), None);
        assert_eq!(invariants::delegator_shares_invariant(ctx).unwrap(), None);
        assert_eq!(invariants::positive_tokens_invariant(ctx).unwrap(), None);
    }

    #[test]
    fn test_bootstrap_and_delegate() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let keeper = create_test_staking();
        let val = create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);

        let delegator = AccAddress::new([9u8; 20]);
        fund(&keeper, &mut ctx, &delegator, 500_000);
        let shares = keeper
            .delegate(
                &mut ctx,
                &MsgDelegate {
                    delegator_address: delegator,
                    validator_address: val,
                    amount: Coin::new(crate::BOND_DENOM, 500_000u64),
                },
            )
            .unwrap();
        assert_eq!(shares, Dec::from_int(500_000));

        let validator = keeper.validator(&mut ctx, &val).unwrap();
        assert_eq!(validator.tokens, Int::new(1_500_000));
        assert_eq!(validator.delegator_shares, Dec::from_int(1_500_000));
        assert_eq!(pool_balance(&keeper, &mut ctx, module_accounts::BONDED_POOL), Int::new(1_500_000));
        assert_invariants(&keeper, &mut ctx);

        let delegators: Vec<AccAddress> = keeper
            .validator_delegations(&mut ctx, &val)
            .unwrap()
            .into_iter()
            .map(|d| d.delegator_address)
            .collect();
        assert_eq!(delegators, vec![AccAddress::new([1u8; 20]), delegator]);
        assert!(keeper
            .validator_delegations(&mut ctx, &ValAddress::new([7u8; 20]))
            .unwrap()
            .is_empty());

        let updates = keeper.apply_validator_set_updates(&mut ctx).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].power, 1_500);
    }

    #[test]
    fn test_create_validator_errors() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let keeper = create_test_staking();
        create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);

        let dup = create_validator_msg(1, 1_000_000);
        assert!(matches!(keeper.create_validator(&mut ctx, &dup), Err(NmxError::ValidatorExists(_))));

        let mut same_key = create_validator_msg(2, 1_000_000);
        same_key.pubkey = nmx_crypto::PublicKey([1u8; 32]);
        assert!(matches!(
            keeper.create_validator(&mut ctx, &same_key),
            Err(NmxError::ValidatorPubKeyExists(_))
        ));

        let mut small = create_validator_msg(3, 10);
        small.min_self_delegation = Int::new(10);
        assert!(matches!(
            keeper.create_validator(&mut ctx, &small),
            Err(NmxError::SelfDelegationBelowMinimum(_))
        ));
    }

    #[test]
    fn test_delegate_to_unbonded_validator_fails() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let keeper = create_test_staking();
        let msg = create_validator_msg(1, 1_000_000);
        fund(&keeper, &mut ctx, &msg.delegator_address, 1_000_000);
        keeper.create_validator(&mut ctx, &msg).unwrap();

        let delegator = AccAddress::new([9u8; 20]);
        fund(&keeper, &mut ctx, &delegator, 10);
        let err = keeper
            .delegate(
                &mut ctx,
                &MsgDelegate {
                    delegator_address: delegator,
                    validator_address: msg.validator_address,
                    amount: Coin::new(crate::BOND_DENOM, 10u64),
                },
            )
            .unwrap_err();
        assert!(matches!(err, NmxError::ValidatorNotBonded(_)));
    }

    #[test]
    fn test_undelegate_full_removes_row_and_returns_tokens() {
        let mut store = create_test_store();
        let keeper = create_test_staking();
        let delegator = AccAddress::new([9u8; 20]);
        let start = create_test_header(1).time;
        let val;
        {
            let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
            val = create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);
            fund(&keeper, &mut ctx, &delegator, 300_000);
            keeper
                .delegate(
                    &mut ctx,
                    &MsgDelegate {
                        delegator_address: delegator,
                        validator_address: val,
                        amount: Coin::new(crate::BOND_DENOM, 300_000u64),
                    },
                )
                .unwrap();
            let completion = keeper
                .undelegate(
                    &mut ctx,
                    &MsgUndelegate {
                        delegator_address: delegator,
                        validator_address: val,
                        amount: Coin::new(crate::BOND_DENOM, 300_000u64),
                    },
                )
                .unwrap();
            assert_eq!(completion, start.add(Duration::from_secs(21 * 86_400)));
            assert!(keeper.get_delegation(&mut ctx, &delegator, &val).unwrap().is_none());
            assert_eq!(pool_balance(&keeper, &mut ctx, module_accounts::NOT_BONDED_POOL), Int::new(300_000));
            assert_invariants(&keeper, &mut ctx);
        }

        let later = start.add(Duration::from_secs(21 * 86_400));
        let mut ctx = Context::new(&mut store, header_at(2, later), ExecMode::EndBlock);
        keeper.complete_mature_entries(&mut ctx).unwrap();
        assert_eq!(
            keeper.bank().get_balance(&mut ctx, &delegator, crate::BOND_DENOM).unwrap(),
            Int::new(300_000)
        );
        assert!(keeper.get_unbonding(&mut ctx, &delegator, &val).unwrap().is_none());
        assert_invariants(&keeper, &mut ctx);
    }

    #[test]
    fn test_undelegate_more_than_held_fails() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let keeper = create_test_staking();
        let val = create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);
        let (acc, _, _) = create_test_operator(1);
        let err = keeper
            .undelegate(
                &mut ctx,
                &MsgUndelegate {
                    delegator_address: acc,
                    validator_address: val,
                    amount: Coin::new(crate::BOND_DENOM, 1_000_001u64),
                },
            )
            .unwrap_err();
        assert!(matches!(err, NmxError::InvalidDelegation(_)));
    }

    #[test]
    fn test_self_undelegation_below_minimum_jails() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let keeper = create_test_staking();
        let val = create_bonded_validator(&keeper, &mut ctx, 1, 1_500_000);
        let (acc, _, _) = create_test_operator(1);
        keeper
            .undelegate(
                &mut ctx,
                &MsgUndelegate {
                    delegator_address: acc,
                    validator_address: val,
                    amount: Coin::new(crate::BOND_DENOM, 600_000u64),
                },
            )
            .unwrap();
        assert!(keeper.validator(&mut ctx, &val).unwrap().jailed);

        let updates = keeper.apply_validator_set_updates(&mut ctx).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].power, 0);
        let validator = keeper.validator(&mut ctx, &val).unwrap();
        assert_eq!(validator.status, BondStatus::Unbonding);
        assert_invariants(&keeper, &mut ctx);
    }

    #[test]
    fn test_redelegation_guards() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let keeper = create_test_staking();
        let v1 = create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);
        let v2 = create_bonded_validator(&keeper, &mut ctx, 2, 1_000_000);
        let v3 = create_bonded_validator(&keeper, &mut ctx, 3, 1_000_000);
        let delegator = AccAddress::new([9u8; 20]);
        fund(&keeper, &mut ctx, &delegator, 100);
        keeper
            .delegate(
                &mut ctx,
                &MsgDelegate {
                    delegator_address: delegator,
                    validator_address: v1,
                    amount: Coin::new(crate::BOND_DENOM, 100u64),
                },
            )
            .unwrap();

        let redelegate = |src, dst, amount: u64| MsgBeginRedelegate {
            delegator_address: delegator,
            validator_src_address: src,
            validator_dst_address: dst,
            amount: Coin::new(crate::BOND_DENOM, amount),
        };
        assert_eq!(
            keeper.begin_redelegate(&mut ctx, &redelegate(v1, v1, 10)),
            Err(NmxError::SelfRedelegation)
        );
        keeper.begin_redelegate(&mut ctx, &redelegate(v1, v2, 10)).unwrap();
        assert!(matches!(
            keeper.begin_redelegate(&mut ctx, &redelegate(v2, v3, 5)),
            Err(NmxError::TransitiveRedelegation(_))
        ));

        for _ in 1..7 {
            keeper.begin_redelegate(&mut ctx, &redelegate(v1, v2, 1)).unwrap();
        }
        assert!(matches!(
            keeper.begin_redelegate(&mut ctx, &redelegate(v1, v2, 1)),
            Err(NmxError::MaxEntries(_))
        ));
        let red = keeper.get_redelegation(&mut ctx, &delegator, &v1, &v2).unwrap().unwrap();
        assert_eq!(red.entries.len(), 7);
        assert_invariants(&keeper, &mut ctx);
    }

    #[test]
    fn test_slash_dilutes_and_debits_entries() {
        let mut store = create_test_store();
        let keeper = create_test_staking();
        let delegator = AccAddress::new([9u8; 20]);
        let (v1, v2);
        {
            let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
            v1 = create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);
            v2 = create_bonded_validator(&keeper, &mut ctx, 2, 1_000_000);
        }
        let mut ctx = Context::new(&mut store, create_test_header(5), ExecMode::Deliver);
        fund(&keeper, &mut ctx, &delegator, 500_000);
        keeper
            .delegate(
                &mut ctx,
                &MsgDelegate {
                    delegator_address: delegator,
                    validator_address: v1,
                    amount: Coin::new(crate::BOND_DENOM, 500_000u64),
                },
            )
            .unwrap();
        keeper
            .undelegate(
                &mut ctx,
                &MsgUndelegate {
                    delegator_address: delegator,
                    validator_address: v1,
                    amount: Coin::new(crate::BOND_DENOM, 100_000u64),
                },
            )
            .unwrap();
        keeper
            .begin_redelegate(
                &mut ctx,
                &MsgBeginRedelegate {
                    delegator_address: delegator,
                    validator_src_address: v1,
                    validator_dst_address: v2,
                    amount: Coin::new(crate::BOND_DENOM, 200_000u64),
                },
            )
            .unwrap();

        let before = keeper.validator(&mut ctx, &v1).unwrap();
        let cons = before.cons_address();
        let burned = keeper
            .slash(&mut ctx, &cons, 4, before.potential_power(), Dec::percent(10), SlashReason::DoubleSign)
            .unwrap();

        let after = keeper.validator(&mut ctx, &v1).unwrap();
        assert_eq!(after.tokens, Int::new(1_080_000));
        assert_eq!(after.delegator_shares, before.delegator_shares);
        let ubd = keeper.get_unbonding(&mut ctx, &delegator, &v1).unwrap().unwrap();
        assert_eq!(ubd.entries[0].balance, Int::new(90_000));
        let dst = keeper.get_delegation(&mut ctx, &delegator, &v2).unwrap().unwrap();
        assert_eq!(dst.shares, Dec::from_int(180_000));
        assert_eq!(burned, Int::new(120_000 + 10_000 + 20_000));
        assert_invariants(&keeper, &mut ctx);
    }

    #[test]
    fn test_slash_to_zero_keeps_shares_priced() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(3), ExecMode::Deliver);
        let keeper = create_test_staking();
        let params = StakingParams {
            min_self_delegation: Int::new(1),
            ..Default::default()
        };
        crate::modules::params::ParamsKeeper.set(&mut ctx, &params).unwrap();
        let msg = MsgCreateValidator {
            min_self_delegation: Int::new(1),
            ..create_validator_msg(1, 1)
        };
        fund(&keeper, &mut ctx, &msg.delegator_address, 1);
        keeper.create_validator(&mut ctx, &msg).unwrap();

        let before = keeper.validator(&mut ctx, &msg.validator_address).unwrap();
        assert_eq!(before.tokens, Int::new(1));
        let burned = keeper
            .slash(&mut ctx, &before.cons_address(), 3, 0, Dec::percent(50), SlashReason::DoubleSign)
            .unwrap();
        assert_eq!(burned, Int::ZERO);

        let after = keeper.validator(&mut ctx, &msg.validator_address).unwrap();
        assert_eq!(after.tokens, Int::new(1));
        assert_eq!(after.delegator_shares, Dec::from_int(1));
        assert_invariants(&keeper, &mut ctx);

        // larger validators still lose the full fraction
        let mut big = create_validator_msg(2, 3);
        big.min_self_delegation = Int::new(1);
        fund(&keeper, &mut ctx, &big.delegator_address, 3);
        keeper.create_validator(&mut ctx, &big).unwrap();
        let cons = keeper.validator(&mut ctx, &big.validator_address).unwrap().cons_address();
        let burned = keeper
            .slash(&mut ctx, &cons, 3, 0, Dec::percent(50), SlashReason::DoubleSign)
            .unwrap();
        assert_eq!(burned, Int::new(2));
        assert_eq!(keeper.validator(&mut ctx, &big.validator_address).unwrap().tokens, Int::new(1));
        assert_invariants(&keeper, &mut ctx);
    }

    #[test]
    fn test_delegation_to_tokenless_shares_is_rejected() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        let keeper = create_test_staking();
        let val = create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);

        let mut validator = keeper.validator(&mut ctx, &val).unwrap();
        validator.tokens = Int::ZERO;
        assert!(matches!(
            validator.add_tokens_from_delegation(Int::new(10)),
            Err(NmxError::InvalidExchangeRate(_))
        ));
        assert_eq!(validator.delegator_shares, Dec::from_int(1_000_000));

        // an empty validator prices new shares one to one
        validator.delegator_shares = Dec::ZERO;
        assert_eq!(validator.add_tokens_from_delegation(Int::new(10)).unwrap(), Dec::from_int(10));
        assert_eq!(validator.tokens, Int::new(10));
    }

    #[test]
    fn test_edit_validator_commission_rules() {
        let mut store = create_test_store();
        let keeper = create_test_staking();
        let val;
        {
            let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
            val = create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);
            let edit = MsgEditValidator {
                validator_address: val,
                description: None,
                commission_rate: Some(Dec::percent(11)),
                min_self_delegation: None,
            };
            assert!(matches!(
                keeper.edit_validator(&mut ctx, &edit),
                Err(NmxError::CommissionUpdateTooSoon(_))
            ));
        }
        let day_later = create_test_header(1).time.add(Duration::from_secs(86_400));
        let mut ctx = Context::new(&mut store, header_at(2, day_later), ExecMode::Deliver);
        let over = MsgEditValidator {
            validator_address: val,
            description: None,
            commission_rate: Some(Dec::percent(11) + Dec::from_raw(1)),
            min_self_delegation: None,
        };
        assert!(matches!(keeper.edit_validator(&mut ctx, &over), Err(NmxError::InvalidCommissionRate(_))));
        let exact = MsgEditValidator {
            commission_rate: Some(Dec::percent(11)),
            ..over
        };
        keeper.edit_validator(&mut ctx, &exact).unwrap();
        assert_eq!(keeper.validator(&mut ctx, &val).unwrap().commission.rates.rate, Dec::percent(11));

        let lower_min = MsgEditValidator {
            validator_address: val,
            description: None,
            commission_rate: None,
            min_self_delegation: Some(Int::new(999_999)),
        };
        assert!(keeper.edit_validator(&mut ctx, &lower_min).is_err());
    }

    #[test]
    fn test_unbonding_validator_matures_and_is_removed() {
        let mut store = create_test_store();
        let keeper = create_test_staking();
        let (acc, val, _) = create_test_operator(1);
        {
            let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
            create_bonded_validator(&keeper, &mut ctx, 1, 1_000_000);
            keeper
                .undelegate(
                    &mut ctx,
                    &MsgUndelegate {
                        delegator_address: acc,
                        validator_address: val,
                        amount: Coin::new(crate::BOND_DENOM, 1_000_000u64),
                    },
                )
                .unwrap();
            keeper.apply_validator_set_updates(&mut ctx).unwrap();
            assert_eq!(keeper.validator(&mut ctx, &val).unwrap().status, BondStatus::Unbonding);
        }
        let later = create_test_header(1).time.add(Duration::from_secs(21 * 86_400));
        let mut ctx = Context::new(&mut store, header_at(2, later), ExecMode::EndBlock);
        keeper.unbond_mature_validators(&mut ctx).unwrap();
        assert!(keeper.get_validator(&mut ctx, &val).unwrap().is_none());
        keeper.complete_mature_entries(&mut ctx).unwrap();
        assert_eq!(
            keeper.bank().get_balance(&mut ctx, &acc, crate::BOND_DENOM).unwrap(),
            Int::new(1_000_000)
        );
    }

    #[test]
    fn test_genesis_roundtrip_reproduces_hash() {
        let keeper = create_test_staking();
        let mut source = create_test_store();
        let (exported, bank) = {
            let mut ctx = Context::new(&mut source, create_test_header(1), ExecMode::Deliver);
            let v1 = create_bonded_validator(&keeper, &mut ctx, 1, 2_000_000);
            create_bonded_validator(&keeper, &mut ctx, 2, 1_000_000);
            let (acc, _, _) = create_test_operator(1);
            keeper
                .undelegate(
                    &mut ctx,
                    &MsgUndelegate {
                        delegator_address: acc,
                        validator_address: v1,
                        amount: Coin::new(crate::BOND_DENOM, 5u64),
                    },
                )
                .unwrap();
            keeper.track_historical_info(&mut ctx).unwrap();
            (
                keeper.export_genesis(&mut ctx).unwrap(),
                keeper.bank().export_genesis(&mut ctx).unwrap(),
            )
        };
        let auth = {
            let mut ctx = Context::new(&mut source, create_test_header(1), ExecMode::Query);
            keeper.bank().auth().export_genesis(&mut ctx).unwrap()
        };
        assert!(genesis::validate_genesis(&exported).is_ok());

        let mut target = VersionedStore::new(crate::store::names::ALL, 0);
        {
            let mut ctx = Context::new(&mut target, create_test_header(1), ExecMode::Genesis);
            keeper.bank().auth().init_genesis(&mut ctx, &auth).unwrap();
            keeper.bank().init_genesis(&mut ctx, &bank).unwrap();
            keeper.init_genesis(&mut ctx, &exported).unwrap();
        }
        source.commit();
        target.commit();
        assert_eq!(
            source.latest().store_root(names::STAKING),
            target.latest().store_root(names::STAKING)
        );
    }
}
