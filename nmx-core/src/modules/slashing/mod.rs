// src/modules/slashing/mod.rs

//! Liveness and double-sign punishment.
//!
//! Each bonded validator carries a circular bitmap of its recent votes. Too
//! many misses inside the window jail and slash it; evidence of a duplicate
//! vote slashes harder and tombstones it for good.

pub mod genesis;
pub mod hooks;
pub mod keeper;
pub mod params;
pub(crate) mod store;
pub mod types;

pub use genesis::SlashingGenesis;
pub use hooks::SlashingHooks;
pub use keeper::SlashingKeeper;
pub use params::{SlashingParam, SlashingParams};
pub use types::{max_missed_blocks, MsgUnjail, ValidatorMissedBlocks, ValidatorSigningInfo};

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::crisis::InvariantRegistry;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use nmx_crypto::{ConsAddress, ValAddress};
use serde::Deserialize;

#[derive(Deserialize)]
struct SigningInfoQuery {
    address: ConsAddress,
}

#[derive(Deserialize)]
struct SlashEventsQuery {
    validator: ValAddress,
}

/// Slashing module
#[derive(Debug, Clone)]
pub struct SlashingModule {
    keeper: SlashingKeeper,
}

impl SlashingModule {
    /// Wraps a keeper
    pub fn new(keeper: SlashingKeeper) -> Self {
        Self { keeper }
    }

    /// Keeper
    pub fn keeper(&self) -> &SlashingKeeper {
        &self.keeper
    }
}

impl AppModule for SlashingModule {
    fn name(&self) -> &'static str {
        names::SLASHING
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        genesis::validate_genesis(&state.slashing)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.slashing)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.slashing = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.begin_block(ctx)
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        let keeper = self.keeper.clone();
        registry.register(names::SLASHING, "missed-counter", move |ctx| {
            keeper.missed_counter_invariant(ctx)
        });
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::Unjail(m) => {
                self.keeper.unjail(ctx, m)?;
                msg_result(&())
            }
            other => Err(NmxError::UnknownRequest(format!("slashing cannot handle {}", other.type_name()))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "signing-info" => {
                let q: SigningInfoQuery = query_params(data)?;
                let info = self
                    .keeper
                    .signing_info(ctx, &q.address)?
                    .ok_or_else(|| NmxError::NotFound(format!("signing info of {}", q.address)))?;
                query_result(&info)
            }
            "slash-events" => {
                let q: SlashEventsQuery = query_params(data)?;
                query_result(&store::validator_slash_events(ctx, &q.validator)?)
            }
            "params" => query_result(&self.keeper.params(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("slashing/{}", endpoint))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use crate::context::{BlockHeader, ExecMode};
    use crate::math::{Dec, Int};
    use crate::modules::auth::{default_module_permissions, AuthKeeper};
    use crate::modules::bank::BankKeeper;
    use crate::modules::params::ParamsKeeper;
    use crate::modules::staking::test_support::*;
    use crate::modules::staking::{MsgDelegate, StakingKeeper};
    use crate::time::Timestamp;
    use nmx_crypto::AccAddress;
    use std::time::Duration;

    fn create_test_slashing() -> SlashingKeeper {
        let staking =
            StakingKeeper::new(BankKeeper::new(AuthKeeper::new(default_module_permissions()))).with_hooks(SlashingHooks);
        SlashingKeeper::new(staking)
    }

    fn header_at(height: u64, time: Timestamp) -> BlockHeader {
        BlockHeader {
            time,
            ..create_test_header(height)
        }
    }

    fn small_window(ctx: &mut Context<'_>) {
        let params = SlashingParams {
            signed_blocks_window: 100,
            min_signed_per_window: Dec::percent(50),
            ..Default::default()
        };
        ParamsKeeper.set(ctx, &params).unwrap();
    }

    /// Bonded validator 1 with 1.5M tokens, 400k of them delegated by a third party
    fn create_test_validator(keeper: &SlashingKeeper, ctx: &mut Context<'_>) -> (ValAddress, ConsAddress) {
        let staking = keeper.staking();
        let val = create_bonded_validator(staking, ctx, 1, 1_100_000);
        let delegator = AccAddress::new([9u8; 20]);
        fund(staking, ctx, &delegator, 400_000);
        staking
            .delegate(
                ctx,
                &MsgDelegate {
                    delegator_address: delegator,
                    validator_address: val,
                    amount: crate::coins::Coin::new(crate::BOND_DENOM, 400_000u64),
                },
            )
            .unwrap();
        let cons = staking.validator(ctx, &val).unwrap().cons_address();
        (val, cons)
    }

    #[test]
    fn test_downtime_jails_on_miss_past_threshold() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(60), ExecMode::BeginBlock);
        let keeper = create_test_slashing();
        small_window(&mut ctx);
        let (val, cons) = create_test_validator(&keeper, &mut ctx);

        for _ in 0..50 {
            keeper.handle_validator_signature(&mut ctx, &cons, 1_500, false).unwrap();
        }
        let info = keeper.signing_info(&mut ctx, &cons).unwrap().unwrap();
        assert_eq!(info.missed_blocks_counter, 50);
        assert!(!keeper.staking().validator(&mut ctx, &val).unwrap().jailed);

        keeper.handle_validator_signature(&mut ctx, &cons, 1_500, false).unwrap();
        let validator = keeper.staking().validator(&mut ctx, &val).unwrap();
        assert!(validator.jailed);
        assert_eq!(validator.tokens, Int::new(1_485_000));

        let info = keeper.signing_info(&mut ctx, &cons).unwrap().unwrap();
        assert_eq!(info.missed_blocks_counter, 0);
        assert_eq!(info.index_offset, 0);
        assert_eq!(info.jailed_until, create_test_header(60).time.add(Duration::from_secs(86_400)));
        assert!(store::all_missed(&mut ctx).unwrap().is_empty());

        let events = store::validator_slash_events(&mut ctx, &val).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].infraction_height, 59);
        assert_eq!(events[0].reason, crate::modules::staking::SlashReason::Downtime);
    }

    #[test]
    fn test_signed_vote_clears_old_miss() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(5), ExecMode::BeginBlock);
        let keeper = create_test_slashing();
        let params = SlashingParams {
            signed_blocks_window: 4,
            min_signed_per_window: Dec::percent(50),
            ..Default::default()
        };
        ParamsKeeper.set(&mut ctx, &params).unwrap();
        let (_, cons) = create_test_validator(&keeper, &mut ctx);

        for signed in [false, false, true, true] {
            keeper.handle_validator_signature(&mut ctx, &cons, 1_500, signed).unwrap();
        }
        assert_eq!(keeper.signing_info(&mut ctx, &cons).unwrap().unwrap().missed_blocks_counter, 2);
        // slot 0 wraps around and flips from missed to signed
        keeper.handle_validator_signature(&mut ctx, &cons, 1_500, true).unwrap();
        let info = keeper.signing_info(&mut ctx, &cons).unwrap().unwrap();
        assert_eq!(info.missed_blocks_counter, 1);
        assert_eq!(info.index_offset, 1);
        assert_eq!(keeper.missed_counter_invariant(&mut ctx).unwrap(), None);
    }

    #[test]
    fn test_unjail_rules() {
        let mut store = create_test_store();
        let keeper = create_test_slashing();
        let jailed_at = create_test_header(60).time;
        let val;
        {
            let mut ctx = Context::new(&mut store, create_test_header(60), ExecMode::BeginBlock);
            small_window(&mut ctx);
            let (v, cons) = create_test_validator(&keeper, &mut ctx);
            val = v;
            let msg = MsgUnjail { validator_address: val };
            assert!(matches!(keeper.unjail(&mut ctx, &msg), Err(NmxError::ValidatorNotJailed(_))));
            for _ in 0..51 {
                keeper.handle_validator_signature(&mut ctx, &cons, 1_500, false).unwrap();
            }
            assert!(matches!(keeper.unjail(&mut ctx, &msg), Err(NmxError::ValidatorJailed(_))));
        }
        let msg = MsgUnjail { validator_address: val };
        let mut ctx = Context::new(
            &mut store,
            header_at(61, jailed_at.add(Duration::from_secs(86_400))),
            ExecMode::Deliver,
        );
        keeper.unjail(&mut ctx, &msg).unwrap();
        assert!(!keeper.staking().validator(&mut ctx, &val).unwrap().jailed);
    }

    #[test]
    fn test_unjail_needs_minimum_self_bond() {
        let mut store = create_test_store();
        let keeper = create_test_slashing();
        let val;
        {
            let mut ctx = Context::new(&mut store, create_test_header(60), ExecMode::BeginBlock);
            small_window(&mut ctx);
            val = create_bonded_validator(keeper.staking(), &mut ctx, 1, 1_000_000);
            let cons = keeper.staking().validator(&mut ctx, &val).unwrap().cons_address();
            for _ in 0..51 {
                keeper.handle_validator_signature(&mut ctx, &cons, 1_000, false).unwrap();
            }
        }
        let later = create_test_header(60).time.add(Duration::from_secs(2 * 86_400));
        let mut ctx = Context::new(&mut store, header_at(61, later), ExecMode::Deliver);
        // 1% downtime slash leaves 990_000 against a 1_000_000 minimum
        assert!(matches!(
            keeper.unjail(&mut ctx, &MsgUnjail { validator_address: val }),
            Err(NmxError::SelfDelegationBelowMinimum(_))
        ));
    }

    #[test]
    fn test_double_sign_tombstones() {
        let mut store = create_test_store();
        let keeper = create_test_slashing();
        let val;
        {
            let mut ctx = Context::new(&mut store, create_test_header(10), ExecMode::BeginBlock);
            let (v, cons) = create_test_validator(&keeper, &mut ctx);
            val = v;
            assert!(keeper.handle_double_sign(&mut ctx, &cons, 8, 1_500).unwrap());
            let validator = keeper.staking().validator(&mut ctx, &val).unwrap();
            assert!(validator.jailed);
            assert_eq!(validator.tokens, Int::new(1_425_000));
            let info = keeper.signing_info(&mut ctx, &cons).unwrap().unwrap();
            assert!(info.tombstoned);
            assert_eq!(info.jailed_until, Timestamp::MAX);

            assert!(!keeper.handle_double_sign(&mut ctx, &cons, 9, 1_500).unwrap());
            assert_eq!(keeper.staking().validator(&mut ctx, &val).unwrap().tokens, Int::new(1_425_000));
        }
        let far = Timestamp::from_unix_secs(4_000_000_000);
        let mut ctx = Context::new(&mut store, header_at(11, far), ExecMode::Deliver);
        assert!(matches!(
            keeper.unjail(&mut ctx, &MsgUnjail { validator_address: val }),
            Err(NmxError::ValidatorJailed(_))
        ));
    }

    #[test]
    fn test_slash_events_get_sequences() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(10), ExecMode::BeginBlock);
        let keeper = create_test_slashing();
        let (val, cons) = create_test_validator(&keeper, &mut ctx);
        let staking = keeper.staking();
        for _ in 0..2 {
            staking
                .slash(&mut ctx, &cons, 9, 1_500, Dec::percent(1), crate::modules::staking::SlashReason::Anomaly)
                .unwrap();
        }
        let events = store::validator_slash_events(&mut ctx, &val).unwrap();
        assert_eq!(events.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_genesis_roundtrip() {
        let keeper = create_test_slashing();
        let mut source = create_test_store();
        let exported = {
            let mut ctx = Context::new(&mut source, create_test_header(60), ExecMode::BeginBlock);
            small_window(&mut ctx);
            let (_, cons) = create_test_validator(&keeper, &mut ctx);
            for signed in [false, true, false] {
                keeper.handle_validator_signature(&mut ctx, &cons, 1_500, signed).unwrap();
            }
            keeper.export_genesis(&mut ctx).unwrap()
        };
        assert!(genesis::validate_genesis(&exported).is_ok());
        assert_eq!(exported.missed_blocks[0].missed_indices, vec![0, 2]);

        let mut target = create_test_store();
        {
            let mut ctx = Context::new(&mut target, create_test_header(60), ExecMode::Genesis);
            keeper.init_genesis(&mut ctx, &exported).unwrap();
            assert_eq!(keeper.export_genesis(&mut ctx).unwrap(), exported);
        }
        source.commit();
        target.commit();
        assert_eq!(
            source.latest().store_root(names::SLASHING),
            target.latest().store_root(names::SLASHING)
        );
    }
}
