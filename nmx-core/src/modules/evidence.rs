// src/modules/evidence.rs

//! Byzantine evidence handling.
//!
//! Evidence arrives with the BeginBlock request. Each admissible
//! equivocation is stored under its hash and forwarded to slashing, which
//! slashes, jails and tombstones the offender.

use crate::abci::{self, Misbehavior, MisbehaviorType};
use crate::codec;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::params::ParamsKeeper;
use crate::modules::slashing::SlashingKeeper;
use crate::modules::{query_params, query_result, AppModule};
use crate::store::{key, names};
use crate::time::Timestamp;
use nmx_crypto::hash::{blake3_hash, hex_to_hash, Hash};
use nmx_crypto::ConsAddress;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const EVIDENCE: u8 = 0x01;

/// A duplicate vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivocation {
    /// Infraction height
    pub height: u64,
    /// Infraction time
    pub time: Timestamp,
    /// Offender's power at the infraction
    pub power: i64,
    /// Offender's consensus address
    pub consensus_address: ConsAddress,
}

impl Equivocation {
    /// Converts host evidence
    pub fn from_misbehavior(m: &Misbehavior) -> Self {
        Self {
            height: m.height,
            time: m.time,
            power: m.validator.power,
            consensus_address: m.validator.address,
        }
    }

    /// Hash of the canonical encoding, the replay key
    pub fn hash(&self) -> Result<Hash> {
        Ok(blake3_hash(&codec::encode(self)?))
    }
}

/// Evidence genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceGenesis {
    /// Processed equivocations
    #[serde(default)]
    pub evidence: Vec<Equivocation>,
}

#[derive(Deserialize)]
struct EvidenceQuery {
    hash: String,
}

/// Evidence keeper
#[derive(Debug, Clone)]
pub struct EvidenceKeeper {
    slashing: SlashingKeeper,
}

impl EvidenceKeeper {
    /// Creates a keeper forwarding to `slashing`
    pub fn new(slashing: SlashingKeeper) -> Self {
        Self { slashing }
    }

    /// Stored equivocation by hash
    pub fn get_evidence(&self, ctx: &mut Context<'_>, hash: &Hash) -> Result<Option<Equivocation>> {
        ctx.kv(names::EVIDENCE).get(&key(EVIDENCE, &[hash]))
    }

    fn set_evidence(&self, ctx: &mut Context<'_>, evidence: &Equivocation) -> Result<Hash> {
        let hash = evidence.hash()?;
        ctx.kv(names::EVIDENCE).set(&key(EVIDENCE, &[&hash]), evidence)?;
        Ok(hash)
    }

    /// Every stored equivocation, in hash order
    pub fn all_evidence(&self, ctx: &mut Context<'_>) -> Result<Vec<Equivocation>> {
        ctx.kv(names::EVIDENCE).values(&[EVIDENCE])
    }

    /// Handles one equivocation
    ///
    /// Evidence is dropped when it is older than both consensus age limits,
    /// when its hash was seen before, or when the offender is unknown or
    /// already tombstoned.
    ///
    /// # Returns
    /// Whether the evidence led to a slash
    pub fn handle_equivocation(&self, ctx: &mut Context<'_>, evidence: &Equivocation) -> Result<bool> {
        let limits = ParamsKeeper.consensus_params(ctx)?.evidence;
        let age_blocks = ctx.height().saturating_sub(evidence.height);
        let age = ctx.block_time().since(evidence.time);
        if age_blocks > limits.max_age_num_blocks && age > limits.max_age_duration {
            warn!(
                "ignored expired evidence against {} from height {} ({} blocks old)",
                evidence.consensus_address, evidence.height, age_blocks
            );
            return Ok(false);
        }
        let hash = evidence.hash()?;
        if self.get_evidence(ctx, &hash)?.is_some() {
            warn!("ignored replayed evidence {}", hex::encode(hash));
            return Ok(false);
        }
        if !self
            .slashing
            .handle_double_sign(ctx, &evidence.consensus_address, evidence.height, evidence.power)?
        {
            return Ok(false);
        }
        self.set_evidence(ctx, evidence)?;
        info!(
            "processed equivocation {} by {} at height {}",
            hex::encode(hash),
            evidence.consensus_address,
            evidence.height
        );
        Ok(true)
    }

    /// Processes the evidence delivered with this block
    pub fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        for misbehavior in abci::misbehaviors(ctx)? {
            match misbehavior.kind {
                MisbehaviorType::DuplicateVote => {
                    self.handle_equivocation(ctx, &Equivocation::from_misbehavior(&misbehavior))?;
                }
                MisbehaviorType::LightClientAttack => {
                    warn!(
                        "ignored light client attack evidence against {}",
                        misbehavior.validator.address
                    );
                }
            }
        }
        Ok(())
    }
}

/// Evidence module
#[derive(Debug, Clone)]
pub struct EvidenceModule {
    keeper: EvidenceKeeper,
}

impl EvidenceModule {
    /// Wraps a keeper
    pub fn new(keeper: EvidenceKeeper) -> Self {
        Self { keeper }
    }
}

impl AppModule for EvidenceModule {
    fn name(&self) -> &'static str {
        names::EVIDENCE
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        for evidence in &state.evidence.evidence {
            if evidence.height == 0 || evidence.power <= 0 {
                return Err(NmxError::InvalidState(format!(
                    "invalid equivocation by {} at height {}",
                    evidence.consensus_address, evidence.height
                )));
            }
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        for evidence in &state.evidence.evidence {
            self.keeper.set_evidence(ctx, evidence)?;
        }
        Ok(())
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.evidence = EvidenceGenesis {
            evidence: self.keeper.all_evidence(ctx)?,
        };
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.begin_block(ctx)
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "evidence" => {
                let q: EvidenceQuery = query_params(data)?;
                let hash = hex_to_hash(&q.hash)?;
                let evidence = self
                    .keeper
                    .get_evidence(ctx, &hash)?
                    .ok_or_else(|| NmxError::NotFound(format!("evidence {}", q.hash)))?;
                query_result(&evidence)
            }
            "all" => query_result(&self.keeper.all_evidence(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("evidence/{}", endpoint))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abci::{LastCommitInfo, RequestBeginBlock, VoteValidator};
    use crate::context::test_support::*;
    use crate::context::{BlockHeader, ExecMode};
    use crate::math::Int;
    use crate::modules::auth::{default_module_permissions, AuthKeeper};
    use crate::modules::bank::BankKeeper;
    use crate::modules::slashing::SlashingHooks;
    use crate::modules::staking::test_support::create_bonded_validator;
    use crate::modules::staking::StakingKeeper;
    use std::time::Duration;

    fn create_test_evidence() -> EvidenceKeeper {
        let staking =
            StakingKeeper::new(BankKeeper::new(AuthKeeper::new(default_module_permissions()))).with_hooks(SlashingHooks);
        EvidenceKeeper::new(SlashingKeeper::new(staking))
    }

    fn create_test_equivocation(cons: ConsAddress, height: u64) -> Equivocation {
        Equivocation {
            height,
            time: create_test_header(height).time,
            power: 1_000,
            consensus_address: cons,
        }
    }

    #[test]
    fn test_equivocation_slashes_once() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(10), ExecMode::BeginBlock);
        let keeper = create_test_evidence();
        let staking = keeper.slashing.staking().clone();
        let val = create_bonded_validator(&staking, &mut ctx, 1, 1_000_000);
        let cons = staking.validator(&mut ctx, &val).unwrap().cons_address();

        let evidence = create_test_equivocation(cons, 8);
        assert!(keeper.handle_equivocation(&mut ctx, &evidence).unwrap());
        assert_eq!(staking.validator(&mut ctx, &val).unwrap().tokens, Int::new(950_000));
        assert!(keeper.get_evidence(&mut ctx, &evidence.hash().unwrap()).unwrap().is_some());

        // replay and a second distinct equivocation against the tombstoned validator
        assert!(!keeper.handle_equivocation(&mut ctx, &evidence).unwrap());
        assert!(!keeper.handle_equivocation(&mut ctx, &create_test_equivocation(cons, 9)).unwrap());
        assert_eq!(staking.validator(&mut ctx, &val).unwrap().tokens, Int::new(950_000));
        assert_eq!(keeper.all_evidence(&mut ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_expired_evidence_needs_both_limits() {
        let mut store = create_test_store();
        let keeper = create_test_evidence();
        let start = create_test_header(1).time;
        // 200_000 blocks later but only one hour later: still admissible
        let header = BlockHeader {
            time: start.add(Duration::from_secs(3_600)),
            ..create_test_header(200_001)
        };
        let mut ctx = Context::new(&mut store, header, ExecMode::BeginBlock);
        let staking = keeper.slashing.staking().clone();
        let val = create_bonded_validator(&staking, &mut ctx, 1, 1_000_000);
        let cons = staking.validator(&mut ctx, &val).unwrap().cons_address();
        let recent_enough = Equivocation {
            time: start,
            ..create_test_equivocation(cons, 1)
        };
        assert!(keeper.handle_equivocation(&mut ctx, &recent_enough).unwrap());

        let mut store = create_test_store();
        let header = BlockHeader {
            time: start.add(Duration::from_secs(49 * 3_600)),
            ..create_test_header(200_001)
        };
        let mut ctx = Context::new(&mut store, header, ExecMode::BeginBlock);
        let val = create_bonded_validator(&staking, &mut ctx, 1, 1_000_000);
        let cons = staking.validator(&mut ctx, &val).unwrap().cons_address();
        let expired = Equivocation {
            time: start,
            ..create_test_equivocation(cons, 1)
        };
        assert!(!keeper.handle_equivocation(&mut ctx, &expired).unwrap());
        assert!(!staking.validator(&mut ctx, &val).unwrap().jailed);
    }

    #[test]
    fn test_begin_block_reads_host_evidence() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(10), ExecMode::BeginBlock);
        let keeper = create_test_evidence();
        let staking = keeper.slashing.staking().clone();
        let val = create_bonded_validator(&staking, &mut ctx, 1, 1_000_000);
        let cons = staking.validator(&mut ctx, &val).unwrap().cons_address();
        let unknown = ConsAddress::new([7u8; 20]);

        let misbehavior = |address| Misbehavior {
            kind: MisbehaviorType::DuplicateVote,
            validator: VoteValidator { address, power: 1_000 },
            height: 9,
            time: create_test_header(9).time,
            total_voting_power: 1_000,
        };
        let req = RequestBeginBlock {
            header: crate::abci::Header {
                chain_id: "nmx-test".to_string(),
                height: 10,
                time: create_test_header(10).time,
                proposer_address: ConsAddress::new([0u8; 20]),
            },
            last_commit_info: LastCommitInfo::default(),
            byzantine_validators: vec![misbehavior(unknown), misbehavior(cons)],
        };
        abci::record_block_evidence(&mut ctx, &req).unwrap();
        keeper.begin_block(&mut ctx).unwrap();
        assert!(staking.validator(&mut ctx, &val).unwrap().jailed);
        assert_eq!(keeper.all_evidence(&mut ctx).unwrap().len(), 1);
    }
}
