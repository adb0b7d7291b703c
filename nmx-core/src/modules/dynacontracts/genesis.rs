// src/modules/dynacontracts/genesis.rs

//! DynaContracts genesis import and export.

use super::keeper::DynaContractsKeeper;
use super::params::DynaContractsParams;
use super::store;
use super::types::{checksum, Contract, ContractCode, ContractExecution, ContractParameter, ContractProposal};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::params::{ParamSet, ParamsKeeper};
use crate::modules::proposals::Vote;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// DynaContracts genesis section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynaContractsGenesis {
    /// Parameters
    #[serde(default)]
    pub params: DynaContractsParams,
    /// Contracts
    #[serde(default)]
    pub contracts: Vec<Contract>,
    /// Every stored code version
    #[serde(default)]
    pub code: Vec<ContractCode>,
    /// Contract parameters
    #[serde(default)]
    pub parameters: Vec<ContractParameter>,
    /// Proposals in every state
    #[serde(default)]
    pub proposals: Vec<ContractProposal>,
    /// Votes cast
    #[serde(default)]
    pub votes: Vec<Vote>,
    /// Id the next proposal gets
    #[serde(default = "first_proposal_id")]
    pub next_proposal_id: u64,
    /// Execution records
    #[serde(default)]
    pub executions: Vec<ContractExecution>,
}

fn first_proposal_id() -> u64 {
    1
}

impl Default for DynaContractsGenesis {
    fn default() -> Self {
        Self {
            params: DynaContractsParams::default(),
            contracts: Vec::new(),
            code: Vec::new(),
            parameters: Vec::new(),
            proposals: Vec::new(),
            votes: Vec::new(),
            next_proposal_id: first_proposal_id(),
            executions: Vec::new(),
        }
    }
}

/// Stateless checks of the DynaContracts section
pub fn validate_genesis(genesis: &DynaContractsGenesis) -> Result<()> {
    genesis.params.validate()?;
    let mut contracts = BTreeSet::new();
    for contract in &genesis.contracts {
        if contract.id.is_empty() || !contracts.insert(contract.id.as_str()) {
            return Err(NmxError::InvalidState(format!("duplicate or empty contract id {:?}", contract.id)));
        }
        if contract.version == 0 {
            return Err(NmxError::InvalidState(format!("contract {} at version 0", contract.id)));
        }
    }
    for code in &genesis.code {
        if !contracts.contains(code.contract_id.as_str()) {
            return Err(NmxError::InvalidState(format!("code of unknown contract {}", code.contract_id)));
        }
        if code.checksum != checksum(&code.code) {
            return Err(NmxError::InvalidState(format!(
                "checksum mismatch for contract {} version {}",
                code.contract_id, code.version
            )));
        }
    }
    for param in &genesis.parameters {
        if !contracts.contains(param.contract_id.as_str()) {
            return Err(NmxError::InvalidState(format!(
                "parameter {} of unknown contract {}",
                param.name, param.contract_id
            )));
        }
    }
    let mut proposals = BTreeSet::new();
    for proposal in &genesis.proposals {
        if proposal.id == 0 || proposal.id >= genesis.next_proposal_id || !proposals.insert(proposal.id) {
            return Err(NmxError::InvalidState(format!(
                "contract proposal id {} is duplicate or outside [1, {})",
                proposal.id, genesis.next_proposal_id
            )));
        }
    }
    for vote in &genesis.votes {
        if !proposals.contains(&vote.proposal_id) {
            return Err(NmxError::InvalidState(format!(
                "vote on unknown contract proposal {}",
                vote.proposal_id
            )));
        }
    }
    Ok(())
}

impl DynaContractsKeeper {
    /// Writes the DynaContracts genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &DynaContractsGenesis) -> Result<()> {
        ParamsKeeper.set(ctx, &genesis.params)?;
        for contract in &genesis.contracts {
            store::set_contract(ctx, contract)?;
        }
        for code in &genesis.code {
            store::set_code(ctx, code)?;
        }
        for param in &genesis.parameters {
            store::set_parameter(ctx, param)?;
        }
        for proposal in &genesis.proposals {
            store::PROPOSALS.set(ctx, proposal.id, proposal)?;
        }
        for vote in &genesis.votes {
            store::PROPOSALS.set_vote(ctx, vote)?;
        }
        store::PROPOSALS.set_next_id(ctx, genesis.next_proposal_id)?;
        for execution in &genesis.executions {
            store::set_execution(ctx, execution)?;
        }
        Ok(())
    }

    /// Reads the DynaContracts genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<DynaContractsGenesis> {
        Ok(DynaContractsGenesis {
            params: self.params(ctx)?,
            contracts: store::all_contracts(ctx)?,
            code: store::all_code(ctx)?,
            parameters: store::all_parameters(ctx)?,
            proposals: store::PROPOSALS.all(ctx)?,
            votes: store::PROPOSALS.all_votes(ctx)?,
            next_proposal_id: store::PROPOSALS.next_id(ctx)?,
            executions: store::all_executions(ctx)?,
        })
    }
}
