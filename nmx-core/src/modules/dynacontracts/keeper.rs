// src/modules/dynacontracts/keeper.rs

//! DynaContracts keeper: contracts, code versions, parameters and
//! execution records.

use super::msgs::{MsgCreateContract, MsgExecuteContract, MsgSetContractParameter, MsgUpdateContract};
use super::params::DynaContractsParams;
use super::store;
use super::types::{
    Contract, ContractCode, ContractExecution, ContractParameter, ContractProposal, ContractStatus, EXECUTION_RESULT,
};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::modules::params::ParamsKeeper;
use crate::modules::proposals::Vote;
use crate::modules::staking::StakingKeeper;
use nmx_crypto::AccAddress;
use tracing::info;

/// DynaContracts keeper
///
/// The staking keeper supplies voting power for proposals.
#[derive(Debug, Clone)]
pub struct DynaContractsKeeper {
    pub(crate) staking: StakingKeeper,
}

fn require_owner(contract: &Contract, signer: &AccAddress) -> Result<()> {
    if contract.owner != *signer {
        return Err(NmxError::Unauthorized(format!(
            "{} does not own contract {}",
            signer, contract.id
        )));
    }
    Ok(())
}

impl DynaContractsKeeper {
    /// Creates a keeper over the staking keeper
    pub fn new(staking: StakingKeeper) -> Self {
        Self { staking }
    }

    /// Staking keeper
    pub fn staking(&self) -> &StakingKeeper {
        &self.staking
    }

    /// Current parameters
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<DynaContractsParams> {
        ParamsKeeper.get(ctx)
    }

    /// Contract by id
    pub fn contract(&self, ctx: &mut Context<'_>, id: &str) -> Result<Contract> {
        store::get_contract(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("contract {}", id)))
    }

    /// Every contract by id
    pub fn contracts(&self, ctx: &mut Context<'_>) -> Result<Vec<Contract>> {
        store::all_contracts(ctx)
    }

    /// Code of one version; the current one when `version` is `None`
    pub fn code(&self, ctx: &mut Context<'_>, contract_id: &str, version: Option<u64>) -> Result<ContractCode> {
        let version = match version {
            Some(v) => v,
            None => self.contract(ctx, contract_id)?.version,
        };
        store::get_code(ctx, contract_id, version)?
            .ok_or_else(|| NmxError::NotFound(format!("code of contract {} version {}", contract_id, version)))
    }

    /// Parameters of one contract
    pub fn parameters(&self, ctx: &mut Context<'_>, contract_id: &str) -> Result<Vec<ContractParameter>> {
        self.contract(ctx, contract_id)?;
        store::contract_parameters(ctx, contract_id)
    }

    /// Execution record by id
    pub fn execution(&self, ctx: &mut Context<'_>, id: &str) -> Result<ContractExecution> {
        store::get_execution(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("execution {}", id)))
    }

    /// Proposal by id
    pub fn proposal(&self, ctx: &mut Context<'_>, id: u64) -> Result<ContractProposal> {
        store::PROPOSALS
            .get(ctx, id)?
            .ok_or_else(|| NmxError::NotFound(format!("contract proposal {}", id)))
    }

    /// Every proposal by id
    pub fn proposals(&self, ctx: &mut Context<'_>) -> Result<Vec<ContractProposal>> {
        store::PROPOSALS.all(ctx)
    }

    /// Votes cast on one proposal
    pub fn votes(&self, ctx: &mut Context<'_>, proposal_id: u64) -> Result<Vec<Vote>> {
        store::PROPOSALS.votes(ctx, proposal_id)
    }

    fn check_code_size(&self, ctx: &mut Context<'_>, code: &[u8]) -> Result<()> {
        let max = self.params(ctx)?.max_code_size;
        if code.len() as u64 > max {
            return Err(NmxError::InvalidMessage(format!(
                "code of {} bytes exceeds {} bytes",
                code.len(),
                max
            )));
        }
        Ok(())
    }

    /// Executes [`MsgCreateContract`]
    ///
    /// # Returns
    /// Id of the new contract
    pub fn create_contract(&self, ctx: &mut Context<'_>, msg: &MsgCreateContract) -> Result<String> {
        self.check_code_size(ctx, &msg.code)?;
        let id = ctx.derive_id("contract");
        if store::get_contract(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("contract {}", id)));
        }
        let now = ctx.block_time();
        let contract = Contract {
            id: id.clone(),
            name: msg.name.clone(),
            description: msg.description.clone(),
            creator: msg.creator,
            owner: msg.creator,
            language: msg.language,
            version: 1,
            status: ContractStatus::Active,
            created_at: now,
            updated_at: now,
            ai_enabled: msg.ai_enabled,
            ai_model_id: msg.ai_model_id.clone(),
            data_source_ids: msg.data_source_ids.clone(),
            governance_enabled: msg.governance_enabled,
        };
        let code = ContractCode::new(&id, 1, msg.code.clone(), msg.metadata.clone());
        store::set_contract(ctx, &contract)?;
        store::set_code(ctx, &code)?;
        ctx.emit(
            Event::new(types::CREATE_CONTRACT)
                .attr("contract_id", &id)
                .attr("creator", msg.creator)
                .attr("checksum", &code.checksum),
        );
        info!("created contract {} by {}", id, msg.creator);
        Ok(id)
    }

    /// Executes [`MsgUpdateContract`]
    ///
    /// # Returns
    /// The new version
    pub fn update_contract(&self, ctx: &mut Context<'_>, msg: &MsgUpdateContract) -> Result<u64> {
        let mut contract = self.contract(ctx, &msg.contract_id)?;
        require_owner(&contract, &msg.owner)?;
        self.check_code_size(ctx, &msg.code)?;
        let version = self.install_code(ctx, &mut contract, msg.code.clone())?;
        if let Some(description) = &msg.description {
            contract.description = description.clone();
        }
        store::set_contract(ctx, &contract)?;
        ctx.emit(
            Event::new(types::UPDATE_CONTRACT)
                .attr("contract_id", &contract.id)
                .attr("version", version),
        );
        Ok(version)
    }

    /// Stores `code` as the next version of `contract`
    ///
    /// The caller persists the contract.
    pub(crate) fn install_code(&self, ctx: &mut Context<'_>, contract: &mut Contract, code: Vec<u8>) -> Result<u64> {
        let version = contract
            .version
            .checked_add(1)
            .ok_or_else(|| NmxError::Overflow(format!("version of contract {}", contract.id)))?;
        store::set_code(ctx, &ContractCode::new(&contract.id, version, code, Vec::new()))?;
        contract.version = version;
        contract.updated_at = ctx.block_time();
        Ok(version)
    }

    /// Executes [`MsgExecuteContract`]
    ///
    /// Only records the call and charges the flat execution gas.
    ///
    /// # Returns
    /// Id of the execution record
    pub fn execute_contract(&self, ctx: &mut Context<'_>, msg: &MsgExecuteContract) -> Result<String> {
        let contract = self.contract(ctx, &msg.contract_id)?;
        if contract.status != ContractStatus::Active {
            return Err(NmxError::InvalidState(format!(
                "contract {} is {}",
                contract.id, contract.status
            )));
        }
        let gas = self.params(ctx)?.execution_gas;
        ctx.gas_meter_mut().consume(gas, "contract execution")?;

        let id = ctx.derive_id("exec");
        let execution = ContractExecution {
            id: id.clone(),
            contract_id: contract.id.clone(),
            caller: msg.caller,
            method: msg.method.clone(),
            params: msg.params.clone(),
            result: EXECUTION_RESULT.to_vec(),
            gas_used: gas,
            timestamp: ctx.block_time(),
            success: true,
            error: String::new(),
        };
        store::set_execution(ctx, &execution)?;
        ctx.emit(
            Event::new(types::EXECUTE_CONTRACT)
                .attr("contract_id", &contract.id)
                .attr("execution_id", &id)
                .attr("method", &msg.method)
                .attr("caller", msg.caller),
        );
        Ok(id)
    }

    /// Executes [`MsgSetContractParameter`]
    ///
    /// A parameter already under AI control cannot be set by the owner.
    pub fn set_contract_parameter(&self, ctx: &mut Context<'_>, msg: &MsgSetContractParameter) -> Result<()> {
        let contract = self.contract(ctx, &msg.contract_id)?;
        require_owner(&contract, &msg.owner)?;
        if let Some(existing) = store::get_parameter(ctx, &contract.id, &msg.name)? {
            if existing.ai_controlled {
                return Err(NmxError::Unauthorized(format!(
                    "parameter {} of contract {} is AI-controlled",
                    msg.name, contract.id
                )));
            }
        }
        if msg.ai_controlled && !contract.ai_enabled {
            return Err(NmxError::InvalidState(format!(
                "contract {} has no AI model",
                contract.id
            )));
        }
        let param = ContractParameter {
            contract_id: contract.id.clone(),
            name: msg.name.clone(),
            param_type: msg.param_type.clone(),
            value: msg.value.clone(),
            min_value: msg.min_value.clone(),
            max_value: msg.max_value.clone(),
            description: msg.description.clone(),
            ai_controlled: msg.ai_controlled,
            updated_at: ctx.block_time(),
        };
        store::set_parameter(ctx, &param)?;
        ctx.emit(
            Event::new(types::CONTRACT_PARAMETER)
                .attr("contract_id", &contract.id)
                .attr("name", &msg.name)
                .attr("value", &msg.value),
        );
        Ok(())
    }

    /// Refreshes the AI-controlled parameters of AI-enabled contracts
    ///
    /// # Returns
    /// Number of parameters touched
    pub fn refresh_ai_parameters(&self, ctx: &mut Context<'_>) -> Result<usize> {
        let now = ctx.block_time();
        let mut touched = 0;
        for contract in store::all_contracts(ctx)? {
            if !contract.ai_enabled || contract.ai_model_id.is_none() || contract.status != ContractStatus::Active {
                continue;
            }
            for mut param in store::contract_parameters(ctx, &contract.id)? {
                if param.ai_controlled {
                    param.updated_at = now;
                    store::set_parameter(ctx, &param)?;
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }
}
