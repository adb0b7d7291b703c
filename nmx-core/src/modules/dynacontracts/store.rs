// src/modules/dynacontracts/store.rs

//! Key layout of the dynacontracts subtree.

use super::types::{Contract, ContractCode, ContractExecution, ContractParameter};
use crate::context::Context;
use crate::errors::Result;
use crate::modules::proposals::ProposalBook;
use crate::store::{id_key, names, push_length_prefixed};

pub(crate) const CONTRACT: u8 = 0x01;
pub(crate) const CODE: u8 = 0x02;
pub(crate) const PARAMETER: u8 = 0x05;
pub(crate) const PROPOSAL: u8 = 0x07;
pub(crate) const EXECUTION: u8 = 0x08;
pub(crate) const VOTE: u8 = 0x0A;
pub(crate) const SEQUENCE: u8 = 0x0B;
pub(crate) const PROPOSAL_QUEUE: u8 = 0x0C;

pub(crate) const PROPOSALS: ProposalBook = ProposalBook {
    store: names::DYNACONTRACTS,
    proposals: PROPOSAL,
    votes: VOTE,
    sequence: SEQUENCE,
    queue: PROPOSAL_QUEUE,
};

fn code_key(contract_id: &str, version: u64) -> Vec<u8> {
    let mut key = id_key(CODE, contract_id);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

fn parameter_key(contract_id: &str, name: &str) -> Vec<u8> {
    let mut key = id_key(PARAMETER, contract_id);
    push_length_prefixed(&mut key, name.as_bytes());
    key
}

pub(crate) fn get_contract(ctx: &mut Context<'_>, id: &str) -> Result<Option<Contract>> {
    ctx.kv(names::DYNACONTRACTS).get(&id_key(CONTRACT, id))
}

pub(crate) fn set_contract(ctx: &mut Context<'_>, contract: &Contract) -> Result<()> {
    ctx.kv(names::DYNACONTRACTS).set(&id_key(CONTRACT, &contract.id), contract)
}

pub(crate) fn all_contracts(ctx: &mut Context<'_>) -> Result<Vec<Contract>> {
    let mut contracts: Vec<Contract> = ctx.kv(names::DYNACONTRACTS).values(&[CONTRACT])?;
    contracts.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(contracts)
}

pub(crate) fn get_code(ctx: &mut Context<'_>, contract_id: &str, version: u64) -> Result<Option<ContractCode>> {
    ctx.kv(names::DYNACONTRACTS).get(&code_key(contract_id, version))
}

pub(crate) fn set_code(ctx: &mut Context<'_>, code: &ContractCode) -> Result<()> {
    ctx.kv(names::DYNACONTRACTS)
        .set(&code_key(&code.contract_id, code.version), code)
}

/// Every stored version of every contract, by contract then version
pub(crate) fn all_code(ctx: &mut Context<'_>) -> Result<Vec<ContractCode>> {
    let mut code: Vec<ContractCode> = ctx.kv(names::DYNACONTRACTS).values(&[CODE])?;
    code.sort_by(|a, b| (a.contract_id.as_str(), a.version).cmp(&(b.contract_id.as_str(), b.version)));
    Ok(code)
}

pub(crate) fn get_parameter(ctx: &mut Context<'_>, contract_id: &str, name: &str) -> Result<Option<ContractParameter>> {
    ctx.kv(names::DYNACONTRACTS).get(&parameter_key(contract_id, name))
}

pub(crate) fn set_parameter(ctx: &mut Context<'_>, param: &ContractParameter) -> Result<()> {
    ctx.kv(names::DYNACONTRACTS)
        .set(&parameter_key(&param.contract_id, &param.name), param)
}

/// Parameters of one contract by name
pub(crate) fn contract_parameters(ctx: &mut Context<'_>, contract_id: &str) -> Result<Vec<ContractParameter>> {
    let mut params: Vec<ContractParameter> = ctx
        .kv(names::DYNACONTRACTS)
        .values(&id_key(PARAMETER, contract_id))?;
    params.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(params)
}

pub(crate) fn all_parameters(ctx: &mut Context<'_>) -> Result<Vec<ContractParameter>> {
    let mut params: Vec<ContractParameter> = ctx.kv(names::DYNACONTRACTS).values(&[PARAMETER])?;
    params.sort_by(|a, b| (a.contract_id.as_str(), a.name.as_str()).cmp(&(b.contract_id.as_str(), b.name.as_str())));
    Ok(params)
}

pub(crate) fn get_execution(ctx: &mut Context<'_>, id: &str) -> Result<Option<ContractExecution>> {
    ctx.kv(names::DYNACONTRACTS).get(&id_key(EXECUTION, id))
}

pub(crate) fn set_execution(ctx: &mut Context<'_>, execution: &ContractExecution) -> Result<()> {
    ctx.kv(names::DYNACONTRACTS)
        .set(&id_key(EXECUTION, &execution.id), execution)
}

pub(crate) fn all_executions(ctx: &mut Context<'_>) -> Result<Vec<ContractExecution>> {
    let mut executions: Vec<ContractExecution> = ctx.kv(names::DYNACONTRACTS).values(&[EXECUTION])?;
    executions.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(executions)
}
