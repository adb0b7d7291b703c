// src/modules/dynacontracts/governance.rs

//! Contract proposals.
//!
//! A passed proposal installs its code as the next contract version and
//! writes its parameter values; a rejected one leaves the contract alone.

use super::keeper::DynaContractsKeeper;
use super::msgs::{MsgSubmitContractProposal, MsgVoteContractProposal};
use super::store;
use super::types::{ContractParameter, ContractProposal};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::Int;
use crate::modules::proposals::{cast_vote, ProposalStatus, Voting};
use tracing::{info, warn};

impl DynaContractsKeeper {
    /// Executes [`MsgSubmitContractProposal`]
    ///
    /// # Returns
    /// Id of the new proposal
    pub fn submit_proposal(&self, ctx: &mut Context<'_>, msg: &MsgSubmitContractProposal) -> Result<u64> {
        let contract = self.contract(ctx, &msg.contract_id)?;
        let params = self.params(ctx)?;
        if let Some(code) = &msg.new_code {
            if code.len() as u64 > params.max_code_size {
                return Err(NmxError::InvalidMessage(format!(
                    "code of {} bytes exceeds {} bytes",
                    code.len(),
                    params.max_code_size
                )));
            }
        }
        let id = store::PROPOSALS.allocate_id(ctx)?;
        let proposal = ContractProposal {
            id,
            contract_id: contract.id.clone(),
            title: msg.title.clone(),
            description: msg.description.clone(),
            proposer: msg.proposer,
            new_code: msg.new_code.clone(),
            new_params: msg.new_params.clone(),
            voting: Voting::open(ctx.block_time(), params.voting_period),
        };
        store::PROPOSALS.set(ctx, id, &proposal)?;
        ctx.emit(
            Event::new(types::CONTRACT_PROPOSAL)
                .attr("proposal_id", id)
                .attr("contract_id", &contract.id)
                .attr("status", proposal.voting.status)
                .attr("end_time", proposal.voting.end_time.to_rfc3339()),
        );
        Ok(id)
    }

    /// Executes [`MsgVoteContractProposal`]
    ///
    /// # Returns
    /// Voting power applied
    pub fn vote(&self, ctx: &mut Context<'_>, msg: &MsgVoteContractProposal) -> Result<Int> {
        let mut proposal = self.proposal(ctx, msg.proposal_id)?;
        let power = cast_vote(
            &store::PROPOSALS,
            &self.staking,
            ctx,
            proposal.id,
            &mut proposal.voting,
            &msg.voter,
            msg.option,
        )?;
        store::PROPOSALS.set(ctx, proposal.id, &proposal)?;
        Ok(power)
    }

    /// Tallies every proposal whose voting period has ended
    ///
    /// # Returns
    /// Ids of the proposals that passed
    pub fn process_proposals(&self, ctx: &mut Context<'_>) -> Result<Vec<u64>> {
        let now = ctx.block_time();
        let mut passed = Vec::new();
        for mut proposal in store::PROPOSALS.due::<ContractProposal>(ctx, now)? {
            let mut status = proposal.voting.tally();
            if status == ProposalStatus::Passed {
                match store::get_contract(ctx, &proposal.contract_id)? {
                    Some(mut contract) => {
                        if let Some(code) = proposal.new_code.clone() {
                            self.install_code(ctx, &mut contract, code)?;
                        }
                        for (name, value) in &proposal.new_params {
                            let mut param = store::get_parameter(ctx, &contract.id, name)?.unwrap_or_else(|| {
                                ContractParameter {
                                    contract_id: contract.id.clone(),
                                    name: name.clone(),
                                    param_type: String::new(),
                                    value: String::new(),
                                    min_value: None,
                                    max_value: None,
                                    description: String::new(),
                                    ai_controlled: false,
                                    updated_at: now,
                                }
                            });
                            param.value = value.clone();
                            param.updated_at = now;
                            store::set_parameter(ctx, &param)?;
                        }
                        contract.updated_at = now;
                        store::set_contract(ctx, &contract)?;
                        info!(
                            "contract proposal {} passed, contract {} at version {}",
                            proposal.id, contract.id, contract.version
                        );
                        passed.push(proposal.id);
                    }
                    None => {
                        warn!(
                            "contract proposal {} targets missing contract {}",
                            proposal.id, proposal.contract_id
                        );
                        proposal.voting.status = ProposalStatus::Rejected;
                        status = ProposalStatus::Rejected;
                    }
                }
            }
            store::PROPOSALS.set(ctx, proposal.id, &proposal)?;
            ctx.emit(
                Event::new(types::CONTRACT_PROPOSAL)
                    .attr("proposal_id", proposal.id)
                    .attr("contract_id", &proposal.contract_id)
                    .attr("status", status)
                    .attr("votes_yes", proposal.voting.votes_yes)
                    .attr("votes_no", proposal.voting.votes_no),
            );
        }
        Ok(passed)
    }
}
