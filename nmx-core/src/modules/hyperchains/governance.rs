// src/modules/hyperchains/governance.rs

//! Chain proposals. Only upgrades change the chain: a passed upgrade bumps
//! its version and leaves it `upgrading`.

use super::keeper::HyperChainsKeeper;
use super::msgs::{MsgSubmitChainProposal, MsgVoteChainProposal};
use super::store;
use super::types::{ChainProposal, ChainStatus, ProposalType};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::Int;
use crate::modules::proposals::{cast_vote, ProposalStatus, Voting};
use tracing::{info, warn};

impl HyperChainsKeeper {
    /// Executes [`MsgSubmitChainProposal`]
    ///
    /// # Returns
    /// Id of the new proposal
    pub fn submit_proposal(&self, ctx: &mut Context<'_>, msg: &MsgSubmitChainProposal) -> Result<u64> {
        let chain = self.chain(ctx, &msg.chain_id)?;
        if chain.status != ChainStatus::Active {
            return Err(NmxError::InvalidState(format!(
                "chain {} is {}, proposals need an active chain",
                chain.id, chain.status
            )));
        }
        let period = self.params(ctx)?.voting_period;
        let id = store::PROPOSALS.allocate_id(ctx)?;
        let proposal = ChainProposal {
            id,
            chain_id: chain.id.clone(),
            title: msg.title.clone(),
            description: msg.description.clone(),
            proposer: msg.proposer,
            proposal_type: msg.proposal_type,
            content: msg.content.clone(),
            voting: Voting::open(ctx.block_time(), period),
        };
        store::PROPOSALS.set(ctx, id, &proposal)?;
        ctx.emit(
            Event::new(types::CHAIN_PROPOSAL)
                .attr("proposal_id", id)
                .attr("chain_id", &chain.id)
                .attr("proposal_type", msg.proposal_type)
                .attr("status", proposal.voting.status),
        );
        Ok(id)
    }

    /// Executes [`MsgVoteChainProposal`]
    ///
    /// # Returns
    /// Voting power applied
    pub fn vote(&self, ctx: &mut Context<'_>, msg: &MsgVoteChainProposal) -> Result<Int> {
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
    pub fn process_proposals(&self, ctx: &mut Context<'_>) -> Result<()> {
        let now = ctx.block_time();
        for mut proposal in store::PROPOSALS.due::<ChainProposal>(ctx, now)? {
            let status = proposal.voting.tally();
            if status == ProposalStatus::Passed && proposal.proposal_type == ProposalType::Upgrade {
                match store::get_chain(ctx, &proposal.chain_id)? {
                    Some(mut chain) => {
                        chain.version = chain
                            .version
                            .checked_add(1)
                            .ok_or_else(|| NmxError::Overflow(format!("version of chain {}", chain.id)))?;
                        chain.status = ChainStatus::Upgrading;
                        chain.updated_at = now;
                        store::set_chain(ctx, &chain)?;
                        info!("chain {} upgrading to version {}", chain.id, chain.version);
                    }
                    None => warn!(
                        "chain proposal {} passed for missing chain {}",
                        proposal.id, proposal.chain_id
                    ),
                }
            }
            store::PROPOSALS.set(ctx, proposal.id, &proposal)?;
            ctx.emit(
                Event::new(types::CHAIN_PROPOSAL)
                    .attr("proposal_id", proposal.id)
                    .attr("chain_id", &proposal.chain_id)
                    .attr("proposal_type", proposal.proposal_type)
                    .attr("status", status)
                    .attr("votes_yes", proposal.voting.votes_yes)
                    .attr("votes_no", proposal.voting.votes_no),
            );
        }
        Ok(())
    }
}
