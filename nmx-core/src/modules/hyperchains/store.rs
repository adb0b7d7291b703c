// src/modules/hyperchains/store.rs

//! Key layout of the hyperchains subtree.

use super::types::{Chain, ChainDeployment, ChainMetrics};
use crate::context::Context;
use crate::errors::Result;
use crate::modules::proposals::ProposalBook;
use crate::store::{id_key, names};

pub(crate) const CHAIN: u8 = 0x01;
pub(crate) const DEPLOYMENT: u8 = 0x04;
pub(crate) const PROPOSAL: u8 = 0x06;
pub(crate) const METRICS: u8 = 0x07;
pub(crate) const VOTE: u8 = 0x08;
pub(crate) const SEQUENCE: u8 = 0x09;
pub(crate) const PROPOSAL_QUEUE: u8 = 0x0A;

pub(crate) const PROPOSALS: ProposalBook = ProposalBook {
    store: names::HYPERCHAINS,
    proposals: PROPOSAL,
    votes: VOTE,
    sequence: SEQUENCE,
    queue: PROPOSAL_QUEUE,
};

pub(crate) fn get_chain(ctx: &mut Context<'_>, id: &str) -> Result<Option<Chain>> {
    ctx.kv(names::HYPERCHAINS).get(&id_key(CHAIN, id))
}

pub(crate) fn set_chain(ctx: &mut Context<'_>, chain: &Chain) -> Result<()> {
    ctx.kv(names::HYPERCHAINS).set(&id_key(CHAIN, &chain.id), chain)
}

pub(crate) fn all_chains(ctx: &mut Context<'_>) -> Result<Vec<Chain>> {
    let mut chains: Vec<Chain> = ctx.kv(names::HYPERCHAINS).values(&[CHAIN])?;
    chains.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(chains)
}

pub(crate) fn get_deployment(ctx: &mut Context<'_>, id: &str) -> Result<Option<ChainDeployment>> {
    ctx.kv(names::HYPERCHAINS).get(&id_key(DEPLOYMENT, id))
}

pub(crate) fn set_deployment(ctx: &mut Context<'_>, deployment: &ChainDeployment) -> Result<()> {
    ctx.kv(names::HYPERCHAINS)
        .set(&id_key(DEPLOYMENT, &deployment.id), deployment)
}

pub(crate) fn all_deployments(ctx: &mut Context<'_>) -> Result<Vec<ChainDeployment>> {
    let mut deployments: Vec<ChainDeployment> = ctx.kv(names::HYPERCHAINS).values(&[DEPLOYMENT])?;
    deployments.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(deployments)
}

pub(crate) fn get_metrics(ctx: &mut Context<'_>, chain_id: &str) -> Result<Option<ChainMetrics>> {
    ctx.kv(names::HYPERCHAINS).get(&id_key(METRICS, chain_id))
}

pub(crate) fn set_metrics(ctx: &mut Context<'_>, metrics: &ChainMetrics) -> Result<()> {
    ctx.kv(names::HYPERCHAINS)
        .set(&id_key(METRICS, &metrics.chain_id), metrics)
}

pub(crate) fn all_metrics(ctx: &mut Context<'_>) -> Result<Vec<ChainMetrics>> {
    let mut metrics: Vec<ChainMetrics> = ctx.kv(names::HYPERCHAINS).values(&[METRICS])?;
    metrics.sort_by(|a, b| a.chain_id.cmp(&b.chain_id));
    Ok(metrics)
}
