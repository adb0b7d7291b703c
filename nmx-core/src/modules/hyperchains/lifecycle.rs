// src/modules/hyperchains/lifecycle.rs

//! Per-block deployment progress and simulated chain metrics.

use super::keeper::HyperChainsKeeper;
use super::store;
use super::types::{ChainMetrics, ChainStatus, DeploymentStatus};
use crate::context::Context;
use crate::errors::Result;
use crate::events::{types, Event};
use crate::math::Dec;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Endpoint kinds published by a completed deployment
const ENDPOINT_KINDS: [&str; 3] = ["explorer", "rest", "rpc"];

impl HyperChainsKeeper {
    /// Moves every open deployment one step
    ///
    /// `pending` becomes `in_progress`, `in_progress` becomes `completed`
    /// and activates the chain. A deployment touched in this block waits
    /// for the next one.
    ///
    /// # Returns
    /// Number of deployments advanced
    pub fn advance_deployments(&self, ctx: &mut Context<'_>) -> Result<usize> {
        let height = ctx.height();
        let now = ctx.block_time();
        let domain = self.params(ctx)?.endpoint_domain;
        let mut advanced = 0;
        for mut deployment in store::all_deployments(ctx)? {
            if !deployment.status.is_open() || deployment.updated_height == height {
                continue;
            }
            match deployment.status {
                DeploymentStatus::Pending => {
                    deployment.status = DeploymentStatus::InProgress;
                    deployment.logs = "Deployment started".to_string();
                }
                _ => {
                    deployment.status = DeploymentStatus::Completed;
                    deployment.completed_at = Some(now);
                    deployment.logs = "Deployment completed successfully".to_string();
                    deployment.endpoints = ENDPOINT_KINDS
                        .iter()
                        .map(|kind| {
                            (
                                kind.to_string(),
                                format!("https://{}.{}.{}", kind, deployment.chain_id, domain),
                            )
                        })
                        .collect::<BTreeMap<_, _>>();
                    if let Some(mut chain) = store::get_chain(ctx, &deployment.chain_id)? {
                        chain.status = ChainStatus::Active;
                        chain.updated_at = now;
                        store::set_chain(ctx, &chain)?;
                        info!("chain {} active at version {}", chain.id, deployment.version);
                    }
                }
            }
            deployment.updated_height = height;
            store::set_deployment(ctx, &deployment)?;
            ctx.emit(
                Event::new(types::CHAIN_DEPLOYMENT)
                    .attr("deployment_id", &deployment.id)
                    .attr("chain_id", &deployment.chain_id)
                    .attr("status", deployment.status),
            );
            advanced += 1;
        }
        Ok(advanced)
    }

    /// Refreshes the simulated metrics of every active chain
    ///
    /// Blocks accrue at one per `simulated_block_secs` of block time since
    /// the last refresh; each carries `10 + height % 91` transactions and
    /// the average fee is `(1 + height % 10) / 100`.
    pub fn update_metrics(&self, ctx: &mut Context<'_>) -> Result<()> {
        let height = ctx.height();
        let now = ctx.block_time();
        let block_secs = self.params(ctx)?.simulated_block_secs.max(1);
        for chain in store::all_chains(ctx)? {
            if chain.status != ChainStatus::Active {
                continue;
            }
            let mut metrics = match store::get_metrics(ctx, &chain.id)? {
                Some(metrics) => metrics,
                None => {
                    store::set_metrics(ctx, &ChainMetrics::new(&chain.id, now))?;
                    continue;
                }
            };
            let secs = now.since(metrics.updated_at).as_secs();
            let new_blocks = secs / block_secs;
            if new_blocks == 0 {
                continue;
            }
            let new_tx = new_blocks.saturating_mul(10 + height % 91);
            metrics.block_height = metrics.block_height.saturating_add(new_blocks);
            metrics.total_transactions = metrics.total_transactions.saturating_add(new_tx);
            metrics.tps = Dec::from_ratio(new_tx as i128, secs as i128);
            metrics.average_fee = Dec::from_ratio(1 + (height % 10) as i128, 100);
            metrics.updated_at = now;
            store::set_metrics(ctx, &metrics)?;
            debug!("chain {} metrics at block {}", chain.id, metrics.block_height);
        }
        Ok(())
    }
}
