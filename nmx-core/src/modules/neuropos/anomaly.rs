// src/modules/neuropos/anomaly.rs

//! Anomaly reports.
//!
//! A bonded validator reports another one. Reports wait in a height-keyed
//! queue and are acted on in the next BeginBlock; a report at or above
//! [`anomaly_slash_threshold`] costs the subject reputation and a 1% slash,
//! once per subject and report height.
//! This is the only path from network output to economic state.

use super::keeper::NeuroPoSKeeper;
use super::msgs::MsgReportAnomaly;
use super::reputation::{apply_change, REASON_ANOMALY};
use super::store;
use super::types::{anomaly_slash_threshold, AnomalyReport};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::Dec;
use crate::modules::staking::SlashReason;
use nmx_crypto::ValAddress;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Reputation lost on a confirmed anomaly
pub fn anomaly_penalty() -> Dec {
    Dec::percent(5)
}

/// Stake slashed on a confirmed anomaly
pub fn anomaly_slash_fraction() -> Dec {
    Dec::percent(1)
}

impl NeuroPoSKeeper {
    /// Executes [`MsgReportAnomaly`]
    ///
    /// # Returns
    /// Id of the stored report
    pub fn report_anomaly(&self, ctx: &mut Context<'_>, msg: &MsgReportAnomaly) -> Result<u64> {
        let reporter = self.staking.validator(ctx, &msg.reporter)?;
        if !reporter.is_bonded() {
            return Err(NmxError::ValidatorNotBonded(format!(
                "reporter {} is not bonded",
                msg.reporter
            )));
        }
        self.staking.validator(ctx, &msg.validator_address)?;

        let id = store::next_anomaly_id(ctx)?;
        let report = AnomalyReport {
            id,
            reporter: msg.reporter,
            validator: msg.validator_address,
            height: ctx.height(),
            anomaly_type: msg.anomaly_type.clone(),
            confidence: msg.confidence,
            description: msg.description.clone(),
            evidence: msg.evidence.clone(),
            timestamp: ctx.block_time(),
            processed: false,
        };
        store::set_anomaly_report(ctx, &report)?;
        ctx.emit(
            Event::new(types::ANOMALY)
                .attr("report_id", id)
                .attr("reporter", msg.reporter)
                .attr("validator", msg.validator_address)
                .attr("anomaly_type", &msg.anomaly_type)
                .attr("confidence", msg.confidence),
        );
        Ok(id)
    }

    /// Acts on reports submitted in earlier blocks
    ///
    /// A subject is penalised at most once per report height, however
    /// many reports name it.
    pub fn process_anomaly_reports(&self, ctx: &mut Context<'_>) -> Result<()> {
        let height = ctx.height();
        let mut penalised: BTreeSet<(ValAddress, u64)> = BTreeSet::new();
        for id in store::due_anomaly_ids(ctx, height)? {
            let Some(mut report) = store::get_anomaly_report(ctx, id)? else {
                return Err(NmxError::StoreError(format!("queued anomaly report {} is missing", id)));
            };
            report.processed = true;
            store::set_anomaly_report(ctx, &report)?;
            if report.confidence < anomaly_slash_threshold() {
                continue;
            }
            if !penalised.insert((report.validator, report.height)) {
                debug!(
                    "anomaly report {} repeats a penalised infraction of {} at height {}",
                    report.id, report.validator, report.height
                );
                ctx.emit(
                    Event::new(types::ANOMALY)
                        .attr("report_id", report.id)
                        .attr("validator", report.validator)
                        .attr("action", "duplicate"),
                );
                continue;
            }
            let Some(validator) = self.staking.get_validator(ctx, &report.validator)? else {
                warn!("anomaly report {} names unknown validator {}", report.id, report.validator);
                continue;
            };
            apply_change(ctx, &report.validator, -anomaly_penalty(), REASON_ANOMALY, true)?;
            let burned = self.staking.slash(
                ctx,
                &validator.cons_address(),
                report.height,
                validator.consensus_power(),
                anomaly_slash_fraction(),
                SlashReason::Anomaly,
            )?;
            ctx.emit(
                Event::new(types::ANOMALY)
                    .attr("report_id", report.id)
                    .attr("validator", report.validator)
                    .attr("action", "slashed")
                    .attr("burned", burned),
            );
            info!(
                "anomaly report {} ({}, confidence {}) slashed validator {}",
                report.id, report.anomaly_type, report.confidence, report.validator
            );
        }
        Ok(())
    }

    /// Every anomaly report in id order
    pub fn anomaly_reports(&self, ctx: &mut Context<'_>) -> Result<Vec<AnomalyReport>> {
        store::all_anomaly_reports(ctx)
    }
}
