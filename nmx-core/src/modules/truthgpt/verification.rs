// src/modules/truthgpt/verification.rs

//! Misinformation reports and verification tasks.
//!
//! A report stores the record and raises a task `task-<record id>`.
//! EndBlock settles every pending task; a task linked to a record marks
//! the record verified by the default model.

use super::keeper::TruthGptKeeper;
use super::msgs::{MsgCreateVerificationTask, MsgReportMisinformation};
use super::store;
use super::types::{
    reported_confidence, verification_confidence, Misinformation, MisinformationStatus, TaskStatus, VerificationTask,
    VERIFICATION_RESULT,
};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use tracing::debug;

/// Task id raised by a misinformation report
pub fn misinformation_task_id(misinformation_id: &str) -> String {
    format!("task-{}", misinformation_id)
}

impl TruthGptKeeper {
    /// Executes [`MsgReportMisinformation`]
    ///
    /// # Returns
    /// Id of the stored record
    pub fn report_misinformation(&self, ctx: &mut Context<'_>, msg: &MsgReportMisinformation) -> Result<String> {
        let id = ctx.derive_id("misinfo");
        if store::get_misinformation(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("misinformation {}", id)));
        }
        let now = ctx.block_time();
        let record = Misinformation {
            id: id.clone(),
            content: msg.content.clone(),
            source: msg.source.clone(),
            reporter: msg.reporter,
            confidence: reported_confidence(),
            evidence: msg.evidence.clone(),
            created_at: now,
            status: MisinformationStatus::Pending,
            verified_by: Vec::new(),
        };
        store::set_misinformation(ctx, &record)?;

        let task = VerificationTask {
            id: misinformation_task_id(&id),
            content: msg.content.clone(),
            source: msg.source.clone(),
            creator: msg.reporter,
            status: TaskStatus::Pending,
            priority: 0,
            misinformation_id: Some(id.clone()),
            created_at: now,
            completed_at: None,
            result: Vec::new(),
        };
        store::set_task(ctx, &task)?;
        ctx.emit(
            Event::new(types::MISINFORMATION)
                .attr("misinformation_id", &id)
                .attr("reporter", msg.reporter)
                .attr("task_id", &task.id),
        );
        Ok(id)
    }

    /// Executes [`MsgCreateVerificationTask`]
    ///
    /// # Returns
    /// Id of the new task
    pub fn create_verification_task(&self, ctx: &mut Context<'_>, msg: &MsgCreateVerificationTask) -> Result<String> {
        let id = ctx.derive_id("task");
        if store::get_task(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("verification task {}", id)));
        }
        let task = VerificationTask {
            id: id.clone(),
            content: msg.content.clone(),
            source: msg.source.clone(),
            creator: msg.creator,
            status: TaskStatus::Pending,
            priority: msg.priority,
            misinformation_id: None,
            created_at: ctx.block_time(),
            completed_at: None,
            result: Vec::new(),
        };
        store::set_task(ctx, &task)?;
        ctx.emit(
            Event::new(types::VERIFICATION_TASK)
                .attr("task_id", &id)
                .attr("creator", msg.creator)
                .attr("status", "pending"),
        );
        Ok(id)
    }

    /// Settles every pending task
    ///
    /// # Returns
    /// Number of tasks completed
    pub fn process_verification_tasks(&self, ctx: &mut Context<'_>) -> Result<usize> {
        let model_id = self.params(ctx)?.default_model_id;
        let now = ctx.block_time();
        let mut completed = 0;
        for mut task in store::pending_tasks(ctx)? {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
            task.result = VERIFICATION_RESULT.to_vec();
            store::set_task(ctx, &task)?;

            if let Some(record_id) = &task.misinformation_id {
                if let Some(mut record) = store::get_misinformation(ctx, record_id)? {
                    record.status = MisinformationStatus::Verified;
                    record.confidence = verification_confidence();
                    if !record.verified_by.contains(&model_id) {
                        record.verified_by.push(model_id.clone());
                    }
                    store::set_misinformation(ctx, &record)?;
                }
            }
            ctx.emit(
                Event::new(types::VERIFICATION_TASK)
                    .attr("task_id", &task.id)
                    .attr("status", "completed"),
            );
            completed += 1;
        }
        if completed > 0 {
            debug!("completed {} verification tasks", completed);
        }
        Ok(completed)
    }
}
