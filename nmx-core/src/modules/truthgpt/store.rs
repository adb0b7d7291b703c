// src/modules/truthgpt/store.rs

//! Key layout of the truthgpt subtree.

use super::types::{
    AiModel, DataSource, DataSourceRank, Misinformation, OracleQuery, OracleResponse, TaskStatus, VerificationTask,
};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::store::{id_key, names};

pub(crate) const SOURCE: u8 = 0x01;
pub(crate) const QUERY: u8 = 0x02;
pub(crate) const RESPONSE: u8 = 0x03;
pub(crate) const MODEL: u8 = 0x04;
pub(crate) const RANK: u8 = 0x05;
pub(crate) const MISINFORMATION: u8 = 0x06;
pub(crate) const TASK: u8 = 0x07;
pub(crate) const OPEN_QUERY: u8 = 0x08;
pub(crate) const PENDING_TASK: u8 = 0x09;

/// Sorts by id; length-prefixed keys do not iterate in id order
fn by_id<T>(mut items: Vec<T>, id: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| id(a).cmp(id(b)));
    items
}

/// Adds `id` to or drops it from the index `family`
fn mark(ctx: &mut Context<'_>, family: u8, id: &str, member: bool) -> Result<()> {
    let mut store = ctx.kv(names::TRUTHGPT);
    if member {
        store.set(&id_key(family, id), &id.to_string())
    } else {
        store.delete(&id_key(family, id))
    }
}

/// Ids held by the index `family`, sorted
fn marked(ctx: &mut Context<'_>, family: u8) -> Result<Vec<String>> {
    let mut ids: Vec<String> = ctx.kv(names::TRUTHGPT).values(&[family])?;
    ids.sort();
    Ok(ids)
}

pub(crate) fn get_source(ctx: &mut Context<'_>, id: &str) -> Result<Option<DataSource>> {
    ctx.kv(names::TRUTHGPT).get(&id_key(SOURCE, id))
}

pub(crate) fn set_source(ctx: &mut Context<'_>, source: &DataSource) -> Result<()> {
    ctx.kv(names::TRUTHGPT).set(&id_key(SOURCE, &source.id), source)
}

pub(crate) fn all_sources(ctx: &mut Context<'_>) -> Result<Vec<DataSource>> {
    let sources = ctx.kv(names::TRUTHGPT).values(&[SOURCE])?;
    Ok(by_id(sources, |s: &DataSource| &s.id))
}

pub(crate) fn get_rank(ctx: &mut Context<'_>, source_id: &str) -> Result<Option<DataSourceRank>> {
    ctx.kv(names::TRUTHGPT).get(&id_key(RANK, source_id))
}

pub(crate) fn set_rank(ctx: &mut Context<'_>, rank: &DataSourceRank) -> Result<()> {
    ctx.kv(names::TRUTHGPT).set(&id_key(RANK, &rank.source_id), rank)
}

pub(crate) fn all_ranks(ctx: &mut Context<'_>) -> Result<Vec<DataSourceRank>> {
    let ranks = ctx.kv(names::TRUTHGPT).values(&[RANK])?;
    Ok(by_id(ranks, |r: &DataSourceRank| &r.source_id))
}

pub(crate) fn get_query(ctx: &mut Context<'_>, id: &str) -> Result<Option<OracleQuery>> {
    ctx.kv(names::TRUTHGPT).get(&id_key(QUERY, id))
}

/// Writes the query; pending and processing queries are also indexed as open
pub(crate) fn set_query(ctx: &mut Context<'_>, query: &OracleQuery) -> Result<()> {
    ctx.kv(names::TRUTHGPT).set(&id_key(QUERY, &query.id), query)?;
    mark(ctx, OPEN_QUERY, &query.id, query.status.is_open())
}

/// Pending and processing queries in id order
pub(crate) fn open_queries(ctx: &mut Context<'_>) -> Result<Vec<OracleQuery>> {
    let mut out = Vec::new();
    for id in marked(ctx, OPEN_QUERY)? {
        let query = get_query(ctx, &id)?
            .ok_or_else(|| NmxError::StoreError(format!("open oracle query {} is missing", id)))?;
        out.push(query);
    }
    Ok(out)
}

pub(crate) fn all_queries(ctx: &mut Context<'_>) -> Result<Vec<OracleQuery>> {
    let queries = ctx.kv(names::TRUTHGPT).values(&[QUERY])?;
    Ok(by_id(queries, |q: &OracleQuery| &q.id))
}

pub(crate) fn get_response(ctx: &mut Context<'_>, id: &str) -> Result<Option<OracleResponse>> {
    ctx.kv(names::TRUTHGPT).get(&id_key(RESPONSE, id))
}

pub(crate) fn set_response(ctx: &mut Context<'_>, response: &OracleResponse) -> Result<()> {
    ctx.kv(names::TRUTHGPT).set(&id_key(RESPONSE, &response.id), response)
}

pub(crate) fn all_responses(ctx: &mut Context<'_>) -> Result<Vec<OracleResponse>> {
    let responses = ctx.kv(names::TRUTHGPT).values(&[RESPONSE])?;
    Ok(by_id(responses, |r: &OracleResponse| &r.id))
}

pub(crate) fn get_model(ctx: &mut Context<'_>, id: &str) -> Result<Option<AiModel>> {
    ctx.kv(names::TRUTHGPT).get(&id_key(MODEL, id))
}

pub(crate) fn set_model(ctx: &mut Context<'_>, model: &AiModel) -> Result<()> {
    ctx.kv(names::TRUTHGPT).set(&id_key(MODEL, &model.id), model)
}

pub(crate) fn all_models(ctx: &mut Context<'_>) -> Result<Vec<AiModel>> {
    let models = ctx.kv(names::TRUTHGPT).values(&[MODEL])?;
    Ok(by_id(models, |m: &AiModel| &m.id))
}

pub(crate) fn get_misinformation(ctx: &mut Context<'_>, id: &str) -> Result<Option<Misinformation>> {
    ctx.kv(names::TRUTHGPT).get(&id_key(MISINFORMATION, id))
}

pub(crate) fn set_misinformation(ctx: &mut Context<'_>, record: &Misinformation) -> Result<()> {
    ctx.kv(names::TRUTHGPT).set(&id_key(MISINFORMATION, &record.id), record)
}

pub(crate) fn all_misinformation(ctx: &mut Context<'_>) -> Result<Vec<Misinformation>> {
    let records = ctx.kv(names::TRUTHGPT).values(&[MISINFORMATION])?;
    Ok(by_id(records, |m: &Misinformation| &m.id))
}

pub(crate) fn get_task(ctx: &mut Context<'_>, id: &str) -> Result<Option<VerificationTask>> {
    ctx.kv(names::TRUTHGPT).get(&id_key(TASK, id))
}

/// Writes the task; pending tasks are also indexed
pub(crate) fn set_task(ctx: &mut Context<'_>, task: &VerificationTask) -> Result<()> {
    ctx.kv(names::TRUTHGPT).set(&id_key(TASK, &task.id), task)?;
    mark(ctx, PENDING_TASK, &task.id, task.status == TaskStatus::Pending)
}

/// Pending verification tasks in id order
pub(crate) fn pending_tasks(ctx: &mut Context<'_>) -> Result<Vec<VerificationTask>> {
    let mut out = Vec::new();
    for id in marked(ctx, PENDING_TASK)? {
        let task = get_task(ctx, &id)?
            .ok_or_else(|| NmxError::StoreError(format!("pending verification task {} is missing", id)))?;
        out.push(task);
    }
    Ok(out)
}

pub(crate) fn all_tasks(ctx: &mut Context<'_>) -> Result<Vec<VerificationTask>> {
    let tasks = ctx.kv(names::TRUTHGPT).values(&[TASK])?;
    Ok(by_id(tasks, |t: &VerificationTask| &t.id))
}
