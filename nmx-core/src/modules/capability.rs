// src/modules/capability.rs

//! Object capabilities shared between modules.
//!
//! A capability is a global index. The module that creates it becomes its
//! first owner under a module-local name; other modules may claim the same
//! index under names of their own. A capability whose last owner releases
//! it is gone for good; indexes are never reused.

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::{query_params, query_result, AppModule};
use crate::store::{key, names, push_length_prefixed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

const INDEX: &[u8] = &[0x01];
const OWNERS: u8 = 0x02;
const REVERSE: u8 = 0x03;

/// Module-local name a capability is held under
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Owner {
    /// Owning module
    pub module: String,
    /// Name within that module
    pub name: String,
}

/// Owners of one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOwners {
    /// Capability index
    pub index: u64,
    /// Owners in (module, name) order
    pub owners: Vec<Owner>,
}

/// Capability genesis section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGenesis {
    /// Index the next capability gets
    #[serde(default = "first_index")]
    pub index: u64,
    /// Owners of every live capability
    #[serde(default)]
    pub owners: Vec<CapabilityOwners>,
}

fn first_index() -> u64 {
    1
}

impl Default for CapabilityGenesis {
    fn default() -> Self {
        Self {
            index: first_index(),
            owners: Vec::new(),
        }
    }
}

fn owners_key(index: u64) -> Vec<u8> {
    key(OWNERS, &[&index.to_be_bytes()])
}

fn reverse_key(module: &str, name: &str) -> Vec<u8> {
    let mut out = vec![REVERSE];
    push_length_prefixed(&mut out, module.as_bytes());
    push_length_prefixed(&mut out, name.as_bytes());
    out
}

/// Capability keeper
#[derive(Debug, Clone, Default)]
pub struct CapabilityKeeper;

impl CapabilityKeeper {
    /// Index the next capability gets
    pub fn next_index(&self, ctx: &mut Context<'_>) -> Result<u64> {
        Ok(ctx.kv(names::CAPABILITY).get(INDEX)?.unwrap_or_else(first_index))
    }

    /// Owners of capability `index`; empty when it does not exist
    pub fn owners(&self, ctx: &mut Context<'_>, index: u64) -> Result<Vec<Owner>> {
        Ok(ctx.kv(names::CAPABILITY).get(&owners_key(index))?.unwrap_or_default())
    }

    fn set_owners(&self, ctx: &mut Context<'_>, index: u64, owners: &[Owner]) -> Result<()> {
        if owners.is_empty() {
            ctx.kv(names::CAPABILITY).delete(&owners_key(index))
        } else {
            ctx.kv(names::CAPABILITY).set(&owners_key(index), owners)
        }
    }

    /// Index `module` holds under `name`
    pub fn get_capability(&self, ctx: &mut Context<'_>, module: &str, name: &str) -> Result<Option<u64>> {
        ctx.kv(names::CAPABILITY).get(&reverse_key(module, name))
    }

    fn add_owner(&self, ctx: &mut Context<'_>, index: u64, owner: Owner) -> Result<()> {
        let mut owners = self.owners(ctx, index)?;
        if let Err(pos) = owners.binary_search(&owner) {
            owners.insert(pos, owner.clone());
        }
        self.set_owners(ctx, index, &owners)?;
        ctx.kv(names::CAPABILITY).set(&reverse_key(&owner.module, &owner.name), &index)
    }

    /// Creates a capability owned by `module` under `name`
    ///
    /// # Returns
    /// Index of the new capability
    pub fn new_capability(&self, ctx: &mut Context<'_>, module: &str, name: &str) -> Result<u64> {
        if name.is_empty() {
            return Err(NmxError::InvalidMessage("capability name is required".into()));
        }
        if self.get_capability(ctx, module, name)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("capability {}/{}", module, name)));
        }
        let index = self.next_index(ctx)?;
        let next = index
            .checked_add(1)
            .ok_or_else(|| NmxError::Overflow("capability index".into()))?;
        ctx.kv(names::CAPABILITY).set(INDEX, &next)?;
        self.add_owner(
            ctx,
            index,
            Owner {
                module: module.to_string(),
                name: name.to_string(),
            },
        )?;
        debug!("capability {} created by {} as {}", index, module, name);
        Ok(index)
    }

    /// Adds `module` as an owner of an existing capability
    pub fn claim_capability(&self, ctx: &mut Context<'_>, index: u64, module: &str, name: &str) -> Result<()> {
        if self.owners(ctx, index)?.is_empty() {
            return Err(NmxError::NotFound(format!("capability {}", index)));
        }
        if let Some(held) = self.get_capability(ctx, module, name)? {
            return Err(NmxError::AlreadyExists(format!(
                "{} already holds capability {} as {}",
                module, held, name
            )));
        }
        self.add_owner(
            ctx,
            index,
            Owner {
                module: module.to_string(),
                name: name.to_string(),
            },
        )
    }

    /// Drops `module`'s claim held under `name`
    pub fn release_capability(&self, ctx: &mut Context<'_>, module: &str, name: &str) -> Result<()> {
        let index = self
            .get_capability(ctx, module, name)?
            .ok_or_else(|| NmxError::NotFound(format!("capability {}/{}", module, name)))?;
        let mut owners = self.owners(ctx, index)?;
        owners.retain(|o| !(o.module == module && o.name == name));
        self.set_owners(ctx, index, &owners)?;
        ctx.kv(names::CAPABILITY).delete(&reverse_key(module, name))
    }

    /// Writes the capability genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &CapabilityGenesis) -> Result<()> {
        ctx.kv(names::CAPABILITY).set(INDEX, &genesis.index)?;
        for entry in &genesis.owners {
            for owner in &entry.owners {
                self.add_owner(ctx, entry.index, owner.clone())?;
            }
        }
        Ok(())
    }

    /// Reads the capability genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<CapabilityGenesis> {
        let owners = ctx
            .kv(names::CAPABILITY)
            .iter::<Vec<Owner>>(&[OWNERS])?
            .into_iter()
            .filter_map(|(k, owners)| {
                let bytes: [u8; 8] = k.get(1..9)?.try_into().ok()?;
                Some(CapabilityOwners {
                    index: u64::from_be_bytes(bytes),
                    owners,
                })
            })
            .collect();
        Ok(CapabilityGenesis {
            index: self.next_index(ctx)?,
            owners,
        })
    }
}

/// Stateless checks of the capability section
pub fn validate_genesis(genesis: &CapabilityGenesis) -> Result<()> {
    if genesis.index == 0 {
        return Err(NmxError::InvalidState("capability index starts at 1".into()));
    }
    let mut indexes = BTreeSet::new();
    let mut names = BTreeSet::new();
    for entry in &genesis.owners {
        if entry.index == 0 || entry.index >= genesis.index || !indexes.insert(entry.index) {
            return Err(NmxError::InvalidState(format!(
                "capability {} is duplicate or outside [1, {})",
                entry.index, genesis.index
            )));
        }
        if entry.owners.is_empty() {
            return Err(NmxError::InvalidState(format!("capability {} has no owners", entry.index)));
        }
        for owner in &entry.owners {
            if !names.insert((owner.module.as_str(), owner.name.as_str())) {
                return Err(NmxError::InvalidState(format!(
                    "{} holds {} more than once",
                    owner.module, owner.name
                )));
            }
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct OwnersQuery {
    index: u64,
}

/// Capability module
#[derive(Debug, Clone, Default)]
pub struct CapabilityModule {
    keeper: CapabilityKeeper,
}

impl CapabilityModule {
    /// Wraps a keeper
    pub fn new(keeper: CapabilityKeeper) -> Self {
        Self { keeper }
    }
}

impl AppModule for CapabilityModule {
    fn name(&self) -> &'static str {
        names::CAPABILITY
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        validate_genesis(&state.capability)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.capability)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.capability = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "owners" => {
                let q: OwnersQuery = query_params(data)?;
                query_result(&self.keeper.owners(ctx, q.index)?)
            }
            "index" => query_result(&self.keeper.next_index(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("capability/{}", endpoint))),
        }
    }
}
