// src/modules/auth.rs

//! Account registry and module accounts.
//!
//! Accounts are created on first receipt of funds. Module accounts are
//! derived from a module name and carry a permission set checked by the
//! bank on mint, burn and staking transfers.

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::params::{validate_positive, ParamField, ParamSet, ParamsKeeper};
use crate::modules::{query_params, query_result, AppModule};
use crate::store::names;
use nmx_crypto::{AccAddress, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

const ACCOUNT_PREFIX: u8 = 0x01;
const NEXT_NUMBER_KEY: &[u8] = &[0x02];

/// Well-known module account names
pub mod module_accounts {
    #![allow(missing_docs)]

    pub const FEE_COLLECTOR: &str = "fee_collector";
    pub const DISTRIBUTION: &str = "distribution";
    pub const BONDED_POOL: &str = "bonded_tokens_pool";
    pub const NOT_BONDED_POOL: &str = "not_bonded_tokens_pool";
    pub const GOV: &str = "gov";
    pub const NEUROPOS: &str = "neuropos";
    pub const TRUTHGPT: &str = "truthgpt";
    pub const DEAI: &str = "deai";
    pub const DYNACONTRACTS: &str = "dynacontracts";
    pub const HYPERCHAINS: &str = "hyperchains";
}

/// Module account permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// May mint coins
    Minter,
    /// May burn coins
    Burner,
    /// May hold staked tokens
    Staking,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::Minter => "minter",
            Permission::Burner => "burner",
            Permission::Staking => "staking",
        };
        write!(f, "{}", s)
    }
}

/// Default module-account permission table
pub fn default_module_permissions() -> BTreeMap<String, Vec<Permission>> {
    use module_accounts::*;
    use Permission::*;
    let table: [(&str, Vec<Permission>); 10] = [
        (FEE_COLLECTOR, vec![]),
        (DISTRIBUTION, vec![]),
        (BONDED_POOL, vec![Burner, Staking]),
        (NOT_BONDED_POOL, vec![Burner, Staking]),
        (GOV, vec![Burner]),
        (NEUROPOS, vec![Minter, Burner, Staking]),
        (TRUTHGPT, vec![Minter, Burner]),
        (DEAI, vec![Minter, Burner]),
        (DYNACONTRACTS, vec![Minter, Burner]),
        (HYPERCHAINS, vec![Minter, Burner]),
    ];
    table
        .into_iter()
        .map(|(name, perms)| (name.to_string(), perms))
        .collect()
}

/// Module-account part of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module account name
    pub name: String,
    /// Granted permissions
    pub permissions: Vec<Permission>,
}

/// On-chain account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account address
    pub address: AccAddress,
    /// Public key, set by the first signed transaction
    pub pub_key: Option<PublicKey>,
    /// Registry number, assigned on creation
    pub account_number: u64,
    /// Number of transactions signed so far
    pub sequence: u64,
    /// Present on module accounts
    pub module: Option<ModuleInfo>,
}

impl Account {
    /// Whether this is a module account
    pub fn is_module(&self) -> bool {
        self.module.is_some()
    }
}

/// Auth parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    /// Maximum memo length in characters
    pub max_memo_characters: u64,
    /// Maximum encoded transaction size in bytes
    pub max_tx_bytes: u64,
    /// Gas charged per transaction byte
    pub tx_size_cost_per_byte: u64,
    /// Gas charged for one Ed25519 verification
    pub sig_verify_cost_ed25519: u64,
}

impl Default for AuthParams {
    fn default() -> Self {
        Self {
            max_memo_characters: 256,
            max_tx_bytes: 1_048_576,
            tx_size_cost_per_byte: 10,
            sig_verify_cost_ed25519: 1_000,
        }
    }
}

/// One auth parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum AuthParam {
    MaxMemoCharacters(u64),
    MaxTxBytes(u64),
    TxSizeCostPerByte(u64),
    SigVerifyCostEd25519(u64),
}

impl ParamField for AuthParam {
    fn name(&self) -> &'static str {
        match self {
            AuthParam::MaxMemoCharacters(_) => "max_memo_characters",
            AuthParam::MaxTxBytes(_) => "max_tx_bytes",
            AuthParam::TxSizeCostPerByte(_) => "tx_size_cost_per_byte",
            AuthParam::SigVerifyCostEd25519(_) => "sig_verify_cost_ed25519",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            AuthParam::MaxMemoCharacters(v)
            | AuthParam::MaxTxBytes(v)
            | AuthParam::TxSizeCostPerByte(v)
            | AuthParam::SigVerifyCostEd25519(v) => validate_positive(self.name(), *v),
        }
    }
}

impl ParamSet for AuthParams {
    const SUBSPACE: &'static str = names::AUTH;
    type Field = AuthParam;

    fn fields(&self) -> Vec<AuthParam> {
        vec![
            AuthParam::MaxMemoCharacters(self.max_memo_characters),
            AuthParam::MaxTxBytes(self.max_tx_bytes),
            AuthParam::TxSizeCostPerByte(self.tx_size_cost_per_byte),
            AuthParam::SigVerifyCostEd25519(self.sig_verify_cost_ed25519),
        ]
    }

    fn apply(&mut self, field: AuthParam) {
        match field {
            AuthParam::MaxMemoCharacters(v) => self.max_memo_characters = v,
            AuthParam::MaxTxBytes(v) => self.max_tx_bytes = v,
            AuthParam::TxSizeCostPerByte(v) => self.tx_size_cost_per_byte = v,
            AuthParam::SigVerifyCostEd25519(v) => self.sig_verify_cost_ed25519 = v,
        }
    }
}

/// Auth genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGenesis {
    /// Parameters
    #[serde(default)]
    pub params: AuthParams,
    /// Pre-existing accounts
    #[serde(default)]
    pub accounts: Vec<Account>,
}

fn account_key(addr: &AccAddress) -> Vec<u8> {
    crate::store::key(ACCOUNT_PREFIX, &[addr.as_bytes()])
}

/// Account registry keeper
#[derive(Debug, Clone)]
pub struct AuthKeeper {
    permissions: Arc<BTreeMap<String, Vec<Permission>>>,
    module_names: Arc<BTreeMap<AccAddress, String>>,
}

impl AuthKeeper {
    /// Creates a keeper with a module-account permission table
    pub fn new(permissions: BTreeMap<String, Vec<Permission>>) -> Self {
        let module_names = permissions
            .keys()
            .map(|name| (AccAddress::module(name), name.clone()))
            .collect();
        Self {
            permissions: Arc::new(permissions),
            module_names: Arc::new(module_names),
        }
    }

    /// Parameters in force
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<AuthParams> {
        ParamsKeeper.get(ctx)
    }

    /// Account at `addr`
    pub fn get_account(&self, ctx: &mut Context<'_>, addr: &AccAddress) -> Result<Option<Account>> {
        ctx.kv(names::AUTH).get(&account_key(addr))
    }

    /// Stores an account
    pub fn set_account(&self, ctx: &mut Context<'_>, account: &Account) -> Result<()> {
        ctx.kv(names::AUTH).set(&account_key(&account.address), account)
    }

    /// Whether an account exists
    pub fn has_account(&self, ctx: &mut Context<'_>, addr: &AccAddress) -> Result<bool> {
        ctx.kv(names::AUTH).has(&account_key(addr))
    }

    fn next_account_number(&self, ctx: &mut Context<'_>) -> Result<u64> {
        let mut store = ctx.kv(names::AUTH);
        let number: u64 = store.get(NEXT_NUMBER_KEY)?.unwrap_or(0);
        store.set(NEXT_NUMBER_KEY, &(number + 1))?;
        Ok(number)
    }

    /// Creates a plain account with the next account number
    pub fn new_account(&self, ctx: &mut Context<'_>, addr: AccAddress) -> Result<Account> {
        if self.has_account(ctx, &addr)? {
            return Err(NmxError::AlreadyExists(format!("account {}", addr)));
        }
        let account = Account {
            address: addr,
            pub_key: None,
            account_number: self.next_account_number(ctx)?,
            sequence: 0,
            module: self.module_names.get(&addr).map(|name| ModuleInfo {
                name: name.clone(),
                permissions: self.permissions.get(name).cloned().unwrap_or_default(),
            }),
        };
        self.set_account(ctx, &account)?;
        Ok(account)
    }

    /// Creates the account if it does not exist yet
    pub fn ensure_account(&self, ctx: &mut Context<'_>, addr: AccAddress) -> Result<Account> {
        match self.get_account(ctx, &addr)? {
            Some(account) => Ok(account),
            None => self.new_account(ctx, addr),
        }
    }

    /// Address of a module account
    pub fn module_address(&self, name: &str) -> AccAddress {
        AccAddress::module(name)
    }

    /// Module name owning `addr`, if it is a module account
    pub fn module_name(&self, addr: &AccAddress) -> Option<&str> {
        self.module_names.get(addr).map(|s| s.as_str())
    }

    /// Whether `addr` belongs to a registered module account
    pub fn is_module_address(&self, addr: &AccAddress) -> bool {
        self.module_names.contains_key(addr)
    }

    /// Fails unless module `name` holds `permission`
    pub fn require_permission(&self, name: &str, permission: Permission) -> Result<()> {
        let perms = self
            .permissions
            .get(name)
            .ok_or_else(|| NmxError::NotFound(format!("module account {}", name)))?;
        if !perms.contains(&permission) {
            return Err(NmxError::Unauthorized(format!(
                "module account {} lacks {} permission",
                name, permission
            )));
        }
        Ok(())
    }

    /// Creates the module account `name` if missing
    pub fn ensure_module_account(&self, ctx: &mut Context<'_>, name: &str) -> Result<Account> {
        if !self.permissions.contains_key(name) {
            return Err(NmxError::NotFound(format!("module account {}", name)));
        }
        self.ensure_account(ctx, self.module_address(name))
    }

    /// Every account in address order
    pub fn all_accounts(&self, ctx: &mut Context<'_>) -> Result<Vec<Account>> {
        ctx.kv(names::AUTH).values(&[ACCOUNT_PREFIX])
    }

    /// Writes the auth genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &AuthGenesis) -> Result<()> {
        ParamsKeeper.set(ctx, &genesis.params)?;
        let mut next = 0u64;
        for account in &genesis.accounts {
            self.set_account(ctx, account)?;
            next = next.max(account.account_number + 1);
        }
        ctx.kv(names::AUTH).set(NEXT_NUMBER_KEY, &next)?;
        for name in self.permissions.keys() {
            self.ensure_module_account(ctx, name)?;
        }
        Ok(())
    }

    /// Reads the auth genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<AuthGenesis> {
        Ok(AuthGenesis {
            params: self.params(ctx)?,
            accounts: self.all_accounts(ctx)?,
        })
    }
}

/// Validates an auth genesis section
pub fn validate_genesis(genesis: &AuthGenesis) -> Result<()> {
    genesis.params.validate()?;
    let mut numbers = std::collections::BTreeSet::new();
    let mut addrs = std::collections::BTreeSet::new();
    for account in &genesis.accounts {
        if !addrs.insert(account.address) {
            return Err(NmxError::InvalidMessage(format!(
                "duplicate genesis account {}",
                account.address
            )));
        }
        if !numbers.insert(account.account_number) {
            return Err(NmxError::InvalidMessage(format!(
                "duplicate account number {}",
                account.account_number
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct AccountQuery {
    address: AccAddress,
}

/// Auth module
#[derive(Debug, Clone)]
pub struct AuthModule {
    keeper: AuthKeeper,
}

impl AuthModule {
    /// Wraps a keeper
    pub fn new(keeper: AuthKeeper) -> Self {
        Self { keeper }
    }
}

impl AppModule for AuthModule {
    fn name(&self) -> &'static str {
        names::AUTH
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        validate_genesis(&state.auth)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.auth)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.auth = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "account" => {
                let q: AccountQuery = query_params(data)?;
                let account = self
                    .keeper
                    .get_account(ctx, &q.address)?
                    .ok_or_else(|| NmxError::AccountNotFound(q.address.to_string()))?;
                query_result(&account)
            }
            _ => Err(NmxError::UnknownRequest(format!("auth/{}", endpoint))),
        }
    }
}
