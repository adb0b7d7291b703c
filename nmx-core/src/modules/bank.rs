// src/modules/bank.rs

//! Balances, supply and transfers.

use crate::coins::{Coin, Coins};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::genesis::AppState;
use crate::math::Int;
use crate::modules::auth::{AuthKeeper, Permission};
use crate::modules::crisis::InvariantRegistry;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SUPPLY_PREFIX: u8 = 0x00;
const BALANCE_PREFIX: u8 = 0x02;

fn balance_key(addr: &AccAddress, denom: &str) -> Vec<u8> {
    crate::store::key(BALANCE_PREFIX, &[addr.as_bytes(), denom.as_bytes()])
}

fn supply_key(denom: &str) -> Vec<u8> {
    crate::store::key(SUPPLY_PREFIX, &[denom.as_bytes()])
}

/// Transfer between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    /// Sender, the signer
    pub from_address: AccAddress,
    /// Recipient
    pub to_address: AccAddress,
    /// Coins to move
    pub amount: Coins,
}

impl MsgSend {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.from_address
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.from_address.is_empty() || self.to_address.is_empty() {
            return Err(NmxError::InvalidAddress("empty address".into()));
        }
        self.amount.validate()?;
        if self.amount.is_empty() {
            return Err(NmxError::InvalidCoins("send amount is empty".into()));
        }
        Ok(())
    }
}

/// Balances of one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Holder
    pub address: AccAddress,
    /// Coins held
    pub coins: Coins,
}

/// Bank genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankGenesis {
    /// Initial balances
    #[serde(default)]
    pub balances: Vec<Balance>,
    /// Total supply; empty means "sum of balances"
    #[serde(default)]
    pub supply: Coins,
}

/// Balance and supply keeper
#[derive(Debug, Clone)]
pub struct BankKeeper {
    auth: AuthKeeper,
}

impl BankKeeper {
    /// Creates a keeper on top of the account registry
    pub fn new(auth: AuthKeeper) -> Self {
        Self { auth }
    }

    /// Account registry
    pub fn auth(&self) -> &AuthKeeper {
        &self.auth
    }

    /// Balance of `addr` in `denom`
    pub fn get_balance(&self, ctx: &mut Context<'_>, addr: &AccAddress, denom: &str) -> Result<Int> {
        Ok(ctx
            .kv(names::BANK)
            .get(&balance_key(addr, denom))?
            .unwrap_or(Int::ZERO))
    }

    /// Every balance of `addr`
    pub fn get_all_balances(&self, ctx: &mut Context<'_>, addr: &AccAddress) -> Result<Coins> {
        let prefix = crate::store::key(BALANCE_PREFIX, &[addr.as_bytes()]);
        let entries = ctx.kv(names::BANK).iter::<Int>(&prefix)?;
        let mut coins = Vec::with_capacity(entries.len());
        for (key, amount) in entries {
            let denom = String::from_utf8(key[prefix.len()..].to_vec())
                .map_err(|e| NmxError::StoreError(format!("bad denom in balance key: {}", e)))?;
            coins.push(Coin { denom, amount });
        }
        Coins::new(coins)
    }

    fn set_balance(&self, ctx: &mut Context<'_>, addr: &AccAddress, denom: &str, amount: Int) -> Result<()> {
        let mut store = ctx.kv(names::BANK);
        if amount.is_zero() {
            store.delete(&balance_key(addr, denom))
        } else if amount.is_negative() {
            Err(NmxError::InvariantBroken {
                module: names::BANK.into(),
                route: "nonnegative-outstanding".into(),
                detail: format!("{} would hold {}{}", addr, amount, denom),
            })
        } else {
            store.set(&balance_key(addr, denom), &amount)
        }
    }

    fn add_coins(&self, ctx: &mut Context<'_>, addr: &AccAddress, amount: &Coins) -> Result<()> {
        for coin in amount.iter() {
            let balance = self.get_balance(ctx, addr, &coin.denom)?;
            self.set_balance(ctx, addr, &coin.denom, balance.checked_add(coin.amount)?)?;
        }
        Ok(())
    }

    fn sub_coins(&self, ctx: &mut Context<'_>, addr: &AccAddress, amount: &Coins) -> Result<()> {
        for coin in amount.iter() {
            let balance = self.get_balance(ctx, addr, &coin.denom)?;
            if balance < coin.amount {
                return Err(NmxError::InsufficientFunds(format!(
                    "{} has {}{}, needs {}",
                    addr, balance, coin.denom, coin
                )));
            }
            self.set_balance(ctx, addr, &coin.denom, balance.checked_sub(coin.amount)?)?;
        }
        Ok(())
    }

    /// Total supply of `denom`
    pub fn get_supply(&self, ctx: &mut Context<'_>, denom: &str) -> Result<Int> {
        Ok(ctx
            .kv(names::BANK)
            .get(&supply_key(denom))?
            .unwrap_or(Int::ZERO))
    }

    /// Total supply of every denom
    pub fn total_supply(&self, ctx: &mut Context<'_>) -> Result<Coins> {
        let entries = ctx.kv(names::BANK).iter::<Int>(&[SUPPLY_PREFIX])?;
        let mut coins = Vec::with_capacity(entries.len());
        for (key, amount) in entries {
            let denom = String::from_utf8(key[1..].to_vec())
                .map_err(|e| NmxError::StoreError(format!("bad denom in supply key: {}", e)))?;
            coins.push(Coin { denom, amount });
        }
        Coins::new(coins)
    }

    fn set_supply(&self, ctx: &mut Context<'_>, denom: &str, amount: Int) -> Result<()> {
        let mut store = ctx.kv(names::BANK);
        if amount.is_zero() {
            store.delete(&supply_key(denom))
        } else {
            store.set(&supply_key(denom), &amount)
        }
    }

    /// Moves coins between accounts, creating the recipient if needed
    pub fn send_coins(&self, ctx: &mut Context<'_>, from: &AccAddress, to: &AccAddress, amount: &Coins) -> Result<()> {
        if amount.is_empty() {
            return Ok(());
        }
        self.sub_coins(ctx, from, amount)?;
        self.auth.ensure_account(ctx, *to)?;
        self.add_coins(ctx, to, amount)?;
        ctx.emit(
            Event::new(types::TRANSFER)
                .attr("sender", from)
                .attr("recipient", to)
                .attr("amount", amount),
        );
        Ok(())
    }

    /// Moves coins from an account into a module account
    pub fn send_coins_to_module(&self, ctx: &mut Context<'_>, from: &AccAddress, module: &str, amount: &Coins) -> Result<()> {
        self.auth.ensure_module_account(ctx, module)?;
        let to = self.auth.module_address(module);
        self.send_coins(ctx, from, &to, amount)
    }

    /// Moves coins from a module account to an account
    pub fn send_coins_from_module(&self, ctx: &mut Context<'_>, module: &str, to: &AccAddress, amount: &Coins) -> Result<()> {
        let from = self.auth.module_address(module);
        self.send_coins(ctx, &from, to, amount)
    }

    /// Moves coins between two module accounts
    pub fn send_module_to_module(&self, ctx: &mut Context<'_>, from: &str, to: &str, amount: &Coins) -> Result<()> {
        self.auth.ensure_module_account(ctx, to)?;
        let from_addr = self.auth.module_address(from);
        let to_addr = self.auth.module_address(to);
        self.send_coins(ctx, &from_addr, &to_addr, amount)
    }

    /// Moves staked tokens into a module account holding `staking`
    pub fn delegate_to_module(&self, ctx: &mut Context<'_>, from: &AccAddress, module: &str, amount: &Coins) -> Result<()> {
        self.auth.require_permission(module, Permission::Staking)?;
        self.send_coins_to_module(ctx, from, module, amount)
    }

    /// Returns staked tokens from a module account holding `staking`
    pub fn undelegate_from_module(&self, ctx: &mut Context<'_>, module: &str, to: &AccAddress, amount: &Coins) -> Result<()> {
        self.auth.require_permission(module, Permission::Staking)?;
        self.send_coins_from_module(ctx, module, to, amount)
    }

    /// Mints coins into a module account holding `minter`
    pub fn mint_coins(&self, ctx: &mut Context<'_>, module: &str, amount: &Coins) -> Result<()> {
        self.auth.require_permission(module, Permission::Minter)?;
        self.auth.ensure_module_account(ctx, module)?;
        let addr = self.auth.module_address(module);
        self.add_coins(ctx, &addr, amount)?;
        for coin in amount.iter() {
            let supply = self.get_supply(ctx, &coin.denom)?;
            self.set_supply(ctx, &coin.denom, supply.checked_add(coin.amount)?)?;
        }
        ctx.emit(Event::new(types::MINT).attr("module", module).attr("amount", amount));
        Ok(())
    }

    /// Burns coins from a module account holding `burner`
    pub fn burn_coins(&self, ctx: &mut Context<'_>, module: &str, amount: &Coins) -> Result<()> {
        if amount.is_empty() {
            return Ok(());
        }
        self.auth.require_permission(module, Permission::Burner)?;
        let addr = self.auth.module_address(module);
        self.sub_coins(ctx, &addr, amount)?;
        for coin in amount.iter() {
            let supply = self.get_supply(ctx, &coin.denom)?;
            self.set_supply(ctx, &coin.denom, supply.checked_sub(coin.amount)?)?;
        }
        ctx.emit(Event::new(types::BURN).attr("module", module).attr("amount", amount));
        Ok(())
    }

    /// Executes [`MsgSend`]; module accounts cannot receive user transfers
    pub fn handle_send(&self, ctx: &mut Context<'_>, msg: &MsgSend) -> Result<()> {
        if self.auth.is_module_address(&msg.to_address) {
            return Err(NmxError::Unauthorized(format!(
                "{} is a module account and cannot receive funds",
                msg.to_address
            )));
        }
        self.send_coins(ctx, &msg.from_address, &msg.to_address, &msg.amount)
    }

    /// Every balance in address order
    pub fn all_balances(&self, ctx: &mut Context<'_>) -> Result<Vec<Balance>> {
        let entries = ctx.kv(names::BANK).iter::<Int>(&[BALANCE_PREFIX])?;
        let mut grouped: BTreeMap<AccAddress, Vec<Coin>> = BTreeMap::new();
        for (key, amount) in entries {
            if key.len() < 1 + nmx_crypto::ADDRESS_SIZE {
                return Err(NmxError::StoreError("short balance key".into()));
            }
            let address = AccAddress::from_slice(&key[1..1 + nmx_crypto::ADDRESS_SIZE])?;
            let denom = String::from_utf8(key[1 + nmx_crypto::ADDRESS_SIZE..].to_vec())
                .map_err(|e| NmxError::StoreError(format!("bad denom in balance key: {}", e)))?;
            grouped.entry(address).or_default().push(Coin { denom, amount });
        }
        grouped
            .into_iter()
            .map(|(address, coins)| Ok(Balance { address, coins: Coins::new(coins)? }))
            .collect()
    }

    /// Writes the bank genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &BankGenesis) -> Result<()> {
        let mut total = Coins::empty();
        for balance in &genesis.balances {
            self.auth.ensure_account(ctx, balance.address)?;
            self.add_coins(ctx, &balance.address, &balance.coins)?;
            total = total.checked_add(&balance.coins)?;
        }
        if !genesis.supply.is_empty() && genesis.supply != total {
            return Err(NmxError::InvalidCoins(format!(
                "genesis supply {} does not match balances {}",
                genesis.supply, total
            )));
        }
        for coin in total.iter() {
            self.set_supply(ctx, &coin.denom, coin.amount)?;
        }
        Ok(())
    }

    /// Reads the bank genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<BankGenesis> {
        Ok(BankGenesis {
            balances: self.all_balances(ctx)?,
            supply: self.total_supply(ctx)?,
        })
    }
}

/// Validates a bank genesis section
pub fn validate_genesis(genesis: &BankGenesis) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for balance in &genesis.balances {
        balance.coins.validate()?;
        if !seen.insert(balance.address) {
            return Err(NmxError::InvalidMessage(format!(
                "duplicate balance for {}",
                balance.address
            )));
        }
    }
    genesis.supply.validate()
}

fn total_supply_invariant(bank: &BankKeeper, ctx: &mut Context<'_>) -> Result<Option<String>> {
    let supply = bank.total_supply(ctx)?;
    let mut sum = Coins::empty();
    for balance in bank.all_balances(ctx)? {
        sum = sum.checked_add(&balance.coins)?;
    }
    if sum != supply {
        return Ok(Some(format!("supply {} != sum of balances {}", supply, sum)));
    }
    Ok(None)
}

fn nonnegative_invariant(bank: &BankKeeper, ctx: &mut Context<'_>) -> Result<Option<String>> {
    for balance in bank.all_balances(ctx)? {
        if let Some(coin) = balance.coins.iter().find(|c| c.amount.is_negative()) {
            return Ok(Some(format!("{} holds {}", balance.address, coin)));
        }
    }
    Ok(None)
}

#[derive(Deserialize)]
struct BalanceQuery {
    address: AccAddress,
    #[serde(default)]
    denom: String,
}

/// Bank module
#[derive(Debug, Clone)]
pub struct BankModule {
    keeper: BankKeeper,
}

impl BankModule {
    /// Wraps a keeper
    pub fn new(keeper: BankKeeper) -> Self {
        Self { keeper }
    }
}

impl AppModule for BankModule {
    fn name(&self) -> &'static str {
        names::BANK
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        validate_genesis(&state.bank)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.bank)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.bank = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        let bank = self.keeper.clone();
        registry.register(names::BANK, "total-supply", move |ctx| total_supply_invariant(&bank, ctx));
        let bank = self.keeper.clone();
        registry.register(names::BANK, "nonnegative-outstanding", move |ctx| {
            nonnegative_invariant(&bank, ctx)
        });
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::Send(m) => {
                self.keeper.handle_send(ctx, m)?;
                msg_result(&())
            }
            other => Err(NmxError::UnknownRequest(format!("bank cannot handle {}", other.type_name()))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        let q: BalanceQuery = query_params(data)?;
        match endpoint {
            "balance" => {
                let amount = self.keeper.get_balance(ctx, &q.address, &q.denom)?;
                query_result(&Coin::new(q.denom, amount))
            }
            "balances" => query_result(&self.keeper.get_all_balances(ctx, &q.address)?),
            _ => Err(NmxError::UnknownRequest(format!("bank/{}", endpoint))),
        }
    }
}
