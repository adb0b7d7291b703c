// src/ante.rs

//! Admission checks run before a transaction's messages.
//!
//! The ante stage validates the envelope, authenticates the signer,
//! bumps its sequence and collects the fee. Its writes are kept even when
//! a message later fails, so a failing transaction still pays and cannot
//! be replayed.

use crate::coins::Coins;
use crate::context::{Context, ExecMode};
use crate::errors::{NmxError, Result};
use crate::math::Dec;
use crate::modules::auth::module_accounts;
use crate::modules::bank::BankKeeper;
use crate::store::GasMeter;
use crate::tx::Tx;
use nmx_crypto::AccAddress;
use tracing::debug;

/// Node-local admission policy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnteOptions {
    /// Minimum fee per unit of gas in the bond denom, enforced by CheckTx only
    pub min_gas_price: Dec,
}

/// Runs the ante stage for `tx` of `tx_len` encoded bytes
///
/// Installs the transaction's gas meter on `ctx`; size and signature
/// costs are charged against it.
///
/// # Returns
/// The authenticated signer
pub fn run_ante(
    ctx: &mut Context<'_>,
    bank: &BankKeeper,
    options: &AnteOptions,
    tx: &Tx,
    tx_len: usize,
) -> Result<AccAddress> {
    let auth = bank.auth();
    let params = auth.params(ctx)?;

    if tx_len as u64 > params.max_tx_bytes {
        return Err(NmxError::TxTooLarge {
            size: tx_len,
            max: params.max_tx_bytes as usize,
        });
    }
    let memo_len = tx.memo.chars().count();
    if memo_len as u64 > params.max_memo_characters {
        return Err(NmxError::MemoTooLong {
            len: memo_len,
            max: params.max_memo_characters as usize,
        });
    }
    if tx.msgs.is_empty() {
        return Err(NmxError::InvalidMessage("transaction carries no messages".into()));
    }
    tx.fee.validate()?;

    let signer = tx.signer();
    for msg in &tx.msgs {
        msg.validate_basic()?;
        if msg.signer() != signer {
            return Err(NmxError::Unauthorized(format!(
                "{} must be signed by {}, not {}",
                msg.type_name(),
                msg.signer(),
                signer
            )));
        }
    }

    if ctx.mode() == ExecMode::Check {
        check_min_fee(&tx.fee, tx.gas_limit, options.min_gas_price)?;
    }

    ctx.set_gas_meter(GasMeter::new(tx.gas_limit));
    ctx.gas_meter_mut()
        .consume(params.tx_size_cost_per_byte.saturating_mul(tx_len as u64), "tx size")?;

    let mut account = auth
        .get_account(ctx, &signer)?
        .ok_or_else(|| NmxError::AccountNotFound(signer.to_string()))?;
    if let Some(key) = &account.pub_key {
        if *key != tx.public_key {
            return Err(NmxError::InvalidSignature(format!("{} is bound to another key", signer)));
        }
    }
    if tx.sequence != account.sequence {
        return Err(NmxError::WrongSequence {
            expected: account.sequence,
            got: tx.sequence,
        });
    }
    ctx.gas_meter_mut()
        .consume(params.sig_verify_cost_ed25519, "ed25519 verify")?;
    let chain_id = ctx.chain_id().to_string();
    tx.verify_signature(&chain_id, account.account_number)?;

    account.pub_key.get_or_insert(tx.public_key);
    account.sequence += 1;
    auth.set_account(ctx, &account)?;

    if !tx.fee.is_empty() {
        bank.send_coins_to_module(ctx, &signer, module_accounts::FEE_COLLECTOR, &tx.fee)?;
    }
    debug!("ante passed for {} sequence {}", signer, tx.sequence);
    Ok(signer)
}

fn check_min_fee(fee: &Coins, gas_limit: u64, min_gas_price: Dec) -> Result<()> {
    if min_gas_price.is_zero() {
        return Ok(());
    }
    let required = min_gas_price.mul_int((gas_limit as i128).into()).ceil_int();
    let offered = fee.amount_of(crate::BOND_DENOM);
    if offered < required {
        return Err(NmxError::InsufficientFee(format!(
            "got {}{}, need {}{} for {} gas",
            offered,
            crate::BOND_DENOM,
            required,
            crate::BOND_DENOM,
            gas_limit
        )));
    }
    Ok(())
}
