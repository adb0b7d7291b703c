// src/tx.rs

//! Transactions and the message set.
//!
//! A transaction carries one or more messages, all signed by one account
//! with an Ed25519 key. The signature covers the canonical encoding of a
//! [`SignDoc`], which binds the chain id and the signer's account number
//! so a transaction cannot be replayed on another chain or account.

use crate::codec;
use crate::coins::Coins;
use crate::errors::{NmxError, Result};
use crate::modules::bank::MsgSend;
use crate::modules::crisis::MsgVerifyInvariant;
use crate::modules::dynacontracts::{
    MsgCreateContract, MsgExecuteContract, MsgSetContractParameter, MsgSubmitContractProposal, MsgUpdateContract,
    MsgVoteContractProposal,
};
use crate::modules::hyperchains::{MsgCreateChain, MsgDeployChain, MsgSubmitChainProposal, MsgVoteChainProposal};
use crate::modules::neuropos::{
    MsgCreateNeuralNetwork, MsgReportAnomaly, MsgSubmitNeuralPrediction, MsgTrainNeuralNetwork,
    MsgUpdateNeuralNetwork,
};
use crate::modules::slashing::MsgUnjail;
use crate::modules::staking::{MsgBeginRedelegate, MsgCreateValidator, MsgDelegate, MsgEditValidator, MsgUndelegate};
use crate::modules::truthgpt::{
    MsgCreateOracleQuery, MsgCreateVerificationTask, MsgRegisterAiModel, MsgRegisterDataSource,
    MsgReportMisinformation, MsgSubmitSourceResponse, MsgUpdateAiModel, MsgUpdateDataSource,
};
use crate::modules::upgrade::{MsgCancelUpgrade, MsgScheduleUpgrade};
use crate::store::names;
use nmx_crypto::hash::{blake3_hash, Hash};
use nmx_crypto::{keys, AccAddress, KeyPair, PublicKey};
use serde::{Deserialize, Serialize};

macro_rules! messages {
    ($($variant:ident($ty:ty) => $route:expr, $type_name:literal;)+) => {
        /// Every message the application executes
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[allow(missing_docs)]
        pub enum Msg {
            $($variant($ty),)+
        }

        impl Msg {
            /// Name of the module that executes the message
            pub fn route(&self) -> &'static str {
                match self {
                    $(Msg::$variant(_) => $route,)+
                }
            }

            /// Message type, as reported in the `message` event
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(Msg::$variant(_) => $type_name,)+
                }
            }

            /// Account that must sign the transaction
            pub fn signer(&self) -> AccAddress {
                match self {
                    $(Msg::$variant(m) => m.signer(),)+
                }
            }

            /// Stateless checks of the wrapped message
            pub fn validate_basic(&self) -> Result<()> {
                match self {
                    $(Msg::$variant(m) => m.validate_basic(),)+
                }
            }
        }

        $(
            impl From<$ty> for Msg {
                fn from(m: $ty) -> Self {
                    Msg::$variant(m)
                }
            }
        )+
    };
}

messages! {
    Send(MsgSend) => names::BANK, "send";
    CreateValidator(MsgCreateValidator) => names::STAKING, "create_validator";
    EditValidator(MsgEditValidator) => names::STAKING, "edit_validator";
    Delegate(MsgDelegate) => names::STAKING, "delegate";
    Undelegate(MsgUndelegate) => names::STAKING, "undelegate";
    BeginRedelegate(MsgBeginRedelegate) => names::STAKING, "begin_redelegate";
    Unjail(MsgUnjail) => names::SLASHING, "unjail";
    VerifyInvariant(MsgVerifyInvariant) => names::CRISIS, "verify_invariant";
    CreateNeuralNetwork(MsgCreateNeuralNetwork) => names::NEUROPOS, "create_neural_network";
    UpdateNeuralNetwork(MsgUpdateNeuralNetwork) => names::NEUROPOS, "update_neural_network";
    TrainNeuralNetwork(MsgTrainNeuralNetwork) => names::NEUROPOS, "train_neural_network";
    SubmitNeuralPrediction(MsgSubmitNeuralPrediction) => names::NEUROPOS, "submit_neural_prediction";
    ReportAnomaly(MsgReportAnomaly) => names::NEUROPOS, "report_anomaly";
    RegisterDataSource(MsgRegisterDataSource) => names::TRUTHGPT, "register_data_source";
    UpdateDataSource(MsgUpdateDataSource) => names::TRUTHGPT, "update_data_source";
    RegisterAiModel(MsgRegisterAiModel) => names::TRUTHGPT, "register_ai_model";
    UpdateAiModel(MsgUpdateAiModel) => names::TRUTHGPT, "update_ai_model";
    CreateOracleQuery(MsgCreateOracleQuery) => names::TRUTHGPT, "create_oracle_query";
    SubmitSourceResponse(MsgSubmitSourceResponse) => names::TRUTHGPT, "submit_source_response";
    ReportMisinformation(MsgReportMisinformation) => names::TRUTHGPT, "report_misinformation";
    CreateVerificationTask(MsgCreateVerificationTask) => names::TRUTHGPT, "create_verification_task";
    CreateContract(MsgCreateContract) => names::DYNACONTRACTS, "create_contract";
    UpdateContract(MsgUpdateContract) => names::DYNACONTRACTS, "update_contract";
    ExecuteContract(MsgExecuteContract) => names::DYNACONTRACTS, "execute_contract";
    SetContractParameter(MsgSetContractParameter) => names::DYNACONTRACTS, "set_contract_parameter";
    SubmitContractProposal(MsgSubmitContractProposal) => names::DYNACONTRACTS, "submit_contract_proposal";
    VoteContractProposal(MsgVoteContractProposal) => names::DYNACONTRACTS, "vote_contract_proposal";
    CreateChain(MsgCreateChain) => names::HYPERCHAINS, "create_chain";
    DeployChain(MsgDeployChain) => names::HYPERCHAINS, "deploy_chain";
    SubmitChainProposal(MsgSubmitChainProposal) => names::HYPERCHAINS, "submit_chain_proposal";
    VoteChainProposal(MsgVoteChainProposal) => names::HYPERCHAINS, "vote_chain_proposal";
    ScheduleUpgrade(MsgScheduleUpgrade) => names::UPGRADE, "schedule_upgrade";
    CancelUpgrade(MsgCancelUpgrade) => names::UPGRADE, "cancel_upgrade";
}

/// Signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    /// Messages, executed in order
    pub msgs: Vec<Msg>,
    /// Fee paid to the fee collector
    pub fee: Coins,
    /// Gas the transaction may consume
    pub gas_limit: u64,
    /// Free-form note
    pub memo: String,
    /// Signer's public key
    pub public_key: PublicKey,
    /// Signer's account sequence
    pub sequence: u64,
    /// Ed25519 signature over the [`SignDoc`]
    pub signature: Vec<u8>,
}

/// What a transaction signature covers
#[derive(Debug, Serialize)]
pub struct SignDoc<'a> {
    /// Chain the transaction is valid on
    pub chain_id: &'a str,
    /// Signer's account number
    pub account_number: u64,
    /// Signer's account sequence
    pub sequence: u64,
    /// Fee
    pub fee: &'a Coins,
    /// Gas limit
    pub gas_limit: u64,
    /// Memo
    pub memo: &'a str,
    /// Messages
    pub msgs: &'a [Msg],
}

impl Tx {
    /// Decodes a transaction from its canonical bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }

    /// Canonical bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Hash of the canonical bytes, the id clients poll by
    pub fn hash(&self) -> Result<Hash> {
        Ok(blake3_hash(&self.encode()?))
    }

    /// Account that signed the transaction
    pub fn signer(&self) -> AccAddress {
        self.public_key.account_address()
    }

    /// Bytes the signature covers
    pub fn sign_bytes(&self, chain_id: &str, account_number: u64) -> Result<Vec<u8>> {
        codec::encode(&SignDoc {
            chain_id,
            account_number,
            sequence: self.sequence,
            fee: &self.fee,
            gas_limit: self.gas_limit,
            memo: &self.memo,
            msgs: &self.msgs,
        })
    }

    /// Checks the signature against the sign document
    pub fn verify_signature(&self, chain_id: &str, account_number: u64) -> Result<()> {
        let bytes = self.sign_bytes(chain_id, account_number)?;
        match keys::verify(&bytes, &self.signature, &self.public_key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(NmxError::InvalidSignature(format!(
                "signature of {} does not verify",
                self.signer()
            ))),
            Err(e) => Err(NmxError::InvalidSignature(e.to_string())),
        }
    }
}

/// Assembles and signs transactions
#[derive(Debug, Clone)]
pub struct TxBuilder {
    msgs: Vec<Msg>,
    fee: Coins,
    gas_limit: u64,
    memo: String,
}

impl TxBuilder {
    /// Builder with no fee and a gas limit of 200 000
    pub fn new() -> Self {
        Self {
            msgs: Vec::new(),
            fee: Coins::empty(),
            gas_limit: 200_000,
            memo: String::new(),
        }
    }

    /// Appends a message
    pub fn msg(mut self, msg: impl Into<Msg>) -> Self {
        self.msgs.push(msg.into());
        self
    }

    /// Sets the fee
    pub fn fee(mut self, fee: Coins) -> Self {
        self.fee = fee;
        self
    }

    /// Sets the gas limit
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the memo
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Signs for `chain_id` as the given account
    pub fn sign(self, key: &KeyPair, chain_id: &str, account_number: u64, sequence: u64) -> Result<Tx> {
        let mut tx = Tx {
            msgs: self.msgs,
            fee: self.fee,
            gas_limit: self.gas_limit,
            memo: self.memo,
            public_key: key.public_key,
            sequence,
            signature: Vec::new(),
        };
        tx.signature = key.sign(&tx.sign_bytes(chain_id, account_number)?);
        Ok(tx)
    }
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_send(key: &KeyPair) -> MsgSend {
        MsgSend {
            from_address: key.account_address(),
            to_address: AccAddress::new([2u8; 20]),
            amount: Coins::single("unmx", 10u64),
        }
    }

    #[test]
    fn test_signature_binds_chain_and_account() {
        let key = KeyPair::from_label("alice");
        let tx = TxBuilder::new()
            .msg(create_test_send(&key))
            .fee(Coins::single("unmx", 5u64))
            .sign(&key, "nmx-test", 3, 0)
            .unwrap();
        assert!(tx.verify_signature("nmx-test", 3).is_ok());
        assert!(matches!(
            tx.verify_signature("nmx-other", 3),
            Err(NmxError::InvalidSignature(_))
        ));
        assert!(tx.verify_signature("nmx-test", 4).is_err());

        let mut tampered = tx.clone();
        tampered.memo = "changed".into();
        assert!(tampered.verify_signature("nmx-test", 3).is_err());
    }

    #[test]
    fn test_decode_matches_encode() {
        let key = KeyPair::from_label("bob");
        let tx = TxBuilder::new()
            .msg(create_test_send(&key))
            .memo("hello")
            .sign(&key, "nmx-test", 0, 7)
            .unwrap();
        let bytes = tx.encode().unwrap();
        assert_eq!(Tx::decode(&bytes).unwrap(), tx);
        assert_eq!(tx.hash().unwrap(), blake3_hash(&bytes));
        assert_eq!(tx.signer(), key.account_address());
    }

    #[test]
    fn test_msg_routing() {
        let key = KeyPair::from_label("carol");
        let msg = Msg::from(create_test_send(&key));
        assert_eq!(msg.route(), names::BANK);
        assert_eq!(msg.type_name(), "send");
        assert_eq!(msg.signer(), key.account_address());
        let upgrade = Msg::CancelUpgrade(MsgCancelUpgrade {
            authority: key.account_address(),
        });
        assert_eq!(upgrade.route(), names::UPGRADE);
        assert!(upgrade.validate_basic().is_ok());
    }
}
