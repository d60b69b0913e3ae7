//! Failure modes shared by the ledger, validation and RPC layers.

use ethers::types::{Address, Bytes, U256};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymasterError {
    #[error("caller {caller:?} is not the entry point")]
    NotEntryPoint { caller: Address },

    #[error("zero address")]
    ZeroAddress,

    #[error("insufficient magic spend balance for {account:?}: balance {balance}, requested {amount}")]
    InsufficientMagicSpendBalance {
        account: Address,
        balance: U256,
        amount: U256,
    },

    #[error("insufficient gas balance for {account:?}: balance {balance}, requested {amount}")]
    InsufficientGasBalance {
        account: Address,
        balance: U256,
        amount: U256,
    },

    #[error("attribute 0x{} not found", hex::encode(.0))]
    AttributeNotFound([u8; 4]),

    /// Revert data of a precheck hook, carried through untouched.
    #[error("precheck reverted: {0}")]
    PrecheckReverted(Bytes),

    #[error("Invalid paymasterAndData: {0}")]
    InvalidPaymasterData(String),

    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    #[error("Insufficient funds: {account:?} holds {balance}, cannot send {amount}")]
    InsufficientFunds {
        account: Address,
        balance: U256,
        amount: U256,
    },

    #[error("native transfer of {amount} to {to:?} failed")]
    TransferFailed { to: Address, amount: U256 },

    #[error("insufficient entry point deposit for {account:?}: deposit {deposit}, requested {amount}")]
    InsufficientDeposit {
        account: Address,
        deposit: U256,
        amount: U256,
    },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("execution reverted after {gas_used} gas: {data}")]
    ExecutionReverted { gas_used: U256, data: Bytes },

    #[error("user operation {index} failed: {reason}")]
    FailedOp {
        index: usize,
        reason: Box<PaymasterError>,
    },

    #[error("Invalid UserOperation: {0}")]
    InvalidUserOperation(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl PaymasterError {
    /// Structured parameters attached to RPC error responses.
    pub fn data(&self) -> Value {
        match self {
            Self::NotEntryPoint { caller } => json!({ "error": "NotEntryPoint", "caller": caller }),
            Self::ZeroAddress => json!({ "error": "ZeroAddress" }),
            Self::InsufficientMagicSpendBalance { account, balance, amount } => json!({
                "error": "InsufficientMagicSpendBalance",
                "account": account,
                "balance": balance,
                "amount": amount,
            }),
            Self::InsufficientGasBalance { account, balance, amount } => json!({
                "error": "InsufficientGasBalance",
                "account": account,
                "balance": balance,
                "amount": amount,
            }),
            Self::AttributeNotFound(tag) => json!({
                "error": "AttributeNotFound",
                "tag": format!("0x{}", hex::encode(tag)),
            }),
            Self::PrecheckReverted(data) => json!({ "error": "PrecheckReverted", "data": data }),
            Self::TransferFailed { to, amount } => {
                json!({ "error": "TransferFailed", "to": to, "amount": amount })
            }
            Self::InsufficientDeposit { account, deposit, amount } => json!({
                "error": "InsufficientDeposit",
                "account": account,
                "deposit": deposit,
                "amount": amount,
            }),
            Self::ExecutionReverted { gas_used, data } => json!({
                "error": "ExecutionReverted",
                "gasUsed": gas_used,
                "data": data,
            }),
            Self::FailedOp { index, reason } => json!({
                "error": "FailedOp",
                "index": index,
                "reason": reason.data(),
            }),
            other => json!({ "error": other.to_string() }),
        }
    }
}
