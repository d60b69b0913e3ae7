//! Caller-selected hooks that can veto a user operation during validation.

use std::collections::HashSet;
use std::fmt::Debug;

use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use crate::types::PrecheckContext;

/// A precheck approves an operation by returning `Ok`; its revert data is surfaced verbatim.
pub trait Precheck: Debug + Send + Sync {
    fn check(&self, context: &PrecheckContext) -> Result<(), Bytes>;
}

/// Encodes a Solidity custom error.
pub fn revert_data(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend_from_slice(&encode(args));
    Bytes::from(data)
}

/// Approves only operations sent from a known set of accounts.
#[derive(Debug, Default)]
pub struct SenderAllowlist {
    senders: HashSet<Address>,
}

impl SenderAllowlist {
    pub fn new(senders: impl IntoIterator<Item = Address>) -> Self {
        Self {
            senders: senders.into_iter().collect(),
        }
    }
}

impl Precheck for SenderAllowlist {
    fn check(&self, context: &PrecheckContext) -> Result<(), Bytes> {
        if self.senders.contains(&context.sender) {
            return Ok(());
        }
        Err(revert_data(
            "SenderNotAllowed(address)",
            &[Token::Address(context.sender)],
        ))
    }
}

/// Rejects operations fronting less than `minimum` execution value.
#[derive(Debug)]
pub struct MinimumValue {
    pub minimum: U256,
}

impl Precheck for MinimumValue {
    fn check(&self, context: &PrecheckContext) -> Result<(), Bytes> {
        if context.execution_value >= self.minimum {
            return Ok(());
        }
        Err(revert_data(
            "ExecutionValueTooLow(uint256,uint256)",
            &[
                Token::Uint(context.execution_value),
                Token::Uint(self.minimum),
            ],
        ))
    }
}
