//! Wire and storage types.

use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// ERC-4337 v0.7 user operation in its unpacked form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Decoded `paymasterAndData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterAndData {
    pub paymaster: Address,
    pub verification_gas_limit: u128,
    pub post_op_gas_limit: u128,
    /// Native value the fulfiller fronts to the sender for the call.
    pub execution_value: U256,
    pub signature: Bytes,
    /// Zero when no precheck hook is requested.
    pub precheck: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterResponse {
    pub paymaster_and_data: Bytes,
    pub fulfiller: Address,
    pub execution_value: U256,
}

/// The two balances the paymaster tracks per address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub magic_spend_balance: U256,
    pub gas_balance: U256,
}

/// Which fulfiller satisfied which request, as of the last executed operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub request_hash: H256,
    pub fulfiller: Address,
}

/// Handed from validation to the execution frame and `post_op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymasterContext {
    pub request_hash: H256,
    pub sender: Address,
    pub fulfiller: Address,
    pub execution_value: U256,
    pub max_cost: U256,
}

/// What a precheck hook gets to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecheckContext {
    pub user_op_hash: H256,
    pub sender: Address,
    pub nonce: U256,
    pub call_data: Bytes,
    pub execution_value: U256,
    pub fulfiller: Address,
    pub max_cost: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostOpMode {
    OpSucceeded,
    OpReverted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOpResult {
    pub user_op_hash: H256,
    pub success: bool,
    pub actual_gas_cost: U256,
    /// Revert data of the user's call, empty on success.
    pub revert_data: Bytes,
}
