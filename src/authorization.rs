//! `paymasterAndData` codec and fulfiller recovery.
//!
//! Layout: `paymaster (20) | verificationGasLimit (16) | postOpGasLimit (16) |
//! abi.encode(uint256 executionValue, bytes signature, address precheck)`.
//!
//! The fulfiller signs `keccak256(abi.encode(sender, nonce, callData, executionValue,
//! chainId))` as an EIP-191 message. Binding the chain id makes an authorization usable on
//! exactly one chain.

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address, Bytes, RecoveryMessage, Signature, H256, U256};
use ethers::utils::{hash_message, keccak256};

use crate::error::PaymasterError;
use crate::types::{PaymasterAndData, UserOperation};

/// Length of the entry-point owned prefix of `paymasterAndData`.
pub const PAYMASTER_DATA_OFFSET: usize = 52;

const PAYMASTER_VERIFICATION_GAS_OFFSET: usize = 20;
const PAYMASTER_POST_OP_GAS_OFFSET: usize = 36;

pub fn encode_paymaster_and_data(data: &PaymasterAndData) -> Bytes {
    let mut encoded = Vec::with_capacity(PAYMASTER_DATA_OFFSET + 192);
    encoded.extend_from_slice(data.paymaster.as_bytes());
    encoded.extend_from_slice(&data.verification_gas_limit.to_be_bytes());
    encoded.extend_from_slice(&data.post_op_gas_limit.to_be_bytes());
    encoded.extend_from_slice(&encode(&[
        Token::Uint(data.execution_value),
        Token::Bytes(data.signature.to_vec()),
        Token::Address(data.precheck),
    ]));
    Bytes::from(encoded)
}

pub fn decode_paymaster_and_data(raw: &Bytes) -> Result<PaymasterAndData, PaymasterError> {
    if raw.len() < PAYMASTER_DATA_OFFSET {
        return Err(PaymasterError::InvalidPaymasterData(format!(
            "expected at least {PAYMASTER_DATA_OFFSET} bytes, got {}",
            raw.len()
        )));
    }

    let paymaster = Address::from_slice(&raw[..PAYMASTER_VERIFICATION_GAS_OFFSET]);
    let verification_gas_limit = read_u128(&raw[PAYMASTER_VERIFICATION_GAS_OFFSET..PAYMASTER_POST_OP_GAS_OFFSET]);
    let post_op_gas_limit = read_u128(&raw[PAYMASTER_POST_OP_GAS_OFFSET..PAYMASTER_DATA_OFFSET]);

    let tokens = decode(
        &[ParamType::Uint(256), ParamType::Bytes, ParamType::Address],
        &raw[PAYMASTER_DATA_OFFSET..],
    )
    .map_err(|e| PaymasterError::InvalidPaymasterData(e.to_string()))?;

    let mut tokens = tokens.into_iter();
    let (Some(Token::Uint(execution_value)), Some(Token::Bytes(signature)), Some(Token::Address(precheck))) =
        (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(PaymasterError::InvalidPaymasterData(
            "unexpected token layout".to_string(),
        ));
    };

    Ok(PaymasterAndData {
        paymaster,
        verification_gas_limit,
        post_op_gas_limit,
        execution_value,
        signature: Bytes::from(signature),
        precheck,
    })
}

fn read_u128(bytes: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(bytes);
    u128::from_be_bytes(buf)
}

/// Digest a fulfiller signs to authorize `execution_value` for `op` on `chain_id`.
pub fn authorization_digest(op: &UserOperation, execution_value: U256, chain_id: u64) -> H256 {
    H256::from(keccak256(encode(&[
        Token::Address(op.sender),
        Token::Uint(op.nonce),
        Token::Bytes(op.call_data.to_vec()),
        Token::Uint(execution_value),
        Token::Uint(U256::from(chain_id)),
    ])))
}

/// Recovers the address that signed `digest` as an Ethereum signed message.
pub fn recover_signer(digest: H256, signature: &Bytes) -> Result<Address, PaymasterError> {
    let signature = Signature::try_from(signature.as_ref())
        .map_err(|e| PaymasterError::SignatureVerificationFailed(e.to_string()))?;
    signature
        .recover(RecoveryMessage::Hash(hash_message(digest)))
        .map_err(|e| PaymasterError::SignatureVerificationFailed(e.to_string()))
}

/// Recovers the fulfiller authorizing `op` on `chain_id`.
pub fn recover_fulfiller(
    op: &UserOperation,
    data: &PaymasterAndData,
    chain_id: u64,
) -> Result<Address, PaymasterError> {
    let digest = authorization_digest(op, data.execution_value, chain_id);
    recover_signer(digest, &data.signature)
}
