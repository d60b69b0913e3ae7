use anyhow::Result;
use ethers::abi::{decode, ParamType, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, U256};
use tracing::{debug, info};

use crate::attributes::{
    locate, locate_unchecked, magic_spend_request_selector, precheck_selector, reward_selector,
    value_of,
};
use crate::authorization::{authorization_digest, encode_paymaster_and_data};
use crate::error::PaymasterError;
use crate::types::{PaymasterAndData, PaymasterResponse, UserOperation};

/// Off-chain side of a fulfiller: signs authorizations drawing on its paymaster balances.
pub struct Fulfiller {
    wallet: LocalWallet,
    paymaster: Address,
    chain_id: u64,
    // Gas limits the entry point grants the paymaster
    verification_gas_limit: u128,
    post_op_gas_limit: u128,
}

impl Fulfiller {
    pub fn new(private_key: &str, chain_id: u64, paymaster: Address) -> Result<Self> {
        let wallet = private_key.parse::<LocalWallet>()?.with_chain_id(chain_id);

        info!("Initialized fulfiller with address: {}", wallet.address());

        Ok(Self {
            wallet,
            paymaster,
            chain_id,
            verification_gas_limit: 100_000,
            post_op_gas_limit: 50_000,
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Builds the `paymasterAndData` fulfilling a cross-chain request for `user_op`.
    ///
    /// The request must carry a reward; its magic-spend request (zero when absent) becomes the
    /// execution value and its precheck attribute, if any, the validation hook.
    pub async fn sponsor(
        &self,
        user_op: &UserOperation,
        attributes: &[Bytes],
    ) -> Result<PaymasterResponse, PaymasterError> {
        locate(attributes, reward_selector())?;
        self.validate_user_operation(user_op)?;

        let execution_value = value_of(attributes, magic_spend_request_selector())?;
        let precheck = match locate_unchecked(attributes, precheck_selector()) {
            (true, Some(attribute)) => decode_precheck(attribute)?,
            _ => Address::zero(),
        };

        let signature = self.sign_authorization(user_op, execution_value).await?;
        let paymaster_and_data = encode_paymaster_and_data(&PaymasterAndData {
            paymaster: self.paymaster,
            verification_gas_limit: self.verification_gas_limit,
            post_op_gas_limit: self.post_op_gas_limit,
            execution_value,
            signature,
            precheck,
        });

        debug!(sender = ?user_op.sender, %execution_value, ?precheck, "signed authorization");

        Ok(PaymasterResponse {
            paymaster_and_data,
            fulfiller: self.address(),
            execution_value,
        })
    }

    fn validate_user_operation(&self, user_op: &UserOperation) -> Result<(), PaymasterError> {
        if user_op.sender.is_zero() {
            return Err(PaymasterError::InvalidUserOperation("Sender cannot be zero".to_string()));
        }
        if user_op.max_fee_per_gas.is_zero() {
            return Err(PaymasterError::InvalidUserOperation("Gas price cannot be zero".to_string()));
        }
        Ok(())
    }

    async fn sign_authorization(
        &self,
        user_op: &UserOperation,
        execution_value: U256,
    ) -> Result<Bytes, PaymasterError> {
        let digest = authorization_digest(user_op, execution_value, self.chain_id);

        let signature = self
            .wallet
            .sign_message(digest)
            .await
            .map_err(|e| PaymasterError::SignatureVerificationFailed(e.to_string()))?;

        Ok(Bytes::from(signature.to_vec()))
    }
}

fn decode_precheck(attribute: &Bytes) -> Result<Address, PaymasterError> {
    match decode(&[ParamType::Address], &attribute[4..]).as_deref() {
        Ok([Token::Address(precheck)]) => Ok(*precheck),
        _ => Err(PaymasterError::InvalidParameters(
            "malformed precheck attribute".to_string(),
        )),
    }
}
