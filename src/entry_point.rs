//! In-memory ERC-4337 entry point driving the paymaster through whole bundles.

use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use tracing::{debug, info, warn};

use crate::authorization::decode_paymaster_and_data;
use crate::error::PaymasterError;
use crate::host::{Host, InMemoryChain};
use crate::paymaster::Paymaster;
use crate::transaction::atomically;
use crate::types::{PaymasterContext, PostOpMode, UserOpResult, UserOperation};

/// Result of running the account's call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub gas_used: U256,
    /// `Some` with revert data when the call failed.
    pub revert: Option<Bytes>,
}

/// Stands in for the smart account executing `callData`.
pub trait Executor {
    fn execute(&mut self, op: &UserOperation, chain: &mut InMemoryChain) -> ExecutionOutcome;
}

/// Succeeds every call, burning its whole call gas limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallGasExecutor;

impl Executor for CallGasExecutor {
    fn execute(&mut self, op: &UserOperation, _chain: &mut InMemoryChain) -> ExecutionOutcome {
        ExecutionOutcome {
            gas_used: op.call_gas_limit,
            revert: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub address: Address,
}

impl EntryPoint {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    // Calculate the hash of a user operation as the v0.7 entry point does
    pub fn user_op_hash(&self, op: &UserOperation, chain_id: u64) -> H256 {
        let account_gas_limits = (op.verification_gas_limit << 128usize) | op.call_gas_limit;
        let gas_fees = (op.max_priority_fee_per_gas << 128usize) | op.max_fee_per_gas;

        let packed = keccak256(encode(&[
            Token::Address(op.sender),
            Token::Uint(op.nonce),
            Token::FixedBytes(keccak256(&op.init_code).to_vec()),
            Token::FixedBytes(keccak256(&op.call_data).to_vec()),
            Token::Uint(account_gas_limits),
            Token::Uint(op.pre_verification_gas),
            Token::Uint(gas_fees),
            Token::FixedBytes(keccak256(&op.paymaster_and_data).to_vec()),
        ]));

        H256::from(keccak256(encode(&[
            Token::FixedBytes(packed.to_vec()),
            Token::Address(self.address),
            Token::Uint(U256::from(chain_id)),
        ])))
    }

    // Calculate the worst-case cost the paymaster has to cover
    pub fn required_prefund(&self, op: &UserOperation) -> Result<U256, PaymasterError> {
        let data = decode_paymaster_and_data(&op.paymaster_and_data)?;

        let total_gas = op
            .call_gas_limit
            .checked_add(op.verification_gas_limit)
            .and_then(|sum| sum.checked_add(op.pre_verification_gas))
            .and_then(|sum| sum.checked_add(U256::from(data.verification_gas_limit)))
            .and_then(|sum| sum.checked_add(U256::from(data.post_op_gas_limit)))
            .ok_or_else(|| PaymasterError::InvalidUserOperation("Gas limit overflow".to_string()))?;

        total_gas
            .checked_mul(op.max_fee_per_gas)
            .ok_or_else(|| PaymasterError::InvalidUserOperation("Max cost calculation overflow".to_string()))
    }

    fn validate_user_operation(&self, op: &UserOperation) -> Result<(), PaymasterError> {
        let max_u128 = U256::from(u128::MAX);
        if op.call_gas_limit > max_u128
            || op.verification_gas_limit > max_u128
            || op.max_fee_per_gas > max_u128
            || op.max_priority_fee_per_gas > max_u128
        {
            return Err(PaymasterError::InvalidUserOperation(
                "Gas field does not fit in 128 bits".to_string(),
            ));
        }
        if op.max_priority_fee_per_gas > op.max_fee_per_gas {
            return Err(PaymasterError::InvalidUserOperation(
                "Priority fee exceeds max fee".to_string(),
            ));
        }
        Ok(())
    }

    /// Runs a bundle: every operation is validated in order, then each is executed in its own
    /// frame and settled.
    ///
    /// A validation failure aborts the whole bundle with `FailedOp`, leaving no trace. A revert
    /// in an account's call only undoes that operation's execution frame. A bundle that leaves
    /// the tracked gas balance out of step with the paymaster's deposit is rolled back.
    pub fn handle_ops(
        &self,
        chain: &mut InMemoryChain,
        paymaster: &mut Paymaster,
        ops: &[UserOperation],
        beneficiary: Address,
        executor: &mut dyn Executor,
    ) -> Result<Vec<UserOpResult>, PaymasterError> {
        atomically(paymaster, chain, |paymaster, chain| {
            let mut contexts = Vec::with_capacity(ops.len());
            for (index, op) in ops.iter().enumerate() {
                let context = self
                    .validate_op(chain, paymaster, op)
                    .map_err(|reason| failed_op(index, reason))?;
                contexts.push(context);
            }

            let mut results = Vec::with_capacity(ops.len());
            let mut collected = U256::zero();
            for (index, (op, context)) in ops.iter().zip(&contexts).enumerate() {
                let result = self
                    .execute_op(chain, paymaster, op, context, executor)
                    .map_err(|reason| failed_op(index, reason))?;
                collected = collected
                    .checked_add(result.actual_gas_cost)
                    .ok_or(PaymasterError::Overflow)?;
                results.push(result);
            }

            chain.pay_out(beneficiary, collected)?;
            paymaster.check_deposit_invariant(chain)?;
            info!(ops = ops.len(), %collected, ?beneficiary, "bundle handled");
            Ok(results)
        })
    }

    fn validate_op(
        &self,
        chain: &mut InMemoryChain,
        paymaster: &mut Paymaster,
        op: &UserOperation,
    ) -> Result<PaymasterContext, PaymasterError> {
        self.validate_user_operation(op)?;

        let data = decode_paymaster_and_data(&op.paymaster_and_data)?;
        if data.paymaster != paymaster.address {
            return Err(PaymasterError::InvalidUserOperation(format!(
                "unknown paymaster {:?}",
                data.paymaster
            )));
        }

        let max_cost = self.required_prefund(op)?;
        let user_op_hash = self.user_op_hash(op, chain.chain_id());

        let context =
            paymaster.validate_paymaster_user_op(chain, self.address, op, user_op_hash, max_cost)?;
        chain.charge_deposit(paymaster.address, max_cost)?;
        Ok(context)
    }

    fn execute_op(
        &self,
        chain: &mut InMemoryChain,
        paymaster: &mut Paymaster,
        op: &UserOperation,
        context: &PaymasterContext,
        executor: &mut dyn Executor,
    ) -> Result<UserOpResult, PaymasterError> {
        paymaster.clear_execution_receipt(self.address)?;
        let frame = atomically(paymaster, chain, |paymaster, chain| {
            paymaster.execute(chain, self.address, context)?;
            let outcome = executor.execute(op, chain);
            match outcome.revert {
                None => Ok(outcome.gas_used),
                Some(data) => Err(PaymasterError::ExecutionReverted {
                    gas_used: outcome.gas_used,
                    data,
                }),
            }
        });

        let (mode, gas_used, revert_data) = match frame {
            Ok(gas_used) => (PostOpMode::OpSucceeded, gas_used, Bytes::default()),
            Err(PaymasterError::ExecutionReverted { gas_used, data }) => {
                warn!(sender = ?op.sender, %data, "user operation reverted");
                (PostOpMode::OpReverted, gas_used, data)
            }
            Err(err) => {
                warn!(sender = ?op.sender, %err, "execution frame reverted");
                (PostOpMode::OpReverted, U256::zero(), Bytes::default())
            }
        };

        let actual_gas_cost = self.actual_gas_cost(op, gas_used, context.max_cost)?;
        paymaster.post_op(chain, self.address, mode, context, actual_gas_cost)?;
        chain.refund_deposit(paymaster.address, context.max_cost - actual_gas_cost)?;

        debug!(user_op_hash = ?context.request_hash, ?mode, %actual_gas_cost, "user operation settled");

        Ok(UserOpResult {
            user_op_hash: context.request_hash,
            success: mode == PostOpMode::OpSucceeded,
            actual_gas_cost,
            revert_data,
        })
    }

    fn actual_gas_cost(
        &self,
        op: &UserOperation,
        call_gas_used: U256,
        max_cost: U256,
    ) -> Result<U256, PaymasterError> {
        let data = decode_paymaster_and_data(&op.paymaster_and_data)?;
        let gas = op
            .pre_verification_gas
            .checked_add(op.verification_gas_limit)
            .and_then(|sum| sum.checked_add(U256::from(data.verification_gas_limit)))
            .and_then(|sum| sum.checked_add(call_gas_used.min(op.call_gas_limit)))
            .and_then(|sum| sum.checked_add(U256::from(data.post_op_gas_limit)))
            .and_then(|gas| gas.checked_mul(op.max_fee_per_gas))
            .ok_or(PaymasterError::Overflow)?;
        Ok(gas.min(max_cost))
    }
}

fn failed_op(index: usize, reason: PaymasterError) -> PaymasterError {
    PaymasterError::FailedOp {
        index,
        reason: Box::new(reason),
    }
}
