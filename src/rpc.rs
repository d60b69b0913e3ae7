//! `pm_*` JSON-RPC surface over the devnet.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Log, U256};
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::{ErrorObject, ErrorObjectOwned};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::devnet::Devnet;
use crate::error::PaymasterError;
use crate::fulfiller::Fulfiller;
use crate::precheck::{MinimumValue, SenderAllowlist};
use crate::types::{AccountBalance, ExecutionReceipt, PaymasterResponse, UserOpResult, UserOperation};

// Define the RPC interface
#[rpc(server, namespace = "pm")]
pub trait PaymasterRpc {
    /// Signs an authorization from the node's fulfiller for a cross-chain request
    #[method(name = "sponsorUserOperation")]
    async fn sponsor(&self, user_op: UserOperation, attributes: Vec<Bytes>) -> RpcResult<PaymasterResponse>;

    /// Submits a bundle to the entry point
    #[method(name = "handleOps")]
    async fn handle_ops(&self, ops: Vec<UserOperation>) -> RpcResult<Vec<UserOpResult>>;

    #[method(name = "faucet")]
    async fn faucet(&self, account: Address, amount: U256) -> RpcResult<U256>;

    /// Plain value transfer into the paymaster
    #[method(name = "transfer")]
    async fn transfer(&self, from: Address, value: U256) -> RpcResult<AccountBalance>;

    #[method(name = "entryPointDeposit")]
    async fn entry_point_deposit(&self, from: Address, amount: U256, value: U256) -> RpcResult<AccountBalance>;

    #[method(name = "withdrawTo")]
    async fn withdraw_to(&self, from: Address, destination: Address, amount: U256) -> RpcResult<AccountBalance>;

    #[method(name = "entryPointWithdrawTo")]
    async fn entry_point_withdraw_to(
        &self,
        from: Address,
        destination: Address,
        amount: U256,
    ) -> RpcResult<AccountBalance>;

    #[method(name = "setClaimAddress")]
    async fn set_claim_address(&self, from: Address, new_address: Address) -> RpcResult<Address>;

    #[method(name = "getBalances")]
    async fn get_balances(&self, account: Address) -> RpcResult<AccountBalance>;

    #[method(name = "getTrackedGasBalance")]
    async fn get_tracked_gas_balance(&self) -> RpcResult<U256>;

    #[method(name = "getExecutionReceipt")]
    async fn get_execution_receipt(&self) -> RpcResult<ExecutionReceipt>;

    #[method(name = "getClaimAddress")]
    async fn get_claim_address(&self, fulfiller: Address) -> RpcResult<Address>;

    /// Claim address, or the fulfiller itself when none is set
    #[method(name = "getPayoutAddress")]
    async fn get_payout_address(&self, fulfiller: Address) -> RpcResult<Address>;

    #[method(name = "getLogs")]
    async fn get_logs(&self) -> RpcResult<Vec<Log>>;

    /// Deploys a precheck at `hook` approving only `senders`
    #[method(name = "registerAllowlistPrecheck")]
    async fn register_allowlist_precheck(&self, hook: Address, senders: Vec<Address>) -> RpcResult<bool>;

    /// Deploys a precheck at `hook` rejecting execution values under `minimum`
    #[method(name = "registerMinimumValuePrecheck")]
    async fn register_minimum_value_precheck(&self, hook: Address, minimum: U256) -> RpcResult<bool>;
}

pub struct PaymasterRpcImpl {
    devnet: Arc<Mutex<Devnet>>,
    fulfiller: Arc<Fulfiller>,
}

impl PaymasterRpcImpl {
    pub fn new(devnet: Arc<Mutex<Devnet>>, fulfiller: Arc<Fulfiller>) -> Self {
        Self { devnet, fulfiller }
    }
}

fn rpc_error(e: PaymasterError) -> ErrorObjectOwned {
    error!("Paymaster call failed: {}", e);
    ErrorObject::owned(-32000, format!("Paymaster error: {}", e), Some(e.data()))
}

#[async_trait]
impl PaymasterRpcServer for PaymasterRpcImpl {
    async fn sponsor(&self, user_op: UserOperation, attributes: Vec<Bytes>) -> RpcResult<PaymasterResponse> {
        debug!("Received sponsor request for sender: {:?}", user_op.sender);

        let response = self
            .fulfiller
            .sponsor(&user_op, &attributes)
            .await
            .map_err(rpc_error)?;
        info!("Successfully sponsored operation for {:?}", user_op.sender);
        Ok(response)
    }

    async fn handle_ops(&self, ops: Vec<UserOperation>) -> RpcResult<Vec<UserOpResult>> {
        self.devnet.lock().await.handle_ops(&ops).map_err(rpc_error)
    }

    async fn faucet(&self, account: Address, amount: U256) -> RpcResult<U256> {
        self.devnet.lock().await.faucet(account, amount).map_err(rpc_error)
    }

    async fn transfer(&self, from: Address, value: U256) -> RpcResult<AccountBalance> {
        self.devnet.lock().await.transfer(from, value).map_err(rpc_error)
    }

    async fn entry_point_deposit(&self, from: Address, amount: U256, value: U256) -> RpcResult<AccountBalance> {
        self.devnet
            .lock()
            .await
            .entry_point_deposit(from, amount, value)
            .map_err(rpc_error)
    }

    async fn withdraw_to(&self, from: Address, destination: Address, amount: U256) -> RpcResult<AccountBalance> {
        self.devnet
            .lock()
            .await
            .withdraw_to(from, destination, amount)
            .map_err(rpc_error)
    }

    async fn entry_point_withdraw_to(
        &self,
        from: Address,
        destination: Address,
        amount: U256,
    ) -> RpcResult<AccountBalance> {
        self.devnet
            .lock()
            .await
            .entry_point_withdraw_to(from, destination, amount)
            .map_err(rpc_error)
    }

    async fn set_claim_address(&self, from: Address, new_address: Address) -> RpcResult<Address> {
        Ok(self.devnet.lock().await.set_claim_address(from, new_address))
    }

    async fn get_balances(&self, account: Address) -> RpcResult<AccountBalance> {
        Ok(self.devnet.lock().await.balances(account))
    }

    async fn get_tracked_gas_balance(&self) -> RpcResult<U256> {
        Ok(self.devnet.lock().await.tracked_gas_balance())
    }

    async fn get_execution_receipt(&self) -> RpcResult<ExecutionReceipt> {
        Ok(self.devnet.lock().await.execution_receipt())
    }

    async fn get_claim_address(&self, fulfiller: Address) -> RpcResult<Address> {
        Ok(self.devnet.lock().await.claim_address(fulfiller))
    }

    async fn get_payout_address(&self, fulfiller: Address) -> RpcResult<Address> {
        Ok(self.devnet.lock().await.payout_address(fulfiller))
    }

    async fn get_logs(&self) -> RpcResult<Vec<Log>> {
        Ok(self.devnet.lock().await.logs())
    }

    async fn register_allowlist_precheck(&self, hook: Address, senders: Vec<Address>) -> RpcResult<bool> {
        if hook.is_zero() {
            return Err(rpc_error(PaymasterError::ZeroAddress));
        }
        self.devnet
            .lock()
            .await
            .register_precheck(hook, Arc::new(SenderAllowlist::new(senders)));
        Ok(true)
    }

    async fn register_minimum_value_precheck(&self, hook: Address, minimum: U256) -> RpcResult<bool> {
        if hook.is_zero() {
            return Err(rpc_error(PaymasterError::ZeroAddress));
        }
        self.devnet
            .lock()
            .await
            .register_precheck(hook, Arc::new(MinimumValue { minimum }));
        Ok(true)
    }
}
