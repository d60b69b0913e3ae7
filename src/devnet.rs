//! Single-paymaster chain served by the RPC layer.

use std::sync::Arc;

use ethers::types::{Address, Log, U256};
use tracing::info;

use crate::entry_point::{CallGasExecutor, EntryPoint};
use crate::error::PaymasterError;
use crate::host::{Host, InMemoryChain};
use crate::paymaster::Paymaster;
use crate::precheck::Precheck;
use crate::types::{AccountBalance, ExecutionReceipt, UserOpResult, UserOperation};

#[derive(Debug)]
pub struct Devnet {
    chain: InMemoryChain,
    paymaster: Paymaster,
    entry_point: EntryPoint,
    beneficiary: Address,
}

impl Devnet {
    pub fn new(
        chain_id: u64,
        entry_point: Address,
        paymaster: Address,
        beneficiary: Address,
    ) -> Result<Self, PaymasterError> {
        let paymaster = Paymaster::new(paymaster, entry_point)?;
        info!(
            chain_id,
            entry_point = ?paymaster.entry_point(),
            paymaster = ?paymaster.address,
            "devnet ready"
        );
        Ok(Self {
            chain: InMemoryChain::new(chain_id),
            paymaster,
            entry_point: EntryPoint::new(entry_point),
            beneficiary,
        })
    }

    pub fn faucet(&mut self, account: Address, amount: U256) -> Result<U256, PaymasterError> {
        self.chain.mint(account, amount)?;
        Ok(self.chain.balance(account))
    }

    pub fn transfer(&mut self, from: Address, value: U256) -> Result<AccountBalance, PaymasterError> {
        self.paymaster.receive(&mut self.chain, from, value)?;
        Ok(self.paymaster.balance_of(from))
    }

    pub fn entry_point_deposit(
        &mut self,
        from: Address,
        amount: U256,
        value: U256,
    ) -> Result<AccountBalance, PaymasterError> {
        self.paymaster
            .entry_point_deposit(&mut self.chain, from, amount, value)?;
        Ok(self.paymaster.balance_of(from))
    }

    pub fn withdraw_to(
        &mut self,
        from: Address,
        destination: Address,
        amount: U256,
    ) -> Result<AccountBalance, PaymasterError> {
        self.paymaster
            .withdraw_to(&mut self.chain, from, destination, amount)?;
        Ok(self.paymaster.balance_of(from))
    }

    pub fn entry_point_withdraw_to(
        &mut self,
        from: Address,
        destination: Address,
        amount: U256,
    ) -> Result<AccountBalance, PaymasterError> {
        self.paymaster
            .entry_point_withdraw_to(&mut self.chain, from, destination, amount)?;
        Ok(self.paymaster.balance_of(from))
    }

    pub fn set_claim_address(&mut self, from: Address, new_address: Address) -> Address {
        self.paymaster
            .set_claim_address(&mut self.chain, from, new_address);
        self.paymaster.claim_address(from)
    }

    pub fn register_precheck(&mut self, hook: Address, precheck: Arc<dyn Precheck>) {
        info!(?hook, ?precheck, "precheck registered");
        self.chain.register_precheck(hook, precheck);
    }

    pub fn handle_ops(&mut self, ops: &[UserOperation]) -> Result<Vec<UserOpResult>, PaymasterError> {
        self.entry_point.handle_ops(
            &mut self.chain,
            &mut self.paymaster,
            ops,
            self.beneficiary,
            &mut CallGasExecutor,
        )
    }

    pub fn balances(&self, account: Address) -> AccountBalance {
        self.paymaster.balance_of(account)
    }

    pub fn tracked_gas_balance(&self) -> U256 {
        self.paymaster.tracked_gas_balance()
    }

    pub fn execution_receipt(&self) -> ExecutionReceipt {
        self.paymaster.execution_receipt()
    }

    pub fn claim_address(&self, fulfiller: Address) -> Address {
        self.paymaster.claim_address(fulfiller)
    }

    pub fn payout_address(&self, fulfiller: Address) -> Address {
        self.paymaster.payout_address(fulfiller)
    }

    pub fn logs(&self) -> Vec<Log> {
        self.chain.logs().to_vec()
    }
}
