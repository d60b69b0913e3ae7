//! Everything the paymaster reaches outside its own storage goes through [`Host`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ethers::types::{Address, Bytes, Log, U256};
use tracing::debug;

use crate::error::PaymasterError;
use crate::journal::{Checkpoint, Journal};
use crate::precheck::Precheck;
use crate::types::PrecheckContext;

pub trait Host {
    /// Chain the current transaction executes on.
    fn chain_id(&self) -> u64;

    fn balance(&self, account: Address) -> U256;

    /// Moves native value; fails when `from` is short or `to` refuses it.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), PaymasterError>;

    /// Entry point `depositTo`: `from` pays `amount` into the deposit of `account`.
    fn deposit_to(&mut self, from: Address, account: Address, amount: U256) -> Result<(), PaymasterError>;

    /// Entry point `withdrawTo`, called by `account` on its own deposit.
    fn withdraw_to(
        &mut self,
        account: Address,
        destination: Address,
        amount: U256,
    ) -> Result<(), PaymasterError>;

    /// Entry point `balanceOf`.
    fn deposit_of(&self, account: Address) -> U256;

    fn call_precheck(&self, hook: Address, context: &PrecheckContext) -> Result<(), PaymasterError>;

    fn emit(&mut self, log: Log);

    fn checkpoint(&mut self) -> Checkpoint;

    fn checkpoint_commit(&mut self);

    fn checkpoint_revert(&mut self, checkpoint: Checkpoint);
}

#[derive(Debug, Clone)]
enum ChainChange {
    Balance { account: Address, previous: U256 },
    Deposit { account: Address, previous: U256 },
    Log,
}

/// Native balances plus the entry point's deposit table, all journaled.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    chain_id: u64,
    balances: HashMap<Address, U256>,
    deposits: HashMap<Address, U256>,
    prechecks: HashMap<Address, Arc<dyn Precheck>>,
    rejecting: HashSet<Address>,
    logs: Vec<Log>,
    journal: Journal<ChainChange>,
}

impl InMemoryChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    /// Creates native value out of thin air; devnet and test funding only.
    pub fn mint(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let next = self
            .balance(account)
            .checked_add(amount)
            .ok_or(PaymasterError::Overflow)?;
        self.set_balance(account, next);
        Ok(())
    }

    pub fn register_precheck(&mut self, hook: Address, precheck: Arc<dyn Precheck>) {
        self.prechecks.insert(hook, precheck);
    }

    /// Makes `account` revert on incoming native value.
    #[cfg(test)]
    pub fn reject_value(&mut self, account: Address) {
        self.rejecting.insert(account);
    }

    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Takes `amount` out of the deposit of `account` without paying it anywhere.
    pub fn charge_deposit(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let deposit = self.deposit_of(account);
        let next = deposit
            .checked_sub(amount)
            .ok_or(PaymasterError::InsufficientDeposit {
                account,
                deposit,
                amount,
            })?;
        self.set_deposit(account, next);
        Ok(())
    }

    pub fn refund_deposit(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let next = self
            .deposit_of(account)
            .checked_add(amount)
            .ok_or(PaymasterError::Overflow)?;
        self.set_deposit(account, next);
        Ok(())
    }

    /// Pays `amount` out of the entry point's own funds, e.g. bundler compensation.
    pub fn pay_out(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        self.credit(account, amount)
    }

    fn set_balance(&mut self, account: Address, next: U256) {
        let previous = self.balances.insert(account, next).unwrap_or_default();
        self.journal.record(ChainChange::Balance { account, previous });
    }

    fn set_deposit(&mut self, account: Address, next: U256) {
        let previous = self.deposits.insert(account, next).unwrap_or_default();
        self.journal.record(ChainChange::Deposit { account, previous });
    }

    fn debit(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let balance = self.balance(account);
        let next = balance
            .checked_sub(amount)
            .ok_or(PaymasterError::InsufficientFunds {
                account,
                balance,
                amount,
            })?;
        self.set_balance(account, next);
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        if self.rejecting.contains(&account) {
            return Err(PaymasterError::TransferFailed { to: account, amount });
        }
        self.mint(account, amount)
    }
}

impl Host for InMemoryChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), PaymasterError> {
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        debug!(?from, ?to, %amount, "native transfer");
        Ok(())
    }

    fn deposit_to(&mut self, from: Address, account: Address, amount: U256) -> Result<(), PaymasterError> {
        self.debit(from, amount)?;
        self.refund_deposit(account, amount)
    }

    fn withdraw_to(
        &mut self,
        account: Address,
        destination: Address,
        amount: U256,
    ) -> Result<(), PaymasterError> {
        self.charge_deposit(account, amount)?;
        self.credit(destination, amount)
    }

    fn deposit_of(&self, account: Address) -> U256 {
        self.deposits.get(&account).copied().unwrap_or_default()
    }

    fn call_precheck(&self, hook: Address, context: &PrecheckContext) -> Result<(), PaymasterError> {
        // Calling an address without code reverts with empty data.
        let precheck = self
            .prechecks
            .get(&hook)
            .ok_or(PaymasterError::PrecheckReverted(Bytes::default()))?;
        precheck.check(context).map_err(PaymasterError::PrecheckReverted)
    }

    fn emit(&mut self, log: Log) {
        self.logs.push(log);
        self.journal.record(ChainChange::Log);
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.journal.checkpoint()
    }

    fn checkpoint_commit(&mut self) {
        self.journal.checkpoint_commit();
    }

    fn checkpoint_revert(&mut self, checkpoint: Checkpoint) {
        for change in self.journal.checkpoint_revert(checkpoint) {
            match change {
                ChainChange::Balance { account, previous } => {
                    self.balances.insert(account, previous);
                }
                ChainChange::Deposit { account, previous } => {
                    self.deposits.insert(account, previous);
                }
                ChainChange::Log => {
                    self.logs.pop();
                }
            }
        }
    }
}
