//! Per-address magic-spend and gas-escrow bookkeeping.

use std::collections::HashMap;

use ethers::types::{Address, U256};
use tracing::debug;

use crate::error::PaymasterError;
use crate::journal::{Checkpoint, Journal};
use crate::types::AccountBalance;

#[derive(Debug, Clone)]
enum LedgerChange {
    Account {
        account: Address,
        previous: AccountBalance,
    },
    TrackedGas {
        previous: U256,
    },
}

/// Balances are created on first credit and never removed, only zeroed.
///
/// `tracked_gas_balance` mirrors what the entry point holds on deposit for the paymaster.
#[derive(Debug, Default)]
pub struct BalanceLedger {
    accounts: HashMap<Address, AccountBalance>,
    tracked_gas_balance: U256,
    journal: Journal<LedgerChange>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: Address) -> AccountBalance {
        self.accounts.get(&account).copied().unwrap_or_default()
    }

    pub fn magic_spend_balance(&self, account: Address) -> U256 {
        self.balance_of(account).magic_spend_balance
    }

    pub fn gas_balance(&self, account: Address) -> U256 {
        self.balance_of(account).gas_balance
    }

    pub fn tracked_gas_balance(&self) -> U256 {
        self.tracked_gas_balance
    }

    /// Sum of every gas balance; equals the tracked balance when deposits forward exactly
    /// the amount moved.
    pub fn total_gas_balance(&self) -> Result<U256, PaymasterError> {
        self.accounts
            .values()
            .try_fold(U256::zero(), |sum, balance| {
                sum.checked_add(balance.gas_balance)
            })
            .ok_or(PaymasterError::Overflow)
    }

    pub fn require_magic_spend(&self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let balance = self.magic_spend_balance(account);
        if balance < amount {
            return Err(PaymasterError::InsufficientMagicSpendBalance {
                account,
                balance,
                amount,
            });
        }
        Ok(())
    }

    pub fn require_gas(&self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let balance = self.gas_balance(account);
        if balance < amount {
            return Err(PaymasterError::InsufficientGasBalance {
                account,
                balance,
                amount,
            });
        }
        Ok(())
    }

    pub fn credit_magic_spend(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let mut balance = self.balance_of(account);
        balance.magic_spend_balance = balance
            .magic_spend_balance
            .checked_add(amount)
            .ok_or(PaymasterError::Overflow)?;
        self.write(account, balance);
        Ok(())
    }

    pub fn debit_magic_spend(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        self.require_magic_spend(account, amount)?;
        let mut balance = self.balance_of(account);
        balance.magic_spend_balance -= amount;
        self.write(account, balance);
        Ok(())
    }

    pub fn credit_gas(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        let mut balance = self.balance_of(account);
        balance.gas_balance = balance
            .gas_balance
            .checked_add(amount)
            .ok_or(PaymasterError::Overflow)?;
        self.write(account, balance);
        Ok(())
    }

    pub fn debit_gas(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        self.require_gas(account, amount)?;
        let mut balance = self.balance_of(account);
        balance.gas_balance -= amount;
        self.write(account, balance);
        Ok(())
    }

    /// Moves `amount` from the magic-spend balance of `account` into its gas escrow.
    pub fn move_to_gas(&mut self, account: Address, amount: U256) -> Result<(), PaymasterError> {
        self.debit_magic_spend(account, amount)?;
        self.credit_gas(account, amount)
    }

    pub fn increase_tracked_gas(&mut self, amount: U256) -> Result<(), PaymasterError> {
        let next = self
            .tracked_gas_balance
            .checked_add(amount)
            .ok_or(PaymasterError::Overflow)?;
        self.set_tracked_gas(next);
        Ok(())
    }

    pub fn decrease_tracked_gas(&mut self, amount: U256) -> Result<(), PaymasterError> {
        let next = self
            .tracked_gas_balance
            .checked_sub(amount)
            .ok_or(PaymasterError::Overflow)?;
        self.set_tracked_gas(next);
        Ok(())
    }

    fn set_tracked_gas(&mut self, next: U256) {
        self.journal.record(LedgerChange::TrackedGas {
            previous: self.tracked_gas_balance,
        });
        self.tracked_gas_balance = next;
    }

    fn write(&mut self, account: Address, balance: AccountBalance) {
        let previous = self.accounts.insert(account, balance).unwrap_or_default();
        self.journal.record(LedgerChange::Account { account, previous });
        debug!(?account, ?balance, "ledger updated");
    }

    pub fn checkpoint(&mut self) -> Checkpoint {
        self.journal.checkpoint()
    }

    pub fn checkpoint_commit(&mut self) {
        self.journal.checkpoint_commit();
    }

    pub fn checkpoint_revert(&mut self, checkpoint: Checkpoint) {
        for change in self.journal.checkpoint_revert(checkpoint) {
            match change {
                LedgerChange::Account { account, previous } => {
                    self.accounts.insert(account, previous);
                }
                LedgerChange::TrackedGas { previous } => self.tracked_gas_balance = previous,
            }
        }
    }
}
