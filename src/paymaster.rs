use std::collections::HashMap;

use ethers::types::{Address, Bytes, Log, H256, U256};
use ethers::utils::keccak256;
use tracing::{debug, info, warn};

use crate::authorization::{decode_paymaster_and_data, recover_fulfiller};
use crate::error::PaymasterError;
use crate::host::Host;
use crate::journal::{Checkpoint, Journal};
use crate::ledger::BalanceLedger;
use crate::transaction::atomically;
use crate::types::{
    AccountBalance, ExecutionReceipt, PaymasterContext, PostOpMode, PrecheckContext, UserOperation,
};

const CLAIM_ADDRESS_CHANGED: &str = "ClaimAddressChanged(address,address)";

#[derive(Debug, Clone, Copy)]
pub struct PaymasterCheckpoint {
    ledger: Checkpoint,
    claims: Checkpoint,
    receipt: ExecutionReceipt,
}

/// Magic-spend paymaster: fulfillers escrow funds here and draw them down by signing
/// authorizations that the entry point validates.
#[derive(Debug)]
pub struct Paymaster {
    pub address: Address,
    entry_point: Address,
    ledger: BalanceLedger,
    claim_addresses: HashMap<Address, Address>,
    claims_journal: Journal<(Address, Address)>,
    receipt: ExecutionReceipt,
}

impl Paymaster {
    pub fn new(address: Address, entry_point: Address) -> Result<Self, PaymasterError> {
        if entry_point.is_zero() {
            return Err(PaymasterError::ZeroAddress);
        }

        info!("Initialized paymaster {:?} for entry point {:?}", address, entry_point);

        Ok(Self {
            address,
            entry_point,
            ledger: BalanceLedger::new(),
            claim_addresses: HashMap::new(),
            claims_journal: Journal::default(),
            receipt: ExecutionReceipt::default(),
        })
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub fn balance_of(&self, account: Address) -> AccountBalance {
        self.ledger.balance_of(account)
    }

    pub fn magic_spend_balance(&self, account: Address) -> U256 {
        self.ledger.magic_spend_balance(account)
    }

    pub fn gas_balance(&self, account: Address) -> U256 {
        self.ledger.gas_balance(account)
    }

    pub fn tracked_gas_balance(&self) -> U256 {
        self.ledger.tracked_gas_balance()
    }

    pub fn execution_receipt(&self) -> ExecutionReceipt {
        self.receipt
    }

    /// Zero unless the fulfiller redirected its payouts.
    pub fn claim_address(&self, fulfiller: Address) -> Address {
        self.claim_addresses.get(&fulfiller).copied().unwrap_or_default()
    }

    /// Where rewards earned by `fulfiller` should be sent.
    pub fn payout_address(&self, fulfiller: Address) -> Address {
        match self.claim_address(fulfiller) {
            claim if claim.is_zero() => fulfiller,
            claim => claim,
        }
    }

    /// Checks the tracked gas balance against what the entry point holds for us.
    pub fn check_deposit_invariant<H: Host + ?Sized>(&self, host: &H) -> Result<(), PaymasterError> {
        let tracked = self.ledger.tracked_gas_balance();
        let deposit = host.deposit_of(self.address);
        debug!(%tracked, %deposit, escrowed = %self.ledger.total_gas_balance()?, "deposit invariant");
        if tracked != deposit {
            warn!(%tracked, %deposit, "tracked gas balance diverged from entry point deposit");
            return Err(PaymasterError::InsufficientDeposit {
                account: self.address,
                deposit,
                amount: tracked,
            });
        }
        Ok(())
    }

    /// Direct value transfer into the paymaster, credited to the sender's magic-spend balance.
    pub fn receive<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        value: U256,
    ) -> Result<(), PaymasterError> {
        atomically(self, host, |paymaster, host| {
            host.transfer(caller, paymaster.address, value)?;
            paymaster.ledger.credit_magic_spend(caller, value)
        })?;
        debug!(?caller, %value, "magic spend credited");
        Ok(())
    }

    /// Moves `amount` of the caller's magic-spend balance into its gas escrow and forwards
    /// `value_sent` to the entry point as the paymaster's deposit.
    pub fn entry_point_deposit<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        amount: U256,
        value_sent: U256,
    ) -> Result<(), PaymasterError> {
        atomically(self, host, |paymaster, host| {
            host.transfer(caller, paymaster.address, value_sent)?;
            paymaster.ledger.move_to_gas(caller, amount)?;
            paymaster.ledger.increase_tracked_gas(value_sent)?;
            host.deposit_to(paymaster.address, paymaster.address, value_sent)
        })?;
        info!(?caller, %amount, %value_sent, "entry point deposit");
        Ok(())
    }

    /// Pays `amount` of the caller's magic-spend balance out to `destination`.
    pub fn withdraw_to<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        destination: Address,
        amount: U256,
    ) -> Result<(), PaymasterError> {
        if destination.is_zero() {
            return Err(PaymasterError::ZeroAddress);
        }

        atomically(self, host, |paymaster, host| {
            paymaster.ledger.debit_magic_spend(caller, amount)?;
            host.transfer(paymaster.address, destination, amount)
        })?;
        info!(?caller, ?destination, %amount, "magic spend withdrawn");
        Ok(())
    }

    /// Releases `amount` of the caller's gas escrow from the entry point to `destination`.
    pub fn entry_point_withdraw_to<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        destination: Address,
        amount: U256,
    ) -> Result<(), PaymasterError> {
        if destination.is_zero() {
            return Err(PaymasterError::ZeroAddress);
        }

        atomically(self, host, |paymaster, host| {
            paymaster.ledger.debit_gas(caller, amount)?;
            paymaster.ledger.decrease_tracked_gas(amount)?;
            host.withdraw_to(paymaster.address, destination, amount)
        })?;
        info!(?caller, ?destination, %amount, "gas escrow withdrawn");
        Ok(())
    }

    /// Redirects the caller's future payouts. Zero resets to paying the caller directly.
    pub fn set_claim_address<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        new_address: Address,
    ) {
        let previous = self
            .claim_addresses
            .insert(caller, new_address)
            .unwrap_or_default();
        self.claims_journal.record((caller, previous));

        host.emit(Log {
            address: self.address,
            topics: vec![
                H256::from(keccak256(CLAIM_ADDRESS_CHANGED)),
                H256::from(caller),
                H256::from(new_address),
            ],
            data: Bytes::default(),
            ..Default::default()
        });
        info!(fulfiller = ?caller, ?new_address, "claim address changed");
    }

    /// Entry point validation hook.
    ///
    /// Approval reserves `max_cost` from the fulfiller's gas escrow. The execution value is
    /// only checked here; it moves in [`Paymaster::execute`], inside the operation's own
    /// execution frame.
    pub fn validate_paymaster_user_op<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        op: &UserOperation,
        user_op_hash: H256,
        max_cost: U256,
    ) -> Result<PaymasterContext, PaymasterError> {
        self.only_entry_point(caller)?;

        let data = decode_paymaster_and_data(&op.paymaster_and_data)?;
        let fulfiller = recover_fulfiller(op, &data, host.chain_id())?;

        if !data.execution_value.is_zero() {
            self.ledger.require_magic_spend(fulfiller, data.execution_value)?;
        }
        self.ledger.require_gas(fulfiller, max_cost)?;

        if !data.precheck.is_zero() {
            let context = PrecheckContext {
                user_op_hash,
                sender: op.sender,
                nonce: op.nonce,
                call_data: op.call_data.clone(),
                execution_value: data.execution_value,
                fulfiller,
                max_cost,
            };
            host.call_precheck(data.precheck, &context)?;
        }

        atomically(self, host, |paymaster, _| {
            paymaster.ledger.debit_gas(fulfiller, max_cost)?;
            paymaster.ledger.decrease_tracked_gas(max_cost)
        })?;

        debug!(?fulfiller, ?user_op_hash, %max_cost, "user operation approved");

        Ok(PaymasterContext {
            request_hash: user_op_hash,
            sender: op.sender,
            fulfiller,
            execution_value: data.execution_value,
            max_cost,
        })
    }

    /// Starts an operation's settlement cycle by dropping the previous operation's receipt.
    ///
    /// Called outside the execution frame, so a reverted frame leaves the receipt cleared.
    pub fn clear_execution_receipt(&mut self, caller: Address) -> Result<(), PaymasterError> {
        self.only_entry_point(caller)?;
        self.receipt = ExecutionReceipt::default();
        Ok(())
    }

    /// Runs inside the user operation's execution frame, before the account's call.
    ///
    /// Hands the execution value to the sender and records the receipt. Both are undone with
    /// the frame if the call reverts.
    pub fn execute<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        context: &PaymasterContext,
    ) -> Result<(), PaymasterError> {
        self.only_entry_point(caller)?;

        atomically(self, host, |paymaster, host| {
            if !context.execution_value.is_zero() {
                paymaster
                    .ledger
                    .debit_magic_spend(context.fulfiller, context.execution_value)?;
                host.transfer(paymaster.address, context.sender, context.execution_value)?;
            }
            paymaster.receipt = ExecutionReceipt {
                request_hash: context.request_hash,
                fulfiller: context.fulfiller,
            };
            Ok(())
        })
    }

    /// Settles the actual gas cost, returning the unused part of the reservation.
    pub fn post_op<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Address,
        mode: PostOpMode,
        context: &PaymasterContext,
        actual_gas_cost: U256,
    ) -> Result<(), PaymasterError> {
        self.only_entry_point(caller)?;

        let refund = context
            .max_cost
            .checked_sub(actual_gas_cost)
            .ok_or(PaymasterError::Overflow)?;

        atomically(self, host, |paymaster, _| {
            paymaster.ledger.credit_gas(context.fulfiller, refund)?;
            paymaster.ledger.increase_tracked_gas(refund)
        })?;

        debug!(fulfiller = ?context.fulfiller, ?mode, %actual_gas_cost, %refund, "post op settled");
        Ok(())
    }

    fn only_entry_point(&self, caller: Address) -> Result<(), PaymasterError> {
        if caller != self.entry_point {
            return Err(PaymasterError::NotEntryPoint { caller });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn ledger_mut(&mut self) -> &mut BalanceLedger {
        &mut self.ledger
    }

    pub fn checkpoint(&mut self) -> PaymasterCheckpoint {
        PaymasterCheckpoint {
            ledger: self.ledger.checkpoint(),
            claims: self.claims_journal.checkpoint(),
            receipt: self.receipt,
        }
    }

    pub fn checkpoint_commit(&mut self) {
        self.ledger.checkpoint_commit();
        self.claims_journal.checkpoint_commit();
    }

    pub fn checkpoint_revert(&mut self, checkpoint: PaymasterCheckpoint) {
        self.ledger.checkpoint_revert(checkpoint.ledger);
        for (fulfiller, previous) in self.claims_journal.checkpoint_revert(checkpoint.claims) {
            self.claim_addresses.insert(fulfiller, previous);
        }
        self.receipt = checkpoint.receipt;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ethers::signers::{LocalWallet, Signer};
    use ethers::utils::hash_message;

    use super::*;
    use crate::authorization::{authorization_digest, encode_paymaster_and_data};
    use crate::host::InMemoryChain;
    use crate::precheck::{revert_data, SenderAllowlist};
    use crate::types::PaymasterAndData;

    const CHAIN_ID: u64 = 8453;
    const FULFILLER_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    struct Fixture {
        chain: InMemoryChain,
        paymaster: Paymaster,
        fulfiller: LocalWallet,
    }

    fn entry_point() -> Address {
        Address::repeat_byte(0xee)
    }

    fn paymaster_address() -> Address {
        Address::repeat_byte(0x90)
    }

    fn setup() -> Fixture {
        let mut chain = InMemoryChain::new(CHAIN_ID);
        let fulfiller: LocalWallet = FULFILLER_KEY.parse().unwrap();
        chain.mint(fulfiller.address(), U256::from(1_000_000)).unwrap();
        Fixture {
            chain,
            paymaster: Paymaster::new(paymaster_address(), entry_point()).unwrap(),
            fulfiller,
        }
    }

    impl Fixture {
        fn fund(&mut self, magic_spend: u64, gas: u64) {
            let fulfiller = self.fulfiller.address();
            self.paymaster
                .receive(&mut self.chain, fulfiller, U256::from(magic_spend + gas))
                .unwrap();
            self.paymaster
                .entry_point_deposit(&mut self.chain, fulfiller, U256::from(gas), U256::from(gas))
                .unwrap();
        }

        fn op(&self, execution_value: u64, precheck: Address) -> UserOperation {
            let mut op = UserOperation {
                sender: Address::repeat_byte(0x5e),
                nonce: U256::from(1),
                call_data: Bytes::from(vec![1, 2, 3]),
                ..Default::default()
            };
            let value = U256::from(execution_value);
            let digest = authorization_digest(&op, value, CHAIN_ID);
            let signature = self.fulfiller.sign_hash(hash_message(digest)).unwrap();
            op.paymaster_and_data = encode_paymaster_and_data(&PaymasterAndData {
                paymaster: paymaster_address(),
                verification_gas_limit: 100_000,
                post_op_gas_limit: 50_000,
                execution_value: value,
                signature: Bytes::from(signature.to_vec()),
                precheck,
            });
            op
        }
    }

    #[test]
    fn zero_entry_point_rejected() {
        assert_eq!(
            Paymaster::new(paymaster_address(), Address::zero()).unwrap_err(),
            PaymasterError::ZeroAddress
        );
    }

    #[test]
    fn entry_point_deposit_moves_balance() {
        let mut f = setup();
        let account = f.fulfiller.address();
        f.paymaster.receive(&mut f.chain, account, U256::from(100)).unwrap();

        f.paymaster
            .entry_point_deposit(&mut f.chain, account, U256::from(40), U256::from(40))
            .unwrap();

        assert_eq!(f.paymaster.magic_spend_balance(account), U256::from(60));
        assert_eq!(f.paymaster.gas_balance(account), U256::from(40));
        assert_eq!(f.chain.deposit_of(paymaster_address()), U256::from(40));
        assert_eq!(f.paymaster.tracked_gas_balance(), U256::from(40));
        f.paymaster.check_deposit_invariant(&f.chain).unwrap();
    }

    #[test]
    fn entry_point_deposit_forwards_value_sent() {
        let mut f = setup();
        let account = f.fulfiller.address();
        f.paymaster.receive(&mut f.chain, account, U256::from(100)).unwrap();

        f.paymaster
            .entry_point_deposit(&mut f.chain, account, U256::from(40), U256::from(25))
            .unwrap();

        assert_eq!(f.paymaster.magic_spend_balance(account), U256::from(60));
        assert_eq!(f.paymaster.gas_balance(account), U256::from(40));
        assert_eq!(f.chain.deposit_of(paymaster_address()), U256::from(25));
        assert_eq!(f.paymaster.tracked_gas_balance(), U256::from(25));
        assert_eq!(f.chain.balance(account), U256::from(1_000_000 - 100 - 25));
        f.paymaster.check_deposit_invariant(&f.chain).unwrap();
    }

    #[test]
    fn entry_point_deposit_rejects_empty_balance() {
        let mut f = setup();
        let account = f.fulfiller.address();

        let err = f
            .paymaster
            .entry_point_deposit(&mut f.chain, account, U256::from(5), U256::from(5))
            .unwrap_err();

        assert_eq!(
            err,
            PaymasterError::InsufficientMagicSpendBalance {
                account,
                balance: U256::zero(),
                amount: U256::from(5),
            }
        );
        assert_eq!(f.chain.balance(account), U256::from(1_000_000));
        assert_eq!(f.chain.deposit_of(paymaster_address()), U256::zero());
    }

    #[test]
    fn withdrawals_reject_zero_destination() {
        let mut f = setup();
        f.fund(100, 100);
        let account = f.fulfiller.address();

        assert_eq!(
            f.paymaster.withdraw_to(&mut f.chain, account, Address::zero(), U256::from(1)),
            Err(PaymasterError::ZeroAddress)
        );
        assert_eq!(
            f.paymaster
                .entry_point_withdraw_to(&mut f.chain, account, Address::zero(), U256::zero()),
            Err(PaymasterError::ZeroAddress)
        );
    }

    #[test]
    fn withdraw_to_pays_destination() {
        let mut f = setup();
        f.fund(100, 0);
        let account = f.fulfiller.address();
        let destination = Address::repeat_byte(0xd0);

        f.paymaster
            .withdraw_to(&mut f.chain, account, destination, U256::from(30))
            .unwrap();

        assert_eq!(f.paymaster.magic_spend_balance(account), U256::from(70));
        assert_eq!(f.chain.balance(destination), U256::from(30));
    }

    #[test]
    fn failed_transfer_keeps_balance() {
        let mut f = setup();
        f.fund(100, 0);
        let account = f.fulfiller.address();
        let destination = Address::repeat_byte(0xd0);
        f.chain.reject_value(destination);

        let err = f
            .paymaster
            .withdraw_to(&mut f.chain, account, destination, U256::from(30))
            .unwrap_err();

        assert!(matches!(err, PaymasterError::TransferFailed { .. }));
        assert_eq!(f.paymaster.magic_spend_balance(account), U256::from(100));
        assert_eq!(f.chain.balance(paymaster_address()), U256::from(100));
    }

    #[test]
    fn entry_point_withdraw_keeps_counter_in_sync() {
        let mut f = setup();
        f.fund(0, 100);
        let account = f.fulfiller.address();
        let destination = Address::repeat_byte(0xd0);

        let err = f
            .paymaster
            .entry_point_withdraw_to(&mut f.chain, account, destination, U256::from(101))
            .unwrap_err();
        assert_eq!(
            err,
            PaymasterError::InsufficientGasBalance {
                account,
                balance: U256::from(100),
                amount: U256::from(101),
            }
        );

        f.paymaster
            .entry_point_withdraw_to(&mut f.chain, account, destination, U256::from(60))
            .unwrap();
        assert_eq!(f.paymaster.gas_balance(account), U256::from(40));
        assert_eq!(f.chain.balance(destination), U256::from(60));
        f.paymaster.check_deposit_invariant(&f.chain).unwrap();
    }

    #[test]
    fn ledger_never_exceeds_held_value() {
        let mut f = setup();
        let fulfiller = f.fulfiller.address();
        let other = Address::repeat_byte(0x0b);
        let destination = Address::repeat_byte(0xd0);
        f.chain.mint(other, U256::from(1_000)).unwrap();

        let held = |f: &Fixture| f.chain.balance(paymaster_address()) + f.chain.deposit_of(paymaster_address());
        let owed = |f: &Fixture| {
            [fulfiller, other]
                .iter()
                .map(|a| {
                    let b = f.paymaster.balance_of(*a);
                    b.magic_spend_balance + b.gas_balance
                })
                .fold(U256::zero(), |sum, v| sum + v)
        };

        f.paymaster.receive(&mut f.chain, fulfiller, U256::from(500)).unwrap();
        assert!(owed(&f) <= held(&f));
        f.paymaster.receive(&mut f.chain, other, U256::from(300)).unwrap();
        f.paymaster
            .entry_point_deposit(&mut f.chain, fulfiller, U256::from(200), U256::from(200))
            .unwrap();
        assert!(owed(&f) <= held(&f));
        f.paymaster
            .entry_point_deposit(&mut f.chain, other, U256::from(100), U256::from(50))
            .unwrap();
        assert!(owed(&f) <= held(&f));
        f.paymaster
            .withdraw_to(&mut f.chain, other, destination, U256::from(200))
            .unwrap();
        f.paymaster
            .entry_point_withdraw_to(&mut f.chain, fulfiller, destination, U256::from(150))
            .unwrap();
        assert!(owed(&f) <= held(&f));
        assert!(f
            .paymaster
            .withdraw_to(&mut f.chain, other, destination, U256::from(1))
            .is_err());
        assert!(owed(&f) <= held(&f));
        f.paymaster.check_deposit_invariant(&f.chain).unwrap();
    }

    #[test]
    fn validation_only_from_entry_point() {
        let mut f = setup();
        f.fund(100, 100);
        let op = f.op(0, Address::zero());
        let intruder = Address::repeat_byte(0x66);

        let err = f
            .paymaster
            .validate_paymaster_user_op(&mut f.chain, intruder, &op, H256::zero(), U256::from(1))
            .unwrap_err();
        assert_eq!(err, PaymasterError::NotEntryPoint { caller: intruder });
    }

    #[test]
    fn validation_reserves_gas_and_defers_value() {
        let mut f = setup();
        f.fund(100, 100);
        let account = f.fulfiller.address();
        let op = f.op(25, Address::zero());

        let context = f
            .paymaster
            .validate_paymaster_user_op(&mut f.chain, entry_point(), &op, H256::repeat_byte(1), U256::from(40))
            .unwrap();

        assert_eq!(context.fulfiller, account);
        assert_eq!(context.execution_value, U256::from(25));
        assert_eq!(f.paymaster.gas_balance(account), U256::from(60));
        assert_eq!(f.paymaster.magic_spend_balance(account), U256::from(100));
        assert_eq!(f.paymaster.execution_receipt(), ExecutionReceipt::default());

        f.paymaster.execute(&mut f.chain, entry_point(), &context).unwrap();
        assert_eq!(f.paymaster.magic_spend_balance(account), U256::from(75));
        assert_eq!(f.chain.balance(op.sender), U256::from(25));
        assert_eq!(
            f.paymaster.execution_receipt(),
            ExecutionReceipt {
                request_hash: H256::repeat_byte(1),
                fulfiller: account,
            }
        );

        f.paymaster
            .post_op(&mut f.chain, entry_point(), PostOpMode::OpSucceeded, &context, U256::from(15))
            .unwrap();
        assert_eq!(f.paymaster.gas_balance(account), U256::from(85));
        assert_eq!(f.paymaster.tracked_gas_balance(), U256::from(85));
    }

    #[test]
    fn validation_rejects_value_shortfall() {
        let mut f = setup();
        f.fund(10, 100);
        let account = f.fulfiller.address();
        let op = f.op(11, Address::zero());

        let err = f
            .paymaster
            .validate_paymaster_user_op(&mut f.chain, entry_point(), &op, H256::zero(), U256::from(1))
            .unwrap_err();

        assert_eq!(
            err,
            PaymasterError::InsufficientMagicSpendBalance {
                account,
                balance: U256::from(10),
                amount: U256::from(11),
            }
        );
        assert_eq!(f.paymaster.gas_balance(account), U256::from(100));
    }

    #[test]
    fn gas_shortfall_rejected_on_every_replay() {
        let mut f = setup();
        f.fund(0, 10);
        let account = f.fulfiller.address();
        let op = f.op(0, Address::zero());

        for _ in 0..3 {
            let err = f
                .paymaster
                .validate_paymaster_user_op(&mut f.chain, entry_point(), &op, H256::zero(), U256::from(11))
                .unwrap_err();
            assert_eq!(
                err,
                PaymasterError::InsufficientGasBalance {
                    account,
                    balance: U256::from(10),
                    amount: U256::from(11),
                }
            );
        }
        assert_eq!(f.paymaster.gas_balance(account), U256::from(10));
    }

    #[test]
    fn precheck_revert_propagates_verbatim() {
        let mut f = setup();
        f.fund(0, 100);
        let hook = Address::repeat_byte(0xcc);
        f.chain
            .register_precheck(hook, Arc::new(SenderAllowlist::new([Address::repeat_byte(1)])));
        let op = f.op(0, hook);

        let err = f
            .paymaster
            .validate_paymaster_user_op(&mut f.chain, entry_point(), &op, H256::zero(), U256::from(10))
            .unwrap_err();

        assert_eq!(
            err,
            PaymasterError::PrecheckReverted(revert_data(
                "SenderNotAllowed(address)",
                &[ethers::abi::Token::Address(op.sender)],
            ))
        );
        assert_eq!(f.paymaster.gas_balance(f.fulfiller.address()), U256::from(100));
    }

    #[test]
    fn approved_precheck_lets_validation_through() {
        let mut f = setup();
        f.fund(0, 100);
        let hook = Address::repeat_byte(0xcc);
        f.chain
            .register_precheck(hook, Arc::new(SenderAllowlist::new([Address::repeat_byte(0x5e)])));
        let op = f.op(0, hook);

        assert!(f
            .paymaster
            .validate_paymaster_user_op(&mut f.chain, entry_point(), &op, H256::zero(), U256::from(10))
            .is_ok());
    }

    #[test]
    fn claim_address_round_trip() {
        let mut f = setup();
        let fulfiller = f.fulfiller.address();
        let first = Address::repeat_byte(0xc1);
        let second = Address::repeat_byte(0xc2);

        assert_eq!(f.paymaster.payout_address(fulfiller), fulfiller);

        f.paymaster.set_claim_address(&mut f.chain, fulfiller, first);
        assert_eq!(f.paymaster.claim_address(fulfiller), first);
        f.paymaster.set_claim_address(&mut f.chain, fulfiller, second);
        assert_eq!(f.paymaster.claim_address(fulfiller), second);
        assert_eq!(f.paymaster.payout_address(fulfiller), second);

        f.paymaster.set_claim_address(&mut f.chain, fulfiller, Address::zero());
        assert_eq!(f.paymaster.claim_address(fulfiller), Address::zero());

        let log = &f.chain.logs()[1];
        assert_eq!(log.topics[0], H256::from(keccak256(CLAIM_ADDRESS_CHANGED)));
        assert_eq!(log.topics[1], H256::from(fulfiller));
        assert_eq!(log.topics[2], H256::from(second));
    }
}
