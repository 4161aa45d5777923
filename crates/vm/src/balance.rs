//! Balance bookkeeping for payable execution.
//!
//! Each frame that may move assets owns a balance state: `remaining` is
//! what it can still spend, `approved` is what it has earmarked for its
//! next call.  Entering a payable method turns the caller's approved pot
//! into the callee's remaining pot, so the sum across a call tree is
//! conserved until an explicit transfer moves value into world state.

use std::collections::HashMap;

use gridchain_primitives::buf::Buf32;

use crate::errors::ExecError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    pub native: u64,
    pub tokens: HashMap<Buf32, u64>,
}

impl Balances {
    pub fn native(amount: u64) -> Self {
        Self {
            native: amount,
            tokens: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.native == 0 && self.tokens.values().all(|v| *v == 0)
    }

    fn add(&mut self, other: &Balances) {
        self.native += other.native;
        for (token, amount) in &other.tokens {
            *self.tokens.entry(*token).or_default() += amount;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceState {
    remaining: HashMap<Buf32, Balances>,
    approved: HashMap<Buf32, Balances>,
}

impl BalanceState {
    pub fn from_inputs(inputs: impl IntoIterator<Item = (Buf32, Balances)>) -> Self {
        let mut remaining: HashMap<Buf32, Balances> = HashMap::new();
        for (addr, bal) in inputs {
            remaining.entry(addr).or_default().add(&bal);
        }
        Self {
            remaining,
            approved: HashMap::new(),
        }
    }

    pub fn remaining_native(&self, addr: &Buf32) -> u64 {
        self.remaining.get(addr).map(|b| b.native).unwrap_or(0)
    }

    pub fn approved_native(&self, addr: &Buf32) -> u64 {
        self.approved.get(addr).map(|b| b.native).unwrap_or(0)
    }

    /// Moves spendable native balance into the approved pot.
    pub fn approve_native(&mut self, addr: &Buf32, amount: u64) -> Result<(), ExecError> {
        let rem = self
            .remaining
            .get_mut(addr)
            .filter(|b| b.native >= amount)
            .ok_or(ExecError::InsufficientBalance)?;
        rem.native -= amount;
        self.approved.entry(*addr).or_default().native += amount;
        Ok(())
    }

    pub fn use_native(&mut self, addr: &Buf32, amount: u64) -> Result<(), ExecError> {
        let rem = self
            .remaining
            .get_mut(addr)
            .filter(|b| b.native >= amount)
            .ok_or(ExecError::InsufficientBalance)?;
        rem.native -= amount;
        Ok(())
    }

    pub fn use_token(&mut self, addr: &Buf32, token: &Buf32, amount: u64) -> Result<(), ExecError> {
        let held = self
            .remaining
            .get_mut(addr)
            .and_then(|b| b.tokens.get_mut(token))
            .filter(|v| **v >= amount)
            .ok_or(ExecError::InsufficientBalance)?;
        *held -= amount;
        Ok(())
    }

    pub fn add_remaining(&mut self, addr: &Buf32, bal: Balances) {
        self.remaining.entry(*addr).or_default().add(&bal);
    }

    /// Hands the approved pot to a callee as its remaining pot.
    pub fn take_approved(&mut self) -> BalanceState {
        BalanceState {
            remaining: std::mem::take(&mut self.approved),
            approved: HashMap::new(),
        }
    }

    /// Refunds a returning callee's pots into our remaining pot.
    pub fn merge_refund(&mut self, refund: BalanceState) {
        for (addr, bal) in refund.remaining.into_iter().chain(refund.approved) {
            self.remaining.entry(addr).or_default().add(&bal);
        }
    }

    /// Drains everything for final refunds, address by address.
    pub fn drain_all(self) -> Vec<(Buf32, Balances)> {
        let mut out: HashMap<Buf32, Balances> = HashMap::new();
        for (addr, bal) in self.remaining.into_iter().chain(self.approved) {
            out.entry(addr).or_default().add(&bal);
        }
        out.into_iter().filter(|(_, b)| !b.is_empty()).collect()
    }

    /// Total native value held across both pots, for conservation checks.
    pub fn total_native(&self) -> u64 {
        self.remaining
            .values()
            .chain(self.approved.values())
            .map(|b| b.native)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Buf32 {
        Buf32::new([n; 32])
    }

    #[test]
    fn test_approve_then_take() {
        let mut bal = BalanceState::from_inputs([(addr(1), Balances::native(100))]);
        bal.approve_native(&addr(1), 40).unwrap();
        assert_eq!(bal.remaining_native(&addr(1)), 60);
        assert_eq!(bal.approved_native(&addr(1)), 40);

        let callee = bal.take_approved();
        assert_eq!(callee.remaining_native(&addr(1)), 40);
        assert_eq!(bal.approved_native(&addr(1)), 0);
        assert_eq!(bal.total_native() + callee.total_native(), 100);
    }

    #[test]
    fn test_overspend_rejected() {
        let mut bal = BalanceState::from_inputs([(addr(1), Balances::native(10))]);
        assert_eq!(
            bal.approve_native(&addr(1), 11),
            Err(ExecError::InsufficientBalance)
        );
        assert_eq!(
            bal.use_native(&addr(2), 1),
            Err(ExecError::InsufficientBalance)
        );
    }

    #[test]
    fn test_refund_merge_conserves() {
        let mut caller = BalanceState::from_inputs([(addr(1), Balances::native(100))]);
        caller.approve_native(&addr(1), 30).unwrap();
        let mut callee = caller.take_approved();
        callee.use_native(&addr(1), 10).unwrap();

        caller.merge_refund(callee);
        assert_eq!(caller.total_native(), 90);
    }
}
