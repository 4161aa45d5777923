//! Gas accounting.  Every instruction declares its cost and is charged
//! before it runs.

use crate::errors::ExecError;

#[derive(Copy, Clone, Debug)]
pub struct GasMeter {
    initial: u64,
    remaining: u64,
}

impl GasMeter {
    pub fn new(budget: u64) -> Self {
        Self {
            initial: budget,
            remaining: budget,
        }
    }

    pub fn charge(&mut self, cost: u64) -> Result<(), ExecError> {
        if cost > self.remaining {
            self.remaining = 0;
            return Err(ExecError::OutOfGas);
        }
        self.remaining -= cost;
        Ok(())
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn used(&self) -> u64 {
        self.initial - self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_and_used() {
        let mut gas = GasMeter::new(100);
        gas.charge(30).unwrap();
        gas.charge(20).unwrap();
        assert_eq!(gas.remaining(), 50);
        assert_eq!(gas.used(), 50);
    }

    #[test]
    fn test_out_of_gas_halts() {
        let mut gas = GasMeter::new(10);
        assert_eq!(gas.charge(11), Err(ExecError::OutOfGas));
        assert_eq!(gas.remaining(), 0);
    }
}
