use thiserror::Error;

use gridchain_primitives::buf::Buf32;

/// Everything that can abort execution.  The first group halts the machine
/// outright, the second group is raised by individual instructions; both
/// abort the transaction and roll its world-state writes back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    // Machine-level halts.
    #[error("out of gas")]
    OutOfGas,

    #[error("program counter past method end")]
    PcOverflow,

    #[error("jump offset out of method bounds")]
    InvalidInstrOffset,

    // Instruction-raised failures.
    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("operand stack overflow")]
    StackOverflow,

    #[error("operand of unexpected type")]
    InvalidType,

    #[error("arithmetic overflow or division by zero")]
    ArithmeticError,

    #[error("local index out of range")]
    InvalidLocalIndex,

    #[error("field index out of range")]
    InvalidFieldIndex,

    #[error("field written with mismatched type")]
    InvalidFieldType,

    #[error("method index out of range")]
    InvalidMethodIndex,

    #[error("external call to private method")]
    ExternalPrivateMethodCall,

    #[error("payable method entered without balance")]
    EmptyBalanceForPayableMethod,

    #[error("balance instruction without a balance state")]
    BalanceUnavailable,

    #[error("not enough balance for transfer or approval")]
    InsufficientBalance,

    #[error("no contract at address {0:?}")]
    InvalidContractAddress(Buf32),

    #[error("return arity mismatch")]
    InvalidReturnLength,

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("stateful instruction in stateless context")]
    ExpectedStatefulContext,

    #[error("undecodable contract bytecode")]
    InvalidBytecode,

    #[error("world state: {0}")]
    WorldState(String),
}

impl From<gridchain_state::world::WorldStateError> for ExecError {
    fn from(e: gridchain_state::world::WorldStateError) -> Self {
        Self::WorldState(e.to_string())
    }
}
