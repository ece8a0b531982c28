//! VM error types

use thiserror::Error;

/// Errors raised by quota accounting, the interpreter and the outer
/// transaction frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Quota exhausted (or execution cancelled)
    #[error("out of quota")]
    OutOfQuota,

    /// Nested invocation exceeds the maximum call/create depth
    #[error("max call depth exceeded")]
    Depth,

    /// Transfer precondition failed
    #[error("insufficient balance for transfer")]
    InsufficientBalance,

    /// Contract address derivation failed or collided with an existing
    /// account
    #[error("contract address collision")]
    ContractAddressCreationFail,

    /// REVERT opcode; carries the revert payload
    #[error("execution reverted")]
    ExecutionReverted(Vec<u8>),

    /// Dispatched an undefined opcode
    #[error("invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Jump target is not a JUMPDEST outside push immediates
    #[error("invalid jump destination: {0}")]
    InvalidJump(u64),

    /// Stack underflow
    #[error("stack underflow")]
    StackUnderflow,

    /// Stack overflow
    #[error("stack overflow (max 1024)")]
    StackOverflow,

    /// Gas computation overflowed a 64-bit quantity
    #[error("gas uint64 overflow")]
    GasUintOverflow,

    /// Return data access out of bounds
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,
}

impl VmError {
    /// Whether this error is a revert raised by contract code, as opposed
    /// to an interpreter or frame failure
    pub fn is_revert(&self) -> bool {
        matches!(self, VmError::ExecutionReverted(_))
    }
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", VmError::OutOfQuota), "out of quota");
        assert_eq!(format!("{}", VmError::Depth), "max call depth exceeded");
        assert_eq!(
            format!("{}", VmError::InsufficientBalance),
            "insufficient balance for transfer"
        );
        assert_eq!(
            format!("{}", VmError::ContractAddressCreationFail),
            "contract address collision"
        );
        assert_eq!(
            format!("{}", VmError::ExecutionReverted(vec![1, 2])),
            "execution reverted"
        );
        assert_eq!(format!("{}", VmError::InvalidOpcode(0x0c)), "invalid opcode 0x0c");
        assert_eq!(
            format!("{}", VmError::InvalidJump(5)),
            "invalid jump destination: 5"
        );
        assert_eq!(format!("{}", VmError::StackUnderflow), "stack underflow");
        assert_eq!(format!("{}", VmError::StackOverflow), "stack overflow (max 1024)");
        assert_eq!(format!("{}", VmError::GasUintOverflow), "gas uint64 overflow");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(VmError::OutOfQuota, VmError::OutOfQuota);
        assert_ne!(VmError::OutOfQuota, VmError::Depth);
        assert_eq!(VmError::InvalidJump(10), VmError::InvalidJump(10));
        assert_ne!(VmError::InvalidJump(10), VmError::InvalidJump(20));
    }

    #[test]
    fn test_is_revert() {
        assert!(VmError::ExecutionReverted(Vec::new()).is_revert());
        assert!(!VmError::OutOfQuota.is_revert());
        assert!(!VmError::InvalidOpcode(0xfe).is_revert());
    }
}
