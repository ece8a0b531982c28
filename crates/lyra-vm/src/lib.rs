//! # lyra-vm
//!
//! Quota-metered contract virtual machine for the LyraLedger chain.
//!
//! The VM executes flat bytecode against a 256-bit-word evaluation stack and
//! a byte-addressed scratch memory, reads and writes per-account state
//! through the [`Database`] facade, and reports a deterministic quota
//! consumption figure to the caller. Transfers follow the two-phase
//! send/receive protocol: [`Vm::create`] and [`Vm::call`] each handle both
//! halves, with snapshot/revert discipline providing atomicity.
//!
//! ```
//! use lyra_primitives::{Address, TokenId, U256};
//! use lyra_vm::{Context, MemoryDatabase, TxType, Vm};
//!
//! let mut db = MemoryDatabase::new();
//! let ctx = Context {
//!     depth: 1,
//!     tx_type: TxType::Receive,
//!     ..Context::default()
//! };
//! let mut vm = Vm::new(ctx, &mut db);
//! let outcome = vm.call(
//!     Address::ZERO,
//!     Address::from_bytes([1; 20]),
//!     Vec::new(),
//!     TokenId::NATIVE,
//!     U256::zero(),
//! );
//! assert!(outcome.error.is_none());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod context;
mod database;
mod error;
mod frame;
mod instructions;
mod jumpdest;
mod memory;
mod stack;
mod table;
mod vm;
mod word;

pub mod gas;
pub mod opcode;

pub use context::{Context, Log, PendingTransfer, TxType};
pub use database::{Database, MemoryDatabase};
pub use error::{VmError, VmResult};
pub use frame::Frame;
pub use jumpdest::{jump_table, JumpTable};
pub use memory::Memory;
pub use stack::Stack;
pub use vm::{CallOutcome, CancelToken, CreateOutcome, Vm};
