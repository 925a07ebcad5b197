//! Chain access: JSON-RPC transport, ABI codec and primitive types.

pub mod abi;
pub mod rpc;
pub mod types;

pub use rpc::{ChainError, JsonRpcClient};
pub use types::{Address, AmountError, EtherAmount, GameHash, TxHash, Wei};
