//! Ready-made [`ServiceOptions`](crate::service::ServiceOptions) for the
//! services a platform testnet is assembled from.

pub mod drive_abci;
pub mod tendermint;

pub use drive_abci::DriveAbciOptions;
pub use tendermint::{TESTNET_OUTPUT_DIR, TendermintNode, TendermintNodeOptions};
