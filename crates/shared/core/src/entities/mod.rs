mod asset;
mod balance;
mod order;
mod order_status;
mod side;
mod transfer;

pub use asset::AssetId;
pub use balance::AssetBalance;
pub use order::{Order, OrderRef, OrderSnapshot};
pub use order_status::OrderStatus;
pub use side::Side;
pub use transfer::TransferMode;
