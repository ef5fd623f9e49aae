pub mod replay;
pub mod store;

pub use replay::ReplayConfig;
pub use store::StoreConfig;
