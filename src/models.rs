pub mod inventory;
pub mod purchase;
pub mod sync;
