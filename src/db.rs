pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod purchase_repo;
pub use purchase_repo::PurchaseRepository;
pub mod sync_repo;
pub use sync_repo::SyncRepository;
