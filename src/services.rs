pub mod attachment_service;
pub use attachment_service::AttachmentService;
pub mod inventory_service;
pub use inventory_service::{InventoryService, StockLedger};
pub mod purchase_service;
pub use purchase_service::PurchaseService;
