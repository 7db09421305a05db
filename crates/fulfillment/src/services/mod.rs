//! External collaborators: trait seams plus HTTP and in-memory implementations.

pub mod evidence;
pub mod inventory;
pub mod order_gateway;

pub use evidence::{EVIDENCE_PREFIX, EvidenceStore, EvidenceUpload, FsEvidenceStore, InMemoryEvidenceStore};
pub use inventory::{
    HttpCatalogClient, InMemoryInventoryService, InventoryService, StockAdjustment,
    VariantSnapshot,
};
pub use order_gateway::{
    DeliveryReport, HttpOrderGateway, InMemoryOrderGateway, LocalOrderGateway, OrderGateway,
};
