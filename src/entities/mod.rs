//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod inventory_item;
pub mod order;
pub mod order_file;
pub mod order_status_event;

// Re-export specific types to avoid conflicts
pub use inventory_item::{
    Column as InventoryColumn, Entity as InventoryItem, Model as InventoryModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_file::{Column as OrderFileColumn, Entity as OrderFile, Model as OrderFileModel};
pub use order_status_event::{
    Column as OrderStatusEventColumn, Entity as OrderStatusEvent, Model as OrderStatusEventModel,
};
