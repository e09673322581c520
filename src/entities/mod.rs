pub mod order;
pub mod order_item;
pub mod order_reservation;
pub mod product;
pub mod product_recipe;
pub mod warehouse_item;
pub mod warehouse_operation;
