pub mod basket;
pub mod order;
pub mod settlement;
