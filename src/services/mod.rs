pub mod checkout;
pub mod pricing;
pub mod settlement;
