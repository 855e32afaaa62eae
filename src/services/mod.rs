pub mod attribution;
pub mod checkout;
pub mod orders;
