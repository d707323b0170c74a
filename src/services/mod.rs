pub mod checkout;
pub mod email;
pub mod notifications;
