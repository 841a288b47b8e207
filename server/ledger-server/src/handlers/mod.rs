pub mod health;
pub mod invoices;
pub mod ledger;
pub mod reports;
