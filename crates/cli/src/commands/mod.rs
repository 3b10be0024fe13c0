pub mod accounts;
pub mod scan;
