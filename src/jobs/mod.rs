pub mod expiry;
