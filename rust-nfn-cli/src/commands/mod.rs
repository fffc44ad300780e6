pub mod fetch;
pub mod forwarder;
pub mod mgmt;
pub mod repo;
