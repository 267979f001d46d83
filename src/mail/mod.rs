pub mod gateway;
pub mod graph_client;
pub mod memory;
