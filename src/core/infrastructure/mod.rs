pub mod api_client;
pub mod inventory_client;
