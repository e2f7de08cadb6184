pub mod b2_client;
pub mod gateway_service;
