pub mod audit;
pub mod cache;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod events;
pub mod gateway;
pub mod inventory;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
