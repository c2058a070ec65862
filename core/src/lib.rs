pub mod assistant;
pub mod dates;
pub mod db;
pub mod gemma;
pub mod inventory;
pub mod models;
pub mod photo;
pub mod recipes;
pub mod service;
pub mod shelf_life;
pub mod stats;
