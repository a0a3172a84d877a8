mod config;
mod message;
mod registry;
mod timestamp;
