mod assembly;
mod config;
mod hierarchy;
