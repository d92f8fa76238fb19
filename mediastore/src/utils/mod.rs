pub mod cli;
pub mod db;
pub mod state;
pub mod validation;
