pub mod infra;
pub mod state;
