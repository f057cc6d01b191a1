pub mod state;
pub mod authn;
