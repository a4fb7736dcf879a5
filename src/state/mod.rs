pub mod hash;
pub mod identity;
pub mod state_model;
pub mod traversal;
