pub mod classify;
pub mod composite;
pub mod mask;
pub mod pack;
pub mod push_pull;
pub mod vector;
