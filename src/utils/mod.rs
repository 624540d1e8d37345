pub mod retry;
pub mod security;
