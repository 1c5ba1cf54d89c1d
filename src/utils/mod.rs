// src/utils/mod.rs

pub mod identity;
pub mod sampling;
