// src/models/mod.rs

pub mod equipment;
pub mod lab;
pub mod seating;

pub use equipment::*;
pub use lab::*;
pub use seating::*;
