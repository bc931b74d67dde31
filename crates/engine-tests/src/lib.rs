#![allow(dead_code)]

pub mod recovery;
pub mod utils;
