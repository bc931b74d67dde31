pub mod action;
pub mod batch;
pub mod fields;
pub mod row;
