//! Background workers

pub mod requests;
