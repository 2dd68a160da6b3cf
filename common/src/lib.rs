#[macro_use]
pub extern crate failure;
pub extern crate async_std;

pub mod errors;
pub mod task;
