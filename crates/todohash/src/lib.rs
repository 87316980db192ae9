#![doc = include_str!("../README.md")]

mod aggregate;
mod error;
mod parallel;
mod record;
mod scope;
mod service;
mod store;
mod work;

pub use crate::aggregate::*;
pub use crate::error::*;
pub use crate::parallel::*;
pub use crate::record::*;
pub use crate::scope::*;
pub use crate::service::*;
pub use crate::store::*;
pub use crate::work::*;
