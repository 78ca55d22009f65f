//! Types shared between the grid backend and any client speaking its JSON contract.

pub mod model;
pub mod requests;
pub mod responses;
