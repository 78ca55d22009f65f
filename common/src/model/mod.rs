pub mod filter;
pub mod import;
pub mod option;
pub mod schema;
pub mod value;
