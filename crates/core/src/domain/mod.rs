pub mod index;
pub mod key;
pub mod row;
pub mod section;
pub mod user;
