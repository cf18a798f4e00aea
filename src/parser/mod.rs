pub mod description;
pub mod fields;
pub mod posted;
