pub mod columns;
pub mod records;
pub mod schema;
pub mod table;
