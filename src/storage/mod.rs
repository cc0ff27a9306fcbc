mod schema;
mod watermark;

pub use schema::Database;
