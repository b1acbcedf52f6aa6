pub mod draft;
pub mod lenient;
pub mod resume;
