pub mod book;
pub mod scan;
pub mod text_hit;
