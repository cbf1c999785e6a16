pub mod content_search;
pub mod library_service;
pub mod pdf_service;
pub mod scanner;
pub mod settings_service;

#[cfg(test)]
pub(crate) mod test_support;
