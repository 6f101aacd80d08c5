pub mod app;
pub mod form;
