pub mod debounce;
pub mod query;
