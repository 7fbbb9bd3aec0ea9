pub mod page;
pub mod window;
