pub mod serve;
pub mod view;
