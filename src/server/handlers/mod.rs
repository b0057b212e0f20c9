// API处理器模块

pub mod account;
pub mod activity;
pub mod files;

pub use account::*;
pub use activity::*;
pub use files::*;
