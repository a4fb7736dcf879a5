pub mod adapter;
pub mod appium;
pub mod mock;
