#![allow(dead_code)]

pub mod app;
pub mod echo;
pub mod factory;

pub use app::TestApp;
pub use echo::EchoServer;
pub use factory::{Factory, TestAuth};
