//! Model invoker adapters

mod loopback;

pub use loopback::LoopbackInvoker;
