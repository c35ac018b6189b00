// Serial module - Serial link implementations
pub mod client;
pub mod link;
pub mod mock;

pub use client::{list_ports, PortSummary, SerialPortLink};
pub use link::SerialLink;
pub use mock::{MockHandle, MockSerialLink};
