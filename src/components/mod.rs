pub mod composite;
pub mod gates;
pub mod latch;
