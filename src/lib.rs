//! A half-duplex DMX512/RDM (ANSI E1.20) responder and controller driver.
//!
//! Applications bring their own [`hal::Uart`], [`hal::Timer`],
//! [`hal::IrqControl`] and [`synch::TaskControl`] implementations for their
//! target, install a [`driver::Port`], and drive it from task context with
//! [`driver::Port::service_once`] (responder) or [`driver::Port::request`]/
//! [`driver::Port::discover`] (controller). The ISR pump
//! ([`driver::Port::on_uart_interrupt`]/[`driver::Port::on_timer_interrupt`])
//! must be wired to the platform's real interrupt vectors.
#![no_std]
#![warn(rust_2018_idioms)]

extern crate alloc;

pub mod codec;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod hal;
pub mod pd;
pub mod synch;
pub mod uid;

pub use config::DmxConfig;
pub use controller::ControllerReply;
pub use driver::Port;
pub use driver::responder::DispatchOutcome;
pub use error::{DmxError, DmxResult, ProtocolFault};
pub use uid::Uid;
