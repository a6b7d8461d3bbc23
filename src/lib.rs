//! An Art-Net 4 node implementation, as per [https://artisticlicence.com/WebSiteMaster/User%20Guides/art-net.pdf](https://artisticlicence.com/WebSiteMaster/User%20Guides/art-net.pdf).
//!
//! The crate is split in three layers:
//!
//! * the **codec**: the [ArtCommand] enum decodes and encodes every Art-Net
//!   opcode against its fixed byte layout,
//! * the **node**: a pure state machine ([node::Node]) that turns received
//!   packets, timer ticks and operator commands into a new state plus a list
//!   of [effects](node::Effect) — merging DMX sources, buffering for ArtSync,
//!   answering discovery, remote programming, firmware uploads and RDM,
//! * the **shell**: a tokio runtime ([shell::NodeRuntime]) that owns the UDP
//!   socket, feeds the state machine one event at a time and executes its
//!   effects.
//!
//! Using only the codec looks just like a plain protocol crate:
//!
//! ```no_run
//! use artnet_node::{ArtCommand, Output, Poll};
//! use std::net::{ToSocketAddrs, UdpSocket};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let socket = UdpSocket::bind(("0.0.0.0", 6454))?;
//! let broadcast_addr = ("255.255.255.255", 6454)
//!     .to_socket_addrs()?
//!     .next()
//!     .unwrap();
//! socket.set_broadcast(true)?;
//! let buff = ArtCommand::Poll(Poll::default()).write_to_buffer()?;
//! socket.send_to(&buff, broadcast_addr)?;
//!
//! loop {
//!     let mut buffer = [0u8; 1024];
//!     let (length, addr) = socket.recv_from(&mut buffer)?;
//!     let command = ArtCommand::from_buffer(&buffer[..length])?;
//!
//!     println!("Received {:?}", command);
//!     match command {
//!         ArtCommand::Poll(poll) => {
//!             // This will most likely be our own poll request, as this is broadcast to all devices on the network
//!         }
//!         ArtCommand::PollReply(reply) => {
//!             // This is an ArtNet node on the network. We can send commands to it like this:
//!             let command = ArtCommand::Output(Output {
//!                 data: vec![1, 2, 3, 4, 5].into(), // The data we're sending to the node
//!                 ..Output::default()
//!             });
//!             let bytes = command.write_to_buffer()?;
//!             socket.send_to(&bytes, addr)?;
//!         }
//!         _ => {}
//!     }
//! }
//! # }
//! ```
//!
//! Running a full node is a [node::Config] plus [shell::NodeRuntime::start].
#![deny(missing_docs)]

/// Re-export of the bitflags crate that this library uses
#[macro_use]
pub extern crate bitflags;
/// Re-export of the byteorder crate that this library uses
pub extern crate byteorder;

#[macro_use]
mod macros;
mod command;
pub mod convert;
mod enums;
mod error;
pub mod node;
mod port_address;
pub mod shell;

pub use crate::command::*;
pub use crate::enums::{ArtTalkToMe, GoodInput, GoodOutputA, PortType, Status1, Status2, Status3};
pub use crate::error::*;
pub use crate::port_address::PortAddress;
