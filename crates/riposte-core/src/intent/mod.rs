//! Intents: what the slow planner asks the fast executor to do.
//!
//! The path of a reply through this module:
//!
//! 1. [`parse_reply`] pulls a [`RawIntent`] and an optional reasoning note
//!    out of free reply text
//! 2. [`IntentPacket::validate`] checks the tick echo and every range
//! 3. [`IntentCell::offer`] applies the staleness rule ([`adjudicate`]) and
//!    swaps the packet in atomically
//!
//! [`IntentResolver`] drives the three steps for each pipeline completion
//! and keeps the counters. Readers hold an [`IntentReader`] and never block.
//!
//! # Example
//!
//! ```
//! use riposte_core::intent::{IntentCell, IntentPacket, RawIntent, Verdict};
//! use riposte_core::snapshot::TickId;
//! use tokio::time::Instant;
//!
//! let cell = IntentCell::new();
//! let raw = RawIntent { dx: Some(0.5), tick_id: Some(9), ..RawIntent::default() };
//! let packet = IntentPacket::validate(&raw, TickId::new(9)).unwrap();
//!
//! assert_eq!(cell.offer(packet, TickId::new(30), Instant::now()), Verdict::Accept);
//! assert_eq!(cell.current().tick_id(), TickId::new(9));
//! ```

mod cell;
mod packet;
mod parse;
mod resolver;
mod staleness;

pub use cell::{CurrentIntent, IntentCell, IntentReader};
pub use packet::{Goal, IntentPacket, RawIntent, ShootSignal};
pub use parse::{parse_reply, OracleReply};
pub use resolver::{IntentResolver, Resolution};
pub use staleness::{adjudicate, Verdict};
