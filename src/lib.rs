//! # tannoy
//!
//! **Tannoy** is an in-process event bus with priority-ordered dispatch,
//! unified sync/async handlers, a cancellation/outcome protocol, and
//! lifecycle-bound registration of subscriber instances.
//!
//! It decouples the subsystems of a host application (originally: the
//! gameplay, rendering, and UI layers of a 2D platformer) so that they only
//! ever share payload types and a bus — never references to each other.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  producers                         Bus (registry)
//! ┌────────────┐  publish(&mut E)  ┌──────────────────────────────────┐
//! │ physics    │ ────────────────► │ TypeId → ListenerList            │
//! │ items      │                   │   records + cached sorted        │
//! │ UI, ...    │ ◄──────────────── │   snapshot (Arc<[HandlerRecord]>)│
//! └────────────┘   Envelope        └──────┬───────────────────────────┘
//!                 (canceled?,             │ invoke in priority order,
//!                  outcome, ran)          ▼ one at a time, awaited
//!                                  handler 1 ─► handler 2 ─► handler N
//!                                  (Err/panic logged, dispatch continues)
//!
//!  lifecycle (any thread)                 designated context
//! ┌──────────────────────────┐          ┌──────────────────────────┐
//! │ attach(Arc<S>) / detach  │ ──queue─►│ Registrar::drain()       │
//! │ OwnerGuard drop          │          │  → subscribe per method  │
//! └──────────────────────────┘          │  → unsubscribe_owner     │
//!                                       └──────────────────────────┘
//! ```
//!
//! ### Dispatch
//! ```text
//! publish(&mut E)
//!   ├─► snapshot = sorted listeners of E   (cached until next mutation)
//!   ├─► envelope.listeners = descriptors   (introspection)
//!   └─► for each record:
//!         ├─► phase advances to the record's bucket (never regresses)
//!         ├─► canceled && !receive_canceled ─► skip
//!         └─► invoke, fully awaited; Err/panic → log, continue
//!   returns Envelope: delivered? canceled? outcome?
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------------|--------------------------------------------|
//! | **Payloads**      | Declare event types with fixed capabilities (cancelable, outcome). | [`Event`], [`Outcome`]                     |
//! | **Dispatch**      | Priority-ordered, strictly sequential, panic-isolated delivery.    | [`Bus`], [`Envelope`], [`Priority`]        |
//! | **Handlers**      | Sync closures, async closures, or stateful trait objects.          | [`Handler`], [`SubscribeOpts`]             |
//! | **Discovery**     | Declarative per-type handler tables, lifecycle-bound registration. | [`Subscriber`], [`Registrar`], [`OwnerGuard`] |
//! | **Diagnostics**   | Ordered listener dumps, per-type and global counters.              | [`HandlerInfo`], [`Bus::listeners`]        |
//! | **Errors**        | Typed capability violations and handler failures.                  | [`BusError`], [`HandlerError`]             |
//!
//! ## Example
//! ```rust
//! use tannoy::{Bus, Envelope, Event, HandlerError, Priority};
//!
//! struct CoinCollected { pub value: u32 }
//! impl Event for CoinCollected {}
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = Bus::new();
//!
//!     bus.subscribe(Priority::High, |ev: &mut CoinCollected, _env: &mut Envelope| {
//!         println!("jingle for {} coins", ev.value);
//!         Ok::<_, HandlerError>(())
//!     });
//!
//!     let receipt = bus.publish(&mut CoinCollected { value: 5 }).await;
//!     assert!(receipt.delivered());
//! }
//! ```

mod bus;
mod config;
mod discovery;
mod error;
mod events;

// ---- Public re-exports ----

pub use bus::{global, Bus, Handler, HandlerId, HandlerInfo, OwnerId};
pub use config::BusConfig;
pub use discovery::{HandlerTable, OwnerGuard, Registrar, Subscriber};
pub use error::{BusError, HandlerError};
pub use events::{Envelope, Event, EventId, Outcome, Priority, SubscribeOpts};
