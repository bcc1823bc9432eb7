//! `agv-fleet`: the agents that run on the kernel.
//!
//! # Processes
//!
//! ```text
//!  TaskGenerator ──put──▶ global_tasks ──▶ FleetManager / Auctioneer
//!                                               │ local queue or inbox
//!                                               ▼
//!                         Agv.collector ──▶ local_queues[r] ──▶ Agv.main
//!                                                                  │
//!                                      executing ◀─────────────────┘
//! ```
//!
//! Every arrow is a [`Store`](agv_kernel::Store) in the [`KnowledgeBase`];
//! agents never share anything else.  A transport task is owned by exactly
//! one store at any instant.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`task`]      | `Task`, `TaskKind`, `Message`, `Bid`, `Robot`, `RobotStatus` |
//! | [`knowledge`] | `KnowledgeBase` (typed stores), `Completion`, `Rejection` |
//! | [`params`]    | `AgvParams`, `ChargePolicy`, `InsertionPolicy`            |
//! | [`agv`]       | `Agv`: main loop, status monitor, message collector       |
//! | [`manager`]   | `PeriodicAllocator`, `OptimalAllocator`, `NearestAvailableAllocator`, `FleetManager` |
//! | [`auction`]   | `Auctioneer`: announce / bid / assign relay               |
//! | [`generator`] | `OrderRecord`, `TaskGenerator`, `read_order_records`      |
//! | [`error`]     | `FleetError`, `FleetResult<T>`                            |

pub mod agv;
pub mod auction;
pub mod error;
pub mod generator;
pub mod knowledge;
pub mod manager;
pub mod params;
pub mod task;


pub use agv::Agv;
pub use auction::Auctioneer;
pub use error::{FleetError, FleetResult};
pub use generator::{read_order_records, OrderRecord, TaskGenerator};
pub use knowledge::{Completion, KnowledgeBase, Rejection};
pub use manager::{
    AllocationReport, FleetManager, NearestAvailableAllocator, OptimalAllocator, PeriodicAllocator,
};
pub use params::{AgvParams, ChargePolicy, InsertionPolicy};
pub use task::{Bid, Message, Robot, RobotStatus, Task, TaskKind};
