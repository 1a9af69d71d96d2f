//! Command Module
//!
//! Text command interface used by the `ttlkv` shell.
//!
//! ## Architecture
//!
//! ```text
//! Input line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  split_args()   │  (quote-aware tokenizer)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (store module)
//! └─────────────────┘
//! ```

pub mod handler;
pub mod reply;

pub use handler::{split_args, CommandHandler};
pub use reply::Reply;
