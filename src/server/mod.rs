//! Feedback API: the HTTP front door for browser widgets.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────┐
//! │  Widget  │ ───────> │  server.rs  (axum Router, ServerConfig)      │
//! │ (browser)│ <─────── │    └─ api.rs  (handlers, AppState, ApiError) │
//! └──────────┘ WebSocket│         │                                    │
//!                       │         │ StoreHandle::call()                 │
//!                       │         v                                    │
//!                       │  store::WorkOrderStore  (markdown files)     │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! | Module   | Responsibility                                         |
//! |----------|--------------------------------------------------------|
//! | `api`    | Submission validation, listing, counts, actions        |
//! | `ws`     | `WsMessage` enum + `broadcast_message()` helper        |
//! | `server` | Router assembly, CORS, bind + graceful shutdown        |
//!
//! ## Typical Request Flow (widget submit)
//!
//! 1. `POST /_feedback` → `api::submit_work_order()`
//! 2. Disabled sentinel present → `403`; validation failures → `422`
//! 3. Headers (`X-Feedback-URL`, `Referer`, `X-Feedback-Method`,
//!    `User-Agent`, `X-Feedback-User`) and `_`-prefixed body fields become
//!    page context on a `NewWorkOrder`
//! 4. `WorkOrderStore::store()` writes `pending/<ts>_<slug>.md` (+ `.png`)
//! 5. `WsMessage::WorkOrderStored` is broadcast to WebSocket clients

pub mod api;
pub mod server;
pub mod ws;

pub use server::{ServerConfig, build_router, start_server};
