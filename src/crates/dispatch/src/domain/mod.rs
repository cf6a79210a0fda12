//! Domain action handlers.
//!
//! - [`orders`]: in-process order store with versioned writes
//! - [`calendar`]: adapters over an external calendar provider
//! - [`mcp`]: that provider, reached over MCP

pub mod calendar;
pub mod mcp;
pub mod orders;

pub use calendar::{CalendarProvider, CalendarService, CalendarTool};
pub use mcp::McpCalendarProvider;
pub use orders::{InMemoryOrderStore, Order, OrderService, OrderStatus, OrderStore, VersionedOrder};
