//! Guest trial domain module.
//!
//! # Module Structure
//!
//! - `token`: opaque session token (`SessionToken`)
//! - `model`: `GuestSession`, `GuestMessage`, `GuestState`, `MessageRole`
//! - `cookie`: cookie transport for the token (`GuestCookie`)
//! - `store`: persistence contract (`GuestSessionStore`)

mod cookie;
mod model;
mod store;
mod token;

pub use cookie::GuestCookie;
pub use model::{GuestMessage, GuestSession, GuestState, MessageRole, NewGuestMessage};
pub use store::GuestSessionStore;
pub use token::{SessionToken, TOKEN_ENTROPY_BYTES};
