//! Lean 4 checker integration.
//!
//! Talks to the leanprover-community/repl JSON protocol.
//!
//! ## Components
//!
//! - **types**: commands and replies of the REPL protocol
//! - **repl**: REPL subprocess management
//! - **scanner**: theorem discovery in Lean source
//! - **checker**: [`CheckerAdapter`](crate::checker::CheckerAdapter) over the REPL

pub mod checker;
pub mod repl;
pub mod scanner;
pub mod types;

pub use checker::{attach_goals, LeanReplChecker, LeanReplFactory};
pub use repl::{LeanRepl, LeanReplConfig};
pub use scanner::LeanScanner;
pub use types::{LeanCommand, LeanMessage, LeanResponse, MessageSeverity, Sorry, TacticInfo};
