//! # Brazier
//!
//! A host-agnostic command dispatch framework: declare structured commands,
//! parse free-form text into typed argument bindings, produce context-aware
//! completion suggestions, and dispatch execution to registered handlers.
//!
//! The host supplies two things per invocation: a sender value and an input
//! string. Everything else — the command tree, the parser pipeline, the
//! coordinator, permissions, and exception routing — lives behind the
//! [`CommandManager`](manager::CommandManager) façade:
//!
//! ```
//! use brazier::command::{Command, HandlerError};
//! use brazier::context::CommandContext;
//! use brazier::key::ContextKey;
//! use brazier::manager::{CommandManager, ManagerSettings};
//! use brazier::parser::numeric::NumberParser;
//!
//! # futures::executor::block_on(async {
//! let manager = CommandManager::<String>::new(ManagerSettings::default());
//! let command = Command::builder("add")
//!     .required("amount", NumberParser::<i64>::range(1, 100))
//!     .handler(|ctx: &mut CommandContext<String>| -> Result<(), HandlerError> {
//!         let amount = ctx.get(&ContextKey::<i64>::new("amount"));
//!         println!("{} adds {amount}", ctx.sender());
//!         Ok(())
//!     })
//!     .build()?;
//! manager.register(command)?;
//! manager.lock_registration();
//!
//! manager.execute("console".to_string(), "add 17").await?;
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod command;
pub mod component;
pub mod context;
pub mod error;
pub mod exception;
pub mod execution;
pub mod input;
pub mod key;
pub mod manager;
pub mod parser;
pub mod permission;
pub mod suggestion;
pub mod syntax;
pub mod tree;

pub use command::{Command, CommandBuilder, CommandHandler, HandlerError};
pub use component::CommandComponent;
pub use context::CommandContext;
pub use error::{DispatchError, ExceptionKind, ParseFailure, RegistrationError};
pub use input::CommandInput;
pub use key::ContextKey;
pub use manager::{CommandManager, ManagerSettings, RegistrationState};
pub use suggestion::Suggestion;
