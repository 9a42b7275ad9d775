//! The demonstration command set.

use std::time::Duration;

use brazier::command::{Command, CommandHandler, HandlerError, HandlerFuture};
use brazier::context::CommandContext;
use brazier::error::RegistrationError;
use brazier::key::ContextKey;
use brazier::manager::CommandManager;
use brazier::parser::duration::DurationParser;
use brazier::parser::enumeration::{EnumParser, NamedVariant};
use brazier::parser::flag::FlagDef;
use brazier::parser::numeric::NumberParser;
use brazier::parser::string::StringParser;

use crate::{CommandList, ConsoleSender};

/// A small closed enum to demonstrate variant parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weather {
    Clear,
    Rain,
    Thunder,
}

impl NamedVariant for Weather {
    fn variants() -> &'static [Self] {
        &[Self::Clear, Self::Rain, Self::Thunder]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Thunder => "thunder",
        }
    }
}

/// A handler that suspends, demonstrating future-bearing execution.
struct SleepHandler;

impl CommandHandler<ConsoleSender> for SleepHandler {
    fn execute<'a>(&'a self, ctx: &'a mut CommandContext<ConsoleSender>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let duration = *ctx.get(&ContextKey::<Duration>::new("duration"));
            tokio::time::sleep(duration.min(Duration::from_secs(5))).await;
            println!("slept {duration:?}");
            Ok(())
        })
    }
}

/// Registers every demonstration command.
pub fn register_all(manager: &CommandManager<ConsoleSender>) -> Result<(), RegistrationError> {
    manager.register(
        Command::builder("echo|e")
            .required("message", StringParser::greedy())
            .permission("demo.echo")
            .description("Prints the rest of the line back.")
            .handler(|ctx: &mut CommandContext<ConsoleSender>| -> Result<(), HandlerError> {
                println!("{}", ctx.get(&ContextKey::<String>::new("message")));
                Ok(())
            })
            .build()?,
    )?;

    manager.register(
        manager
            .command_builder("add")
            .syntax("<a:long> <b:long>")
            .permission("demo.add")
            .description("Adds two integers.")
            .handler(|ctx: &mut CommandContext<ConsoleSender>| -> Result<(), HandlerError> {
                let a = *ctx.get(&ContextKey::<i64>::new("a"));
                let b = *ctx.get(&ContextKey::<i64>::new("b"));
                println!("{a} + {b} = {}", a.saturating_add(b));
                Ok(())
            })
            .build()?,
    )?;

    manager.register(
        Command::builder("say")
            .required("message", StringParser::greedy_flag_yielding())
            .flags(vec![
                FlagDef::presence("loud").with_short('l'),
                FlagDef::valued("times", NumberParser::<u8>::range(1, 10)).with_short('t'),
            ])
            .permission("demo.say")
            .description("Prints a message, optionally loudly and repeatedly.")
            .handler(|ctx: &mut CommandContext<ConsoleSender>| -> Result<(), HandlerError> {
                let message = ctx.get(&ContextKey::<String>::new("message")).clone();
                let message = if ctx.flags().is_present("loud") {
                    message.to_uppercase()
                } else {
                    message
                };
                let times = ctx.flags().value::<u8>("times").copied().unwrap_or(1);
                for _ in 0..times {
                    println!("{message}");
                }
                Ok(())
            })
            .build()?,
    )?;

    manager.register(
        Command::builder("weather")
            .required("kind", EnumParser::<Weather>::new())
            .optional_with_default("duration", DurationParser, "1h")
            .permission("demo.weather")
            .description("Pretends to change the weather.")
            .handler(|ctx: &mut CommandContext<ConsoleSender>| -> Result<(), HandlerError> {
                let kind = *ctx.get(&ContextKey::<Weather>::new("kind"));
                let duration = *ctx.get(&ContextKey::<Duration>::new("duration"));
                println!("weather set to {kind:?} for {duration:?}");
                Ok(())
            })
            .build()?,
    )?;

    manager.register(
        Command::builder("sleep")
            .required("duration", DurationParser)
            .permission("demo.sleep")
            .description("Sleeps for the given duration (capped at 5s).")
            .handler(SleepHandler)
            .build()?,
    )?;

    manager.register(
        Command::builder("help")
            .description("Lists every command.")
            .handler(|ctx: &mut CommandContext<ConsoleSender>| -> Result<(), HandlerError> {
                let Some(CommandList(entries)) = ctx.inject() else {
                    return Err("command listing unavailable".into());
                };
                for (syntax, description) in entries {
                    println!("{syntax:<40} {description}");
                }
                Ok(())
            })
            .build()?,
    )?;

    Ok(())
}
