//! Failure taxonomy for parsing, registration, and dispatch.
//!
//! Parser failures are values, not panics: they rewind input and let the tree
//! try sibling candidates. Registration failures abort `register` and leave
//! the tree untouched. Dispatch failures are what the host ultimately sees,
//! after routing through the exception controller.

use std::sync::Arc;

use thiserror::Error;

/// A caption key plus its placeholder values.
///
/// Every error kind can be rendered by a host-side localizer from its caption;
/// the library never formats user-facing text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    /// Stable dotted key, e.g. `argument.parse.failure.number`.
    pub key: &'static str,
    /// `(placeholder, value)` pairs referenced by the caption text.
    pub placeholders: Vec<(&'static str, String)>,
}

impl Caption {
    fn new(key: &'static str) -> Self {
        Self {
            key,
            placeholders: Vec::new(),
        }
    }

    fn with(mut self, placeholder: &'static str, value: impl Into<String>) -> Self {
        self.placeholders.push((placeholder, value.into()));
        self
    }
}

/// A failure produced while consuming input through a parser.
///
/// Local by contract: a parser returning one of these has restored its input
/// branch, so the cursor is exactly where it was before the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// A read was attempted on exhausted input.
    #[error("no input was provided")]
    NoInputProvided,
    /// A quoted token was opened but never closed.
    #[error("unterminated quoted string")]
    UnterminatedQuote,
    /// A literal component did not match the next token.
    #[error("unknown literal '{input}', expected one of: {}", allowed.join(", "))]
    UnknownLiteral {
        /// The offending token.
        input: String,
        /// The literal names (and aliases) that would have matched.
        allowed: Vec<String>,
    },
    /// A numeric token was outside the component's bounds.
    #[error("number {input} is outside the range {min}..={max}")]
    NumberOutOfRange {
        /// The offending token.
        input: String,
        /// Lower bound, rendered.
        min: String,
        /// Upper bound, rendered.
        max: String,
    },
    /// A token could not be read as a number at all.
    #[error("'{input}' is not a valid number")]
    NumberMalformed {
        /// The offending token.
        input: String,
    },
    /// A token could not be read as a boolean.
    #[error("'{input}' is not a valid boolean")]
    BooleanMalformed {
        /// The offending token.
        input: String,
    },
    /// A token was not exactly one character.
    #[error("'{input}' is not a single character")]
    CharMalformed {
        /// The offending token.
        input: String,
    },
    /// A token matched no variant of an enumerated argument.
    #[error("'{input}' is not one of: {}", variants.join(", "))]
    EnumUnknown {
        /// The offending token.
        input: String,
        /// Accepted variant names.
        variants: Vec<String>,
    },
    /// A token was not a hyphenated 8-4-4-4-12 UUID.
    #[error("'{input}' is not a valid UUID")]
    UuidMalformed {
        /// The offending token.
        input: String,
    },
    /// A token was not a `<count><unit>` duration sequence.
    #[error("'{input}' is not a valid duration")]
    DurationMalformed {
        /// The offending token.
        input: String,
    },
    /// A flag region failed to parse.
    #[error(transparent)]
    Flag(#[from] FlagFailure),
    /// Input ran out before a required aggregate component.
    #[error("missing input for component '{component}'")]
    AggregateMissingInput {
        /// Name of the unsatisfied inner component.
        component: Arc<str>,
    },
    /// An aggregate component failed to parse.
    #[error("component '{component}' failed: {cause}")]
    AggregateComponentFailure {
        /// Name of the failing inner component.
        component: Arc<str>,
        /// The inner failure.
        cause: Box<ParseFailure>,
    },
    /// Both sides of an either parser failed; both causes are retained.
    #[error("no alternative matched (primary: {primary}; fallback: {fallback})")]
    EitherFailed {
        /// Failure of the primary parser.
        primary: Box<ParseFailure>,
        /// Failure of the fallback parser.
        fallback: Box<ParseFailure>,
    },
    /// The invocation was cancelled while this parser was suspended.
    #[error("parse was cancelled")]
    Cancelled,
}

/// The ways a flag region can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagFailure {
    /// No registered flag matches the given name or alias.
    #[error("unknown flag '{0}'")]
    Unknown(String),
    /// A value-bearing flag was present without a value.
    #[error("flag '--{0}' requires a value")]
    MissingValue(String),
    /// The same flag appeared twice.
    #[error("duplicate flag '--{0}'")]
    Duplicate(String),
    /// A value-bearing flag appeared inside a `-xyz` bundle.
    #[error("flag '-{0}' takes a value and cannot be bundled")]
    BundledNonPresence(char),
}

/// A failure raised while registering a command.
///
/// Fatal to the `register` call; the tree is observably unchanged afterwards.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// Inserting the command would create sibling nodes the parser cannot
    /// disambiguate (a second variable, or an optional beside a variable).
    #[error("ambiguous insertion under '{parent}': '{node}' conflicts with siblings [{}]", siblings.join(", "))]
    AmbiguousNode {
        /// Name of the parent node.
        parent: String,
        /// Name of the node being inserted.
        node: String,
        /// Names of the conflicting siblings.
        siblings: Vec<String>,
    },
    /// The manager has left the `Registering` state.
    #[error("registration is locked")]
    RegistrationLocked,
    /// The command itself violates a structural invariant.
    #[error("invalid command: {reason}")]
    InvalidCommand {
        /// Human-readable description of the violated invariant.
        reason: String,
    },
}

impl RegistrationError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            reason: reason.into(),
        }
    }
}

/// The terminal failure of an `execute` or `suggest` invocation.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No top-level literal matched the first token.
    #[error("unknown command '{input}'")]
    NoSuchCommand {
        /// The first token of the input.
        input: String,
    },
    /// The walk stopped mid-tree; carries the usage of the deepest node.
    #[error("invalid syntax, expected: {correct_syntax}")]
    InvalidSyntax {
        /// Computed correct syntax for the deepest reached node.
        correct_syntax: String,
    },
    /// A node on the matched path denied permission.
    #[error("missing permission '{permission}'")]
    NoPermission {
        /// The permission that was denied.
        permission: String,
    },
    /// The owning command rejected this sender.
    #[error("this command cannot be used by sender '{requirement}'")]
    InvalidSender {
        /// Name of the unsatisfied sender requirement.
        requirement: String,
    },
    /// Input-level failure before any component was reached.
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    /// A component's parser rejected its input and no sibling recovered.
    #[error("could not parse argument '{component}': {failure}")]
    ArgumentParse {
        /// Name of the failing component.
        component: String,
        /// The parser's failure.
        failure: ParseFailure,
    },
    /// The handler (or a postprocessor) returned an error.
    #[error("command execution failed: {source}")]
    Execution {
        /// The wrapped handler error.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// The invocation future was dropped before completion.
    #[error("execution was cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Wraps a handler-thrown error.
    pub fn execution(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Execution {
            source: Arc::new(source),
        }
    }
}

/// Exception kinds, arranged in a small hierarchy for handler resolution.
///
/// `Dispatch` is the root; every parse-level kind refines `Parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Root kind: any dispatch failure.
    Dispatch,
    /// Any parser failure.
    Parse,
    /// [`ParseFailure::NoInputProvided`].
    NoInput,
    /// [`ParseFailure::UnterminatedQuote`].
    UnterminatedQuote,
    /// [`ParseFailure::UnknownLiteral`].
    UnknownLiteral,
    /// Numeric failures (malformed or out of range).
    Number,
    /// [`ParseFailure::BooleanMalformed`].
    Boolean,
    /// [`ParseFailure::CharMalformed`].
    Char,
    /// [`ParseFailure::EnumUnknown`].
    Enum,
    /// [`ParseFailure::UuidMalformed`].
    Uuid,
    /// [`ParseFailure::DurationMalformed`].
    Duration,
    /// Any [`FlagFailure`].
    Flag,
    /// Aggregate component failures.
    Aggregate,
    /// [`ParseFailure::EitherFailed`].
    Either,
    /// [`DispatchError::NoSuchCommand`].
    NoSuchCommand,
    /// [`DispatchError::InvalidSyntax`].
    InvalidSyntax,
    /// [`DispatchError::NoPermission`].
    NoPermission,
    /// [`DispatchError::InvalidSender`].
    InvalidSender,
    /// [`DispatchError::Execution`].
    Execution,
    /// [`DispatchError::Cancelled`] or [`ParseFailure::Cancelled`].
    Cancelled,
}

impl ExceptionKind {
    /// The kind this one refines, or `None` for the root.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Dispatch => None,
            Self::Parse
            | Self::NoSuchCommand
            | Self::InvalidSyntax
            | Self::NoPermission
            | Self::InvalidSender
            | Self::Execution
            | Self::Cancelled => Some(Self::Dispatch),
            _ => Some(Self::Parse),
        }
    }
}

impl ParseFailure {
    /// The exception kind of this failure.
    #[must_use]
    pub const fn kind(&self) -> ExceptionKind {
        match self {
            Self::NoInputProvided => ExceptionKind::NoInput,
            Self::UnterminatedQuote => ExceptionKind::UnterminatedQuote,
            Self::UnknownLiteral { .. } => ExceptionKind::UnknownLiteral,
            Self::NumberOutOfRange { .. } | Self::NumberMalformed { .. } => ExceptionKind::Number,
            Self::BooleanMalformed { .. } => ExceptionKind::Boolean,
            Self::CharMalformed { .. } => ExceptionKind::Char,
            Self::EnumUnknown { .. } => ExceptionKind::Enum,
            Self::UuidMalformed { .. } => ExceptionKind::Uuid,
            Self::DurationMalformed { .. } => ExceptionKind::Duration,
            Self::Flag(_) => ExceptionKind::Flag,
            Self::AggregateMissingInput { .. } | Self::AggregateComponentFailure { .. } => {
                ExceptionKind::Aggregate
            }
            Self::EitherFailed { .. } => ExceptionKind::Either,
            Self::Cancelled => ExceptionKind::Cancelled,
        }
    }

    /// The caption describing this failure.
    #[must_use]
    pub fn caption(&self) -> Caption {
        match self {
            Self::NoInputProvided => Caption::new("input.none"),
            Self::UnterminatedQuote => Caption::new("input.unterminated_quote"),
            Self::UnknownLiteral { input, allowed } => Caption::new("argument.literal.unknown")
                .with("input", input.clone())
                .with("allowed", allowed.join(", ")),
            Self::NumberOutOfRange { input, min, max } => {
                Caption::new("argument.number.out_of_range")
                    .with("input", input.clone())
                    .with("min", min.clone())
                    .with("max", max.clone())
            }
            Self::NumberMalformed { input } => {
                Caption::new("argument.number.malformed").with("input", input.clone())
            }
            Self::BooleanMalformed { input } => {
                Caption::new("argument.boolean.malformed").with("input", input.clone())
            }
            Self::CharMalformed { input } => {
                Caption::new("argument.char.malformed").with("input", input.clone())
            }
            Self::EnumUnknown { input, variants } => Caption::new("argument.enum.unknown")
                .with("input", input.clone())
                .with("variants", variants.join(", ")),
            Self::UuidMalformed { input } => {
                Caption::new("argument.uuid.malformed").with("input", input.clone())
            }
            Self::DurationMalformed { input } => {
                Caption::new("argument.duration.malformed").with("input", input.clone())
            }
            Self::Flag(flag) => flag.caption(),
            Self::AggregateMissingInput { component } => {
                Caption::new("argument.aggregate.missing").with("component", component.to_string())
            }
            Self::AggregateComponentFailure { component, cause } => {
                Caption::new("argument.aggregate.component")
                    .with("component", component.to_string())
                    .with("cause", cause.to_string())
            }
            Self::EitherFailed { primary, fallback } => Caption::new("argument.either.failed")
                .with("primary", primary.to_string())
                .with("fallback", fallback.to_string()),
            Self::Cancelled => Caption::new("dispatch.cancelled"),
        }
    }
}

impl FlagFailure {
    fn caption(&self) -> Caption {
        match self {
            Self::Unknown(name) => Caption::new("argument.flag.unknown").with("flag", name.clone()),
            Self::MissingValue(name) => {
                Caption::new("argument.flag.missing_value").with("flag", name.clone())
            }
            Self::Duplicate(name) => {
                Caption::new("argument.flag.duplicate").with("flag", name.clone())
            }
            Self::BundledNonPresence(short) => {
                Caption::new("argument.flag.bundled").with("flag", short.to_string())
            }
        }
    }
}

impl DispatchError {
    /// The exception kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ExceptionKind {
        match self {
            Self::NoSuchCommand { .. } => ExceptionKind::NoSuchCommand,
            Self::InvalidSyntax { .. } => ExceptionKind::InvalidSyntax,
            Self::NoPermission { .. } => ExceptionKind::NoPermission,
            Self::InvalidSender { .. } => ExceptionKind::InvalidSender,
            Self::Parse(failure) | Self::ArgumentParse { failure, .. } => failure.kind(),
            Self::Execution { .. } => ExceptionKind::Execution,
            Self::Cancelled => ExceptionKind::Cancelled,
        }
    }

    /// The caption describing this error.
    #[must_use]
    pub fn caption(&self) -> Caption {
        match self {
            Self::NoSuchCommand { input } => {
                Caption::new("dispatch.no_such_command").with("input", input.clone())
            }
            Self::InvalidSyntax { correct_syntax } => {
                Caption::new("dispatch.invalid_syntax").with("syntax", correct_syntax.clone())
            }
            Self::NoPermission { permission } => {
                Caption::new("dispatch.no_permission").with("permission", permission.clone())
            }
            Self::InvalidSender { requirement } => {
                Caption::new("dispatch.invalid_sender").with("requirement", requirement.clone())
            }
            Self::Parse(failure) => failure.caption(),
            Self::ArgumentParse { component, failure } => {
                let mut caption = failure.caption();
                caption.placeholders.push(("component", component.clone()));
                caption
            }
            Self::Execution { source } => {
                Caption::new("dispatch.execution").with("cause", source.to_string())
            }
            Self::Cancelled => Caption::new("dispatch.cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_hierarchy_roots_at_dispatch() {
        let mut kind = ExceptionKind::Number;
        let mut hops = 0;
        while let Some(parent) = kind.parent() {
            kind = parent;
            hops += 1;
            assert!(hops < 4, "hierarchy must be shallow and acyclic");
        }
        assert_eq!(kind, ExceptionKind::Dispatch);
    }

    #[test]
    fn parse_failure_kinds() {
        assert_eq!(
            ParseFailure::NoInputProvided.kind(),
            ExceptionKind::NoInput
        );
        assert_eq!(
            ParseFailure::Flag(FlagFailure::Duplicate("print".into())).kind(),
            ExceptionKind::Flag
        );
        assert_eq!(
            ParseFailure::EitherFailed {
                primary: Box::new(ParseFailure::NoInputProvided),
                fallback: Box::new(ParseFailure::NoInputProvided),
            }
            .kind(),
            ExceptionKind::Either
        );
    }

    #[test]
    fn captions_carry_placeholders() {
        let caption = ParseFailure::NumberOutOfRange {
            input: "101".into(),
            min: "1".into(),
            max: "100".into(),
        }
        .caption();
        assert_eq!(caption.key, "argument.number.out_of_range");
        assert!(caption.placeholders.contains(&("max", "100".into())));
    }
}
