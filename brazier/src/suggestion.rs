//! Completion suggestions and the provider capability.

use crate::context::CommandContext;
use crate::input::CommandInput;

/// One candidate completion for the token under the cursor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Suggestion {
    text: String,
    tooltip: Option<String>,
}

impl Suggestion {
    /// Creates a plain suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tooltip: None,
        }
    }

    /// Attaches hover text.
    #[must_use]
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// The completion text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The hover text, if any.
    #[must_use]
    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }
}

impl<T: Into<String>> From<T> for Suggestion {
    fn from(text: T) -> Self {
        Self::new(text)
    }
}

/// A source of completions for one component.
///
/// Providers may consult values parsed earlier in the walk through the
/// context, so a value suggestion can depend on the rule it belongs to.
pub trait SuggestionProvider<S>: Send + Sync {
    /// Suggestions for the remaining input.
    fn suggestions(&self, ctx: &CommandContext<S>, input: &CommandInput) -> Vec<Suggestion>;
}

impl<S, F> SuggestionProvider<S> for F
where
    F: Fn(&CommandContext<S>, &CommandInput) -> Vec<Suggestion> + Send + Sync,
{
    fn suggestions(&self, ctx: &CommandContext<S>, input: &CommandInput) -> Vec<Suggestion> {
        self(ctx, input)
    }
}

impl<S> SuggestionProvider<S> for std::sync::Arc<dyn SuggestionProvider<S>> {
    fn suggestions(&self, ctx: &CommandContext<S>, input: &CommandInput) -> Vec<Suggestion> {
        (**self).suggestions(ctx, input)
    }
}

/// A provider that always offers the same fixed set.
pub struct StaticSuggestions(Vec<Suggestion>);

impl StaticSuggestions {
    /// Builds a provider from anything convertible to suggestions.
    pub fn new<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Suggestion>,
    {
        Self(entries.into_iter().map(Into::into).collect())
    }
}

impl<S> SuggestionProvider<S> for StaticSuggestions {
    fn suggestions(&self, _ctx: &CommandContext<S>, _input: &CommandInput) -> Vec<Suggestion> {
        self.0.clone()
    }
}
