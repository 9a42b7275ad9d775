//! Compound parsing: ordered inner components feeding a mapper.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFuture, ParserHandle};
use crate::suggestion::Suggestion;

/// Intermediate values produced while an aggregate parses, keyed by the inner
/// component's name.
#[derive(Default)]
pub struct AggregateContext {
    values: Vec<(Arc<str>, Box<dyn Any + Send + Sync>)>,
}

impl AggregateContext {
    fn insert(&mut self, name: Arc<str>, value: Box<dyn Any + Send + Sync>) {
        self.values.push((name, value));
    }

    /// The value parsed for `name`, when present with type `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values
            .iter()
            .find(|(n, _)| &**n == name)
            .and_then(|(_, value)| value.downcast_ref::<T>())
    }

    /// Like [`get`](Self::get), failing when the value is absent.
    pub fn require<T: 'static>(&self, name: &str) -> Result<&T, ParseFailure> {
        self.get(name).ok_or(ParseFailure::AggregateMissingInput {
            component: Arc::from(name),
        })
    }
}

type Mapper<S, O> =
    Arc<dyn Fn(&CommandContext<S>, &AggregateContext) -> Result<O, ParseFailure> + Send + Sync>;

struct InnerComponent<S> {
    name: Arc<str>,
    parser: ParserHandle<S>,
}

/// Collects inner components, then [`map`](AggregateBuilder::map)s them into
/// an [`AggregateParser`].
pub struct AggregateBuilder<S> {
    components: Vec<InnerComponent<S>>,
}

impl<S> AggregateBuilder<S> {
    /// Appends an inner component.
    #[must_use]
    pub fn component<P>(mut self, name: impl Into<Arc<str>>, parser: P) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        self.components.push(InnerComponent {
            name: name.into(),
            parser: ParserHandle::new(parser),
        });
        self
    }

    /// Finishes the aggregate with the mapper producing the composite value.
    pub fn map<O>(
        self,
        mapper: impl Fn(&CommandContext<S>, &AggregateContext) -> Result<O, ParseFailure>
        + Send
        + Sync
        + 'static,
    ) -> AggregateParser<S, O> {
        AggregateParser {
            components: self.components,
            mapper: Arc::new(mapper),
        }
    }
}

/// A parser built from ordered inner components and a mapper.
///
/// Inner components parse sequentially; every intermediate value lands in an
/// [`AggregateContext`]. Once all components succeed the mapper turns the
/// intermediate values into the composite output. During suggestion walks the
/// intermediates land in the command context instead, so a later component's
/// provider can depend on what was already typed.
pub struct AggregateParser<S, O> {
    components: Vec<InnerComponent<S>>,
    mapper: Mapper<S, O>,
}

impl<S, O> AggregateParser<S, O> {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> AggregateBuilder<S> {
        AggregateBuilder {
            components: Vec::new(),
        }
    }
}

impl<S, O> ArgumentParser<S> for AggregateParser<S, O>
where
    S: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    type Output = O;

    fn parse(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<O, ParseFailure> {
        // The synchronous path only completes when every inner parser is
        // synchronous; the tree always goes through `parse_future`.
        self.parse_future(ctx, input)
            .now_or_never()
            .unwrap_or(Err(ParseFailure::Cancelled))
    }

    fn parse_future<'a>(
        &'a self,
        ctx: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParserFuture<'a, O> {
        Box::pin(async move {
            let snapshot = input.branch();
            let mut aggregate = AggregateContext::default();

            for component in &self.components {
                if input.is_empty() {
                    input.restore(snapshot);
                    return Err(ParseFailure::AggregateMissingInput {
                        component: Arc::clone(&component.name),
                    });
                }
                match component.parser.parse_erased(ctx, input).await {
                    Ok(value) => aggregate.insert(Arc::clone(&component.name), value),
                    Err(cause) => {
                        input.restore(snapshot);
                        return Err(ParseFailure::AggregateComponentFailure {
                            component: Arc::clone(&component.name),
                            cause: Box::new(cause),
                        });
                    }
                }
            }

            (self.mapper)(ctx, &aggregate).inspect_err(|_| input.restore(snapshot))
        })
    }

    fn suggest(&self, ctx: &mut CommandContext<S>, input: &CommandInput) -> Vec<Suggestion> {
        let mut probe = input.clone();
        for component in &self.components {
            // The cursor sits inside (or right before) this component's token.
            if probe.is_empty() || probe.token_ends_input() {
                return component.parser.suggest(ctx, &probe);
            }
            match component.parser.parse_erased(ctx, &mut probe).now_or_never() {
                Some(Ok(value)) => {
                    ctx.store_erased(
                        Arc::clone(&component.name),
                        component.parser.output().id(),
                        value,
                    );
                }
                _ => return Vec::new(),
            }
        }
        Vec::new()
    }

    fn token_count(&self) -> usize {
        self.components
            .iter()
            .map(|component| component.parser.token_count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InjectionRegistry;
    use crate::parser::numeric::NumberParser;
    use crate::parser::string::StringParser;

    fn ctx() -> CommandContext<()> {
        CommandContext::new((), Arc::from(""), Arc::new(InjectionRegistry::new()), false)
    }

    fn pair_parser() -> AggregateParser<(), (i32, String)> {
        AggregateParser::<(), (i32, String)>::builder()
            .component("number", NumberParser::<i32>::new())
            .component("string", StringParser::single())
            .map(|_ctx, aggregate| {
                let number = *aggregate.require::<i32>("number")?;
                let string = aggregate.require::<String>("string")?.clone();
                Ok((number, string))
            })
    }

    #[test]
    fn maps_component_results_into_a_composite() {
        let mut input = CommandInput::new("10 abc");
        let value = pair_parser().parse(&mut ctx(), &mut input).expect("parse");
        assert_eq!(value, (10, "abc".to_string()));
        assert!(input.is_empty());
    }

    #[test]
    fn component_failures_name_the_component() {
        let mut input = CommandInput::new("abc abc");
        let before = input.branch();
        let failure = pair_parser()
            .parse(&mut ctx(), &mut input)
            .expect_err("must fail");
        let ParseFailure::AggregateComponentFailure { component, cause } = failure else {
            panic!("expected component failure, got {failure:?}");
        };
        assert_eq!(&*component, "number");
        assert!(matches!(*cause, ParseFailure::NumberMalformed { .. }));
        assert_eq!(input.branch(), before);
    }

    #[test]
    fn exhausted_input_names_the_missing_component() {
        let mut input = CommandInput::new("");
        let failure = pair_parser()
            .parse(&mut ctx(), &mut input)
            .expect_err("must fail");
        assert!(matches!(
            failure,
            ParseFailure::AggregateMissingInput { component } if &*component == "number"
        ));
    }

    #[test]
    fn token_count_sums_components() {
        assert_eq!(ArgumentParser::<()>::token_count(&pair_parser()), 2);
    }

    #[test]
    fn suggestions_walk_to_the_cursor_component() {
        let parser = pair_parser();
        // Cursor inside the second component: ask the string parser (none),
        // but a bounded number under the cursor asks the number parser.
        let bounded: AggregateParser<(), ()> = AggregateParser::<(), ()>::builder()
            .component("number", NumberParser::<i32>::range(1, 3))
            .component("string", StringParser::single())
            .map(|_, _| Ok(()));
        let mut context = ctx();
        let input = CommandInput::new("");
        let texts: Vec<_> = bounded
            .suggest(&mut context, &input)
            .iter()
            .map(Suggestion::text)
            .map(String::from)
            .collect();
        assert_eq!(texts, ["1", "2", "3"]);

        // A parsed first component stores its value for later providers.
        let mut context = ctx();
        let input = CommandInput::new("10 ");
        assert!(parser.suggest(&mut context, &input).is_empty());
        assert_eq!(
            context.optional(&crate::key::ContextKey::<i32>::new("number")),
            Some(&10)
        );
    }
}
