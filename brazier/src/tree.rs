//! The command tree: registered commands superimposed over shared prefixes.
//!
//! Nodes are immutable and `Arc`-shared. Insertion path-copies the spine it
//! touches and returns a new tree, so a failed insert observably leaves the
//! previous tree untouched and readers never see a half-inserted command.

use std::sync::Arc;

use crate::command::Command;
use crate::component::CommandComponent;
use crate::context::CommandContext;
use crate::error::{DispatchError, ParseFailure, RegistrationError};
use crate::input::CommandInput;
use crate::permission::PermissionChecker;
use crate::suggestion::Suggestion;
use crate::syntax;

/// Node metadata consulted before descending: the union of the permission
/// requirements of every command whose path crosses this node.
struct NodeMeta {
    /// Permissions that open this subtree; any one of them suffices.
    permissions: Vec<Arc<str>>,
    /// `true` when some command underneath requires no permission at all.
    open: bool,
}

impl NodeMeta {
    const fn new() -> Self {
        Self {
            permissions: Vec::new(),
            open: false,
        }
    }

    fn admitting<S>(&self, command: &Command<S>) -> Self {
        let mut permissions = self.permissions.clone();
        let mut open = self.open;
        match command.permission() {
            Some(permission) if !permissions.contains(permission) => {
                permissions.push(Arc::clone(permission));
            }
            Some(_) => {}
            None => open = true,
        }
        Self { permissions, open }
    }

    fn accessible<S>(&self, checker: &dyn PermissionChecker<S>, sender: &S) -> bool {
        self.open
            || self
                .permissions
                .iter()
                .any(|permission| checker.has_permission(sender, permission))
    }

    fn denied_permission(&self) -> String {
        self.permissions
            .first()
            .map_or_else(String::new, |p| p.to_string())
    }
}

struct CommandNode<S> {
    component: Option<Arc<CommandComponent<S>>>,
    children: Vec<Arc<CommandNode<S>>>,
    owner: Option<Arc<Command<S>>>,
    meta: NodeMeta,
}

impl<S> CommandNode<S> {
    const fn root() -> Self {
        Self {
            component: None,
            children: Vec::new(),
            owner: None,
            meta: NodeMeta::new(),
        }
    }

    fn component(&self) -> Option<&Arc<CommandComponent<S>>> {
        self.component.as_ref()
    }

    fn is_literal(&self) -> bool {
        self.component().is_some_and(|c| c.is_literal())
    }

    /// The single non-literal child, when present; sibling rules allow at
    /// most one.
    fn variable_child(&self) -> Option<&Arc<CommandNode<S>>> {
        self.children.iter().find(|child| !child.is_literal())
    }

    fn display_name(&self) -> String {
        self.component()
            .map_or_else(|| "<root>".to_string(), |c| c.name().to_string())
    }
}

/// Everything a walk needs besides the tree itself.
pub(crate) struct WalkResources<'a, S> {
    /// Host-side permission resolution.
    pub checker: &'a dyn PermissionChecker<S>,
    /// Whether unconsumed trailing input after a complete command fails.
    pub fail_on_extraneous_input: bool,
}

/// The registered superimposition of all commands.
pub struct CommandTree<S> {
    root: Arc<CommandNode<S>>,
}

impl<S> std::fmt::Debug for CommandTree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTree").finish_non_exhaustive()
    }
}

impl<S> Default for CommandTree<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> CommandTree<S> {
    /// An empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Arc::new(CommandNode::root()),
        }
    }

    /// `true` when the two trees share the same root node.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// Every registered command, in tree order.
    #[must_use]
    pub fn commands(&self) -> Vec<Arc<Command<S>>> {
        let mut commands = Vec::new();
        collect_commands(&self.root, &mut commands);
        commands
    }

    /// The primary names of all top-level literals.
    #[must_use]
    pub fn root_literals(&self) -> Vec<Arc<str>> {
        self.root
            .children
            .iter()
            .filter_map(|child| child.component().map(|c| Arc::clone(c.name())))
            .collect()
    }

    /// A copy of this tree without the given top-level literal (matched by
    /// primary name), or `None` when no such subtree exists.
    #[must_use]
    pub fn removing(&self, root_literal: &str) -> Option<Self> {
        let index = self.root.children.iter().position(|child| {
            child
                .component()
                .is_some_and(|c| &**c.name() == root_literal)
        })?;
        let mut children = self.root.children.clone();
        children.remove(index);
        Some(Self {
            root: Arc::new(CommandNode {
                component: None,
                children,
                owner: None,
                meta: NodeMeta::new(),
            }),
        })
    }
}

fn collect_commands<S>(node: &Arc<CommandNode<S>>, into: &mut Vec<Arc<Command<S>>>) {
    if let Some(owner) = &node.owner {
        into.push(Arc::clone(owner));
    }
    for child in &node.children {
        collect_commands(child, into);
    }
}

impl<S> CommandTree<S>
where
    S: Send + Sync + 'static,
{
    /// Returns a new tree containing `command`; `self` is unchanged.
    pub fn inserting(&self, command: Arc<Command<S>>) -> Result<Self, RegistrationError> {
        let root = insert_into(&self.root, command.components(), &command)?;
        Ok(Self { root })
    }

    /// The parse walk: descends from the root consuming input, stores parsed
    /// values into `ctx`, and returns the owning command of the reached leaf.
    pub(crate) async fn parse(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
        resources: &WalkResources<'_, S>,
    ) -> Result<Arc<Command<S>>, DispatchError> {
        let mut current = Arc::clone(&self.root);
        let mut path: Vec<Arc<CommandComponent<S>>> = Vec::new();

        loop {
            if input.is_empty() {
                if let Some(owner) = &current.owner {
                    return admit(owner, ctx, resources);
                }
                // Defaults never read input: descend the optional/flag chain.
                let default_child = current
                    .variable_child()
                    .filter(|child| {
                        child
                            .component()
                            .is_some_and(|c| c.is_optional() || c.is_flag())
                    })
                    .cloned();
                if let Some(child) = default_child {
                    enter(&child, ctx, resources)?;
                    let Some(component) = child.component().map(Arc::clone) else {
                        break;
                    };
                    apply_default(&component, ctx).await?;
                    path.push(component);
                    current = child;
                    continue;
                }
                return Err(DispatchError::InvalidSyntax {
                    correct_syntax: usage_from(&path, &current),
                });
            }

            // A leaf with input still pending: extraneous trailing text.
            if current.children.is_empty() {
                if let Some(owner) = &current.owner {
                    if resources.fail_on_extraneous_input {
                        return Err(DispatchError::InvalidSyntax {
                            correct_syntax: usage_from(&path, &current),
                        });
                    }
                    return admit(owner, ctx, resources);
                }
                break;
            }

            let peeked = input.peek();
            let mut variable_failure: Option<(Arc<str>, ParseFailure)> = None;
            let mut advanced = false;

            for candidate in candidates_of(&current, peeked.as_deref().ok()) {
                // Permission failures are fatal at their node.
                enter(&candidate, ctx, resources)?;
                let Some(component) = candidate.component().map(Arc::clone) else {
                    continue;
                };

                let snapshot = input.branch();
                match run_component(&component, ctx, input).await {
                    Ok(()) => {
                        path.push(component);
                        current = candidate;
                        advanced = true;
                        break;
                    }
                    Err(failure) => {
                        input.restore(snapshot);
                        if !component.is_literal() {
                            variable_failure = Some((Arc::clone(component.name()), failure));
                        }
                    }
                }
            }

            if advanced {
                continue;
            }

            // In lenient mode a complete command swallows the unparsed tail.
            if !resources.fail_on_extraneous_input
                && let Some(owner) = &current.owner
            {
                return admit(owner, ctx, resources);
            }

            // The most informative failure wins: a variable's own failure
            // beats an unknown-literal complaint.
            if let Some((component, failure)) = variable_failure {
                return Err(DispatchError::ArgumentParse {
                    component: component.to_string(),
                    failure,
                });
            }
            return Err(match peeked {
                Err(failure) => DispatchError::Parse(failure),
                Ok(token) if path.is_empty() => DispatchError::NoSuchCommand { input: token },
                Ok(_) => DispatchError::InvalidSyntax {
                    correct_syntax: usage_from(&path, &current),
                },
            });
        }

        Err(DispatchError::InvalidSyntax {
            correct_syntax: usage_from(&path, &current),
        })
    }

    /// The suggestion walk: advances like the parse walk, but stops where the
    /// cursor sits and collects candidate completions instead of executing.
    pub(crate) async fn suggestions(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
        resources: &WalkResources<'_, S>,
    ) -> Vec<Suggestion> {
        let mut current = Arc::clone(&self.root);

        loop {
            if input.is_empty() || input.token_ends_input() {
                return collect_at(&current, ctx, input, resources);
            }

            let peeked = input.peek();
            let mut advanced = false;

            for candidate in candidates_of(&current, peeked.as_deref().ok()) {
                if !candidate.meta.accessible(resources.checker, ctx.sender()) {
                    continue;
                }
                let Some(component) = candidate.component().map(Arc::clone) else {
                    continue;
                };
                // The flag region owns everything behind it; completing it is
                // its parser's business, wherever the cursor sits.
                if component.is_flag() {
                    return component_suggestions(&component, ctx, input);
                }
                let snapshot = input.branch();
                if run_component(&component, ctx, input).await.is_ok() {
                    current = candidate;
                    advanced = true;
                    break;
                }
                input.restore(snapshot);

                // A compound component may span several tokens: while the
                // cursor is still inside its span, it completes itself.
                let spans_cursor = component.parser().token_count() > 1
                    && input.remaining_token_count() < component.parser().token_count();
                if spans_cursor {
                    return component_suggestions(&component, ctx, input);
                }
            }

            if !advanced {
                return Vec::new();
            }
        }
    }
}

/// Children of `node` in walk priority order: literals whose spelling matches
/// the next token, then the (single) variable child.
fn candidates_of<S>(node: &CommandNode<S>, token: Option<&str>) -> Vec<Arc<CommandNode<S>>> {
    let mut candidates: Vec<Arc<CommandNode<S>>> = Vec::new();
    if let Some(token) = token {
        candidates.extend(
            node.children
                .iter()
                .filter(|child| {
                    child.is_literal()
                        && child
                            .component()
                            .is_some_and(|c| c.alias_set().any(|spelling| &**spelling == token))
                })
                .cloned(),
        );
    }
    candidates.extend(node.variable_child().cloned());
    candidates
}

fn insert_into<S>(
    node: &Arc<CommandNode<S>>,
    components: &[Arc<CommandComponent<S>>],
    command: &Arc<Command<S>>,
) -> Result<Arc<CommandNode<S>>, RegistrationError> {
    let Some((head, rest)) = components.split_first() else {
        if node.owner.is_some() {
            return Err(RegistrationError::invalid(format!(
                "a command is already registered at '{}'",
                node.display_name()
            )));
        }
        return Ok(Arc::new(CommandNode {
            component: node.component.clone(),
            children: node.children.clone(),
            owner: Some(Arc::clone(command)),
            meta: node.meta.admitting(command),
        }));
    };

    let mut children = node.children.clone();
    match children
        .iter()
        .position(|child| child.component().is_some_and(|c| c.merges_with(head)))
    {
        Some(index) => {
            children[index] = insert_into(&children[index], rest, command)?;
        }
        None => {
            check_ambiguity(node, head)?;
            children.push(chain(components, command));
            // Literals stay ahead of the variable child, sorted by name.
            children.sort_by(|a, b| match (a.is_literal(), b.is_literal()) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                _ => a.display_name().cmp(&b.display_name()),
            });
        }
    }

    Ok(Arc::new(CommandNode {
        component: node.component.clone(),
        children,
        owner: node.owner.clone(),
        meta: node.meta.admitting(command),
    }))
}

/// Builds the fresh chain of nodes for components with no existing match.
fn chain<S>(
    components: &[Arc<CommandComponent<S>>],
    command: &Arc<Command<S>>,
) -> Arc<CommandNode<S>> {
    let mut built: Option<Arc<CommandNode<S>>> = None;
    for component in components.iter().rev() {
        let child = built.take();
        let owner = child.is_none().then(|| Arc::clone(command));
        built = Some(Arc::new(CommandNode {
            component: Some(Arc::clone(component)),
            children: child.into_iter().collect(),
            owner,
            meta: NodeMeta::new().admitting(command),
        }));
    }
    // `components` held at least the head that failed to merge.
    built.unwrap_or_else(|| Arc::new(CommandNode::root()))
}

/// Rejects a new child that its siblings could not be disambiguated from.
fn check_ambiguity<S>(
    parent: &CommandNode<S>,
    new: &CommandComponent<S>,
) -> Result<(), RegistrationError> {
    let ambiguous = |siblings: Vec<String>| RegistrationError::AmbiguousNode {
        parent: parent.display_name(),
        node: new.name().to_string(),
        siblings,
    };

    if new.is_literal() {
        // Literal siblings must not share any spelling.
        let overlapping: Vec<String> = parent
            .children
            .iter()
            .filter_map(|child| child.component())
            .filter(|sibling| {
                sibling.is_literal()
                    && sibling
                        .alias_set()
                        .any(|spelling| new.alias_set().any(|s| s == spelling))
            })
            .map(|sibling| sibling.name().to_string())
            .collect();
        if !overlapping.is_empty() {
            return Err(ambiguous(overlapping));
        }
        // A required variable tolerates no sibling at all.
        if let Some(variable) = parent.variable_child()
            && variable
                .component()
                .is_some_and(|c| !c.is_optional() && !c.is_flag())
        {
            return Err(ambiguous(vec![variable.display_name()]));
        }
        return Ok(());
    }

    // A new variable (required, optional, or flag group):
    if new.is_required() && !parent.children.is_empty() {
        // A required variable forbids any sibling.
        return Err(ambiguous(
            parent.children.iter().map(|c| c.display_name()).collect(),
        ));
    }
    if let Some(variable) = parent.variable_child() {
        // At most one variable per node, and optionality beside a variable
        // is never resolvable.
        return Err(ambiguous(vec![variable.display_name()]));
    }
    Ok(())
}

/// Runs a component's preprocessors and parser, storing the result.
async fn run_component<S: Send + Sync + 'static>(
    component: &Arc<CommandComponent<S>>,
    ctx: &mut CommandContext<S>,
    input: &mut CommandInput,
) -> Result<(), ParseFailure> {
    for preprocessor in component.preprocessors() {
        preprocessor.preprocess(ctx, input)?;
    }
    let value = component.parser().parse_erased(ctx, input).await?;
    ctx.store_erased(
        Arc::clone(component.name()),
        component.value_type().id(),
        value,
    );
    Ok(())
}

/// Parses an omitted optional's default (or an empty flag region) so the
/// context looks exactly as if the input had spelled it out.
async fn apply_default<S: Send + Sync + 'static>(
    component: &Arc<CommandComponent<S>>,
    ctx: &mut CommandContext<S>,
) -> Result<(), DispatchError> {
    let fragment: Arc<str> = match component.default_value() {
        Some(default) => Arc::clone(default),
        // An absent flag region still yields an (empty) flag set.
        None if component.is_flag() => Arc::from(""),
        None => return Ok(()),
    };
    let mut default_input = CommandInput::new(fragment);
    run_component(component, ctx, &mut default_input)
        .await
        .map_err(|failure| DispatchError::ArgumentParse {
            component: component.name().to_string(),
            failure,
        })
}

/// Completions offered by every admissible child of `node`.
fn collect_at<S: Send + Sync + 'static>(
    node: &CommandNode<S>,
    ctx: &mut CommandContext<S>,
    input: &CommandInput,
    resources: &WalkResources<'_, S>,
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for child in &node.children {
        if !child.meta.accessible(resources.checker, ctx.sender()) {
            continue;
        }
        if let Some(component) = child.component() {
            suggestions.extend(component_suggestions(component, ctx, input));
        }
    }
    suggestions
}

fn component_suggestions<S: Send + Sync + 'static>(
    component: &Arc<CommandComponent<S>>,
    ctx: &mut CommandContext<S>,
    input: &CommandInput,
) -> Vec<Suggestion> {
    match component.suggestion_override() {
        Some(provider) => {
            let provider = Arc::clone(provider);
            provider.suggestions(ctx, input)
        }
        None => component.parser().suggest(ctx, input),
    }
}

/// Final admission checks at the owning command.
fn admit<S>(
    owner: &Arc<Command<S>>,
    ctx: &CommandContext<S>,
    resources: &WalkResources<'_, S>,
) -> Result<Arc<Command<S>>, DispatchError> {
    if let Some(requirement) = owner.sender_requirement()
        && !requirement.accepts(ctx.sender())
    {
        return Err(DispatchError::InvalidSender {
            requirement: requirement.name().to_string(),
        });
    }
    if let Some(permission) = owner.permission()
        && !resources.checker.has_permission(ctx.sender(), permission)
    {
        return Err(DispatchError::NoPermission {
            permission: permission.to_string(),
        });
    }
    Ok(Arc::clone(owner))
}

/// Entry check run when descending into a node.
fn enter<S>(
    node: &CommandNode<S>,
    ctx: &CommandContext<S>,
    resources: &WalkResources<'_, S>,
) -> Result<(), DispatchError> {
    if node.meta.accessible(resources.checker, ctx.sender()) {
        Ok(())
    } else {
        Err(DispatchError::NoPermission {
            permission: node.meta.denied_permission(),
        })
    }
}

/// Renders the correct syntax for the deepest reached node: the walked path,
/// then down the remaining chain while it is unambiguous.
fn usage_from<S>(path: &[Arc<CommandComponent<S>>], node: &Arc<CommandNode<S>>) -> String {
    let mut parts: Vec<String> = path
        .iter()
        .map(|component| syntax::format_component(component.as_ref()))
        .collect();

    let mut current = Arc::clone(node);
    loop {
        match current.children.len() {
            0 => break,
            1 => {
                let child = Arc::clone(&current.children[0]);
                if let Some(component) = child.component() {
                    parts.push(syntax::format_component(component.as_ref()));
                }
                current = child;
            }
            _ => {
                let alternatives: Vec<String> = current
                    .children
                    .iter()
                    .filter_map(|child| child.component())
                    .map(|component| syntax::format_component(component.as_ref()))
                    .collect();
                parts.push(alternatives.join("|"));
                break;
            }
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::HandlerError;
    use crate::context::InjectionRegistry;
    use crate::key::ContextKey;
    use crate::parser::ArgumentParser;
    use crate::parser::numeric::NumberParser;
    use crate::parser::string::StringParser;
    use crate::permission::AllowAll;
    use crate::suggestion::StaticSuggestions;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn noop(_: &mut CommandContext<&'static str>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn ctx() -> CommandContext<&'static str> {
        CommandContext::new(
            "console",
            Arc::from(""),
            Arc::new(InjectionRegistry::new()),
            false,
        )
    }

    fn resources() -> WalkResources<'static, &'static str> {
        WalkResources {
            checker: &AllowAll,
            fail_on_extraneous_input: true,
        }
    }

    fn scenario_tree() -> CommandTree<&'static str> {
        let command = Command::builder("test|t")
            .literal("literal")
            .required("int", NumberParser::<i64>::range(1, 100))
            .optional_with_default("string", StringParser::single(), "potato")
            .handler(noop)
            .build()
            .expect("build");
        CommandTree::new()
            .inserting(Arc::new(command))
            .expect("insert")
    }

    async fn parse_into(
        tree: &CommandTree<&'static str>,
        raw: &str,
    ) -> (
        CommandContext<&'static str>,
        Result<Arc<Command<&'static str>>, DispatchError>,
    ) {
        let mut context = ctx();
        let mut input = CommandInput::new(raw);
        let result = tree.parse(&mut context, &mut input, &resources()).await;
        (context, result)
    }

    #[tokio::test]
    async fn parses_required_and_fills_default() {
        let tree = scenario_tree();
        let (context, result) = parse_into(&tree, "test literal 10").await;
        result.expect("parse");
        assert_eq!(*context.get(&ContextKey::<i64>::new("int")), 10);
        assert_eq!(context.get(&ContextKey::<String>::new("string")), "potato");
    }

    #[tokio::test]
    async fn aliases_parse_and_optionals_consume_input() {
        let tree = scenario_tree();
        let (context, result) = parse_into(&tree, "t literal 10 o").await;
        result.expect("parse");
        assert_eq!(*context.get(&ContextKey::<i64>::new("int")), 10);
        assert_eq!(context.get(&ContextKey::<String>::new("string")), "o");
    }

    #[tokio::test]
    async fn out_of_range_surfaces_the_parser_failure() {
        let tree = scenario_tree();
        let (_, result) = parse_into(&tree, "test literal 101").await;
        let error = result.expect_err("must fail");
        let DispatchError::ArgumentParse { component, failure } = error else {
            panic!("expected argument failure, got {error:?}");
        };
        assert_eq!(component, "int");
        assert!(matches!(
            failure,
            ParseFailure::NumberOutOfRange { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_root_is_no_such_command() {
        let tree = scenario_tree();
        let (_, result) = parse_into(&tree, "kenny").await;
        assert!(matches!(
            result,
            Err(DispatchError::NoSuchCommand { input }) if input == "kenny"
        ));
    }

    #[tokio::test]
    async fn missing_arguments_render_correct_syntax() {
        let tree = scenario_tree();
        let (_, result) = parse_into(&tree, "test literal").await;
        let error = result.expect_err("must fail");
        assert!(matches!(
            &error,
            DispatchError::ArgumentParse { component, .. } if component == "int"
        ) || matches!(
            &error,
            DispatchError::InvalidSyntax { correct_syntax } if correct_syntax.contains("<int>")
        ));
    }

    #[tokio::test]
    async fn extraneous_input_respects_the_toggle() {
        let tree = scenario_tree();
        let (_, result) = parse_into(&tree, "test literal 10 potato extra").await;
        assert!(matches!(result, Err(DispatchError::InvalidSyntax { .. })));

        let mut context = ctx();
        let mut input = CommandInput::new("test literal 10 potato extra");
        let lenient = WalkResources {
            checker: &AllowAll,
            fail_on_extraneous_input: false,
        };
        tree.parse(&mut context, &mut input, &lenient)
            .await
            .expect("lenient parse succeeds");
    }

    #[test]
    fn second_variable_sibling_is_ambiguous() {
        let first = Command::builder("a")
            .required("x", NumberParser::<i64>::new())
            .handler(noop)
            .build()
            .expect("build");
        let tree = CommandTree::new()
            .inserting(Arc::new(first))
            .expect("insert");

        let second = Command::builder("a")
            .required("y", StringParser::single())
            .handler(noop)
            .build()
            .expect("build");
        let error = tree
            .inserting(Arc::new(second))
            .expect_err("must be ambiguous");
        let RegistrationError::AmbiguousNode {
            parent, siblings, ..
        } = &error
        else {
            panic!("expected AmbiguousNode, got {error:?}");
        };
        assert_eq!(parent, "a");
        assert_eq!(siblings, &["x".to_string()]);
    }

    #[test]
    fn optional_beside_a_variable_is_ambiguous() {
        let first = Command::builder("a")
            .optional("x", NumberParser::<i64>::new())
            .handler(noop)
            .build()
            .expect("build");
        let tree = CommandTree::new()
            .inserting(Arc::new(first))
            .expect("insert");

        let second = Command::builder("a")
            .optional("y", StringParser::single())
            .handler(noop)
            .build()
            .expect("build");
        assert!(matches!(
            tree.inserting(Arc::new(second)),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
    }

    #[test]
    fn alias_overlap_between_literals_is_ambiguous() {
        let first = Command::builder("cmd")
            .literal("sub|s")
            .handler(noop)
            .build()
            .expect("build");
        let tree = CommandTree::new()
            .inserting(Arc::new(first))
            .expect("insert");

        let second = Command::builder("cmd")
            .literal("second|s")
            .handler(noop)
            .build()
            .expect("build");
        assert!(matches!(
            tree.inserting(Arc::new(second)),
            Err(RegistrationError::AmbiguousNode { .. })
        ));
    }

    #[test]
    fn literals_may_share_a_parent_with_an_optional() {
        let optional = Command::builder("cmd")
            .optional("value", NumberParser::<i64>::new())
            .handler(noop)
            .build()
            .expect("build");
        let literal = Command::builder("cmd")
            .literal("sub")
            .handler(noop)
            .build()
            .expect("build");
        CommandTree::new()
            .inserting(Arc::new(optional))
            .expect("insert optional")
            .inserting(Arc::new(literal))
            .expect("literal beside optional is fine");
    }

    #[tokio::test]
    async fn suggestions_complete_the_token_under_the_cursor() {
        let command = Command::builder("test")
            .literal("var")
            .component(
                crate::component::CommandComponent::required("str", StringParser::single())
                    .with_suggestions(StaticSuggestions::new(["one", "two"])),
            )
            .handler(noop)
            .build()
            .expect("build");
        let tree = CommandTree::new()
            .inserting(Arc::new(command))
            .expect("insert");

        let mut context = ctx();
        let mut input = CommandInput::new("test var on");
        let texts: Vec<String> = tree
            .suggestions(&mut context, &mut input, &resources())
            .await
            .iter()
            .map(|s| s.text().to_string())
            .collect();
        // Unfiltered here; the manager applies the prefix filter.
        assert_eq!(texts, ["one", "two"]);

        let mut context = ctx();
        let mut input = CommandInput::new("test var ");
        let texts: Vec<String> = tree
            .suggestions(&mut context, &mut input, &resources())
            .await
            .iter()
            .map(|s| s.text().to_string())
            .collect();
        assert_eq!(texts, ["one", "two"]);

        let mut context = ctx();
        let mut input = CommandInput::new("nonsense tail");
        assert!(
            tree.suggestions(&mut context, &mut input, &resources())
                .await
                .is_empty()
        );
    }

    /// A parser that records whether it was ever invoked.
    struct SpyParser {
        called: Arc<AtomicBool>,
    }

    impl ArgumentParser<&'static str> for SpyParser {
        type Output = i64;

        fn parse(
            &self,
            _ctx: &mut CommandContext<&'static str>,
            input: &mut CommandInput,
        ) -> Result<i64, ParseFailure> {
            self.called.store(true, Ordering::SeqCst);
            input.read_plain()?;
            Ok(0)
        }
    }

    #[tokio::test]
    async fn denied_permission_short_circuits_before_parsers() {
        let called = Arc::new(AtomicBool::new(false));
        let command = Command::builder("secret")
            .required(
                "value",
                SpyParser {
                    called: Arc::clone(&called),
                },
            )
            .permission("admin")
            .handler(noop)
            .build()
            .expect("build");
        let tree = CommandTree::new()
            .inserting(Arc::new(command))
            .expect("insert");

        let deny_all = |_: &&'static str, _: &str| false;
        let denied = WalkResources {
            checker: &deny_all,
            fail_on_extraneous_input: true,
        };
        let mut context = ctx();
        let mut input = CommandInput::new("secret 42");
        let result = tree.parse(&mut context, &mut input, &denied).await;
        assert!(matches!(result, Err(DispatchError::NoPermission { .. })));
        assert!(!called.load(Ordering::SeqCst), "spy parser must not run");
    }

    #[tokio::test]
    async fn sender_requirements_gate_the_owning_command() {
        let command = Command::builder("consoleonly")
            .sender_requirement(crate::permission::SenderRequirement::new(
                "console",
                |sender: &&'static str| *sender == "console",
            ))
            .handler(noop)
            .build()
            .expect("build");
        let tree = CommandTree::new()
            .inserting(Arc::new(command))
            .expect("insert");

        let (_, result) = parse_into(&tree, "consoleonly").await;
        result.expect("console may run it");

        let mut context = CommandContext::new(
            "player",
            Arc::from(""),
            Arc::new(InjectionRegistry::new()),
            false,
        );
        let mut input = CommandInput::new("consoleonly");
        let result = tree.parse(&mut context, &mut input, &resources()).await;
        assert!(matches!(
            result,
            Err(DispatchError::InvalidSender { requirement }) if requirement == "console"
        ));
    }

    #[test]
    fn failed_insert_leaves_the_tree_unchanged() {
        let tree = scenario_tree();
        let conflicting = Command::builder("test")
            .literal("literal")
            .required("other", StringParser::single())
            .handler(noop)
            .build()
            .expect("build");
        let before: Vec<_> = tree.root_literals();
        assert!(tree.inserting(Arc::new(conflicting)).is_err());
        assert_eq!(tree.root_literals(), before);
        assert_eq!(tree.commands().len(), 1);
    }

    #[test]
    fn removing_a_root_literal_drops_the_subtree() {
        let tree = scenario_tree();
        let removed = tree.removing("test").expect("subtree exists");
        assert!(removed.commands().is_empty());
        assert!(tree.removing("absent").is_none());
        // The original is untouched.
        assert_eq!(tree.commands().len(), 1);
    }
}
