//! Route table.
//!
//! Routes map anchored URL patterns to open handlers. Resolution scans routes
//! from highest to lowest priority and returns the first match; routes with
//! equal priority keep registration order.
//!
//! A route's priority is the length of its leading literal run: the
//! characters after the `^` anchor and before the first of `()[].*?+$`. A
//! pattern that is literal apart from its anchors gets `u32::MAX`, so an
//! exact route always beats a wildcard route however specific:
//!
//! ```text
//! ^browse/movies$   -> u32::MAX
//! ^browse/(.*)$     -> 7
//! ^(.*)             -> 0
//! ```

use regex::{Regex, RegexBuilder};

use crate::error::{BridgeError, BridgeResult};

/// Most capture groups passed on to a handler.
pub const MAX_CAPTURES: usize = 7;

const METACHARACTERS: &[char] = &['(', ')', '[', ']', '.', '*', '?', '+', '$'];

/// Identifier of a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(u64);

/// How a route's priority is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorityHint {
    /// Derive from the pattern's literal prefix.
    #[default]
    Derived,
    Fixed(u32),
}

/// Prefix `^` unless the pattern is already anchored.
pub fn anchor(pattern: &str) -> String {
    if pattern.starts_with('^') {
        pattern.to_string()
    } else {
        format!("^{pattern}")
    }
}

/// Priority of an anchored or unanchored pattern.
pub fn derive_priority(pattern: &str) -> u32 {
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    let body = strip_end_anchor(body);
    match body.find(METACHARACTERS) {
        None => u32::MAX,
        Some(idx) => body[..idx].chars().count() as u32,
    }
}

fn strip_end_anchor(body: &str) -> &str {
    let Some(rest) = body.strip_suffix('$') else {
        return body;
    };
    let escapes = rest.chars().rev().take_while(|c| *c == '\\').count();
    if escapes % 2 == 0 {
        rest
    } else {
        body
    }
}

struct Route<H> {
    id: RouteId,
    pattern: String,
    regex: Regex,
    priority: u32,
    owner: String,
    handler: H,
}

/// Result of a successful resolution.
#[derive(Debug, Clone)]
pub struct RouteMatch<H> {
    pub route: RouteId,
    pub handler: H,
    /// Participating capture groups, in group order.
    pub captures: Vec<String>,
    pub owner: String,
    pub pattern: String,
    pub priority: u32,
}

/// Priority-ordered set of routes.
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
    next_id: u64,
    case_insensitive: bool,
}

impl<H: Clone> RouteTable<H> {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            routes: Vec::new(),
            next_id: 1,
            case_insensitive,
        }
    }

    /// Register a route. Fails without touching the table if the anchored
    /// pattern is already present or does not compile.
    pub fn add(
        &mut self,
        pattern: &str,
        hint: PriorityHint,
        handler: H,
        owner: &str,
    ) -> BridgeResult<RouteId> {
        let pattern = anchor(pattern);

        if self.routes.iter().any(|r| r.pattern == pattern) {
            return Err(BridgeError::DuplicateRoute { pattern });
        }

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(self.case_insensitive)
            .build()
            .map_err(|source| BridgeError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;

        let priority = match hint {
            PriorityHint::Derived => derive_priority(&pattern),
            PriorityHint::Fixed(p) => p,
        };

        let id = RouteId(self.next_id);
        self.next_id += 1;

        let at = self
            .routes
            .iter()
            .position(|r| r.priority < priority)
            .unwrap_or(self.routes.len());

        tracing::debug!(pattern = %pattern, priority, owner, "route added");

        self.routes.insert(
            at,
            Route {
                id,
                pattern,
                regex,
                priority,
                owner: owner.to_string(),
                handler,
            },
        );
        Ok(id)
    }

    /// First matching route whose owner `accept`s it.
    pub fn resolve_with(
        &self,
        url: &str,
        mut accept: impl FnMut(&str) -> bool,
    ) -> Option<RouteMatch<H>> {
        self.routes
            .iter()
            .filter(|r| accept(&r.owner))
            .find_map(|r| {
                let caps = r.regex.captures(url)?;
                let captures = (1..caps.len())
                    .take(MAX_CAPTURES)
                    .filter_map(|i| caps.get(i))
                    .map(|m| m.as_str().to_string())
                    .collect();
                Some(RouteMatch {
                    route: r.id,
                    handler: r.handler.clone(),
                    captures,
                    owner: r.owner.clone(),
                    pattern: r.pattern.clone(),
                    priority: r.priority,
                })
            })
    }

    pub fn resolve(&self, url: &str) -> Option<RouteMatch<H>> {
        self.resolve_with(url, |_| true)
    }

    /// Remove one route. Returns the removed handler.
    pub fn remove(&mut self, id: RouteId) -> Option<H> {
        let idx = self.routes.iter().position(|r| r.id == id)?;
        let route = self.routes.remove(idx);
        tracing::debug!(pattern = %route.pattern, "route removed");
        Some(route.handler)
    }

    /// Remove every route registered by `owner`, returning their handlers.
    pub fn remove_owned_by(&mut self, owner: &str) -> Vec<H> {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.routes)
            .into_iter()
            .partition(|r| r.owner == owner);
        self.routes = kept;
        gone.into_iter().map(|r| r.handler).collect()
    }

    pub fn owner_of(&self, id: RouteId) -> Option<&str> {
        self.routes
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.owner.as_str())
    }

    pub fn count_owned_by(&self, owner: &str) -> usize {
        self.routes.iter().filter(|r| r.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable<&'static str> {
        RouteTable::new(true)
    }

    #[test]
    fn test_derive_priority() {
        assert_eq!(derive_priority("^browse/movies$"), u32::MAX);
        assert_eq!(derive_priority("browse/movies"), u32::MAX);
        assert_eq!(derive_priority("^browse/(.*)$"), 7);
        assert_eq!(derive_priority("^(.*)"), 0);
        assert_eq!(derive_priority("^a.b"), 1);
        // escaped dollar is part of the body
        assert_eq!(derive_priority("^cost\\$"), 5);
    }

    #[test]
    fn test_exact_route_beats_wildcard() {
        let mut routes = table();
        routes
            .add("^browse/(.*)$", PriorityHint::Derived, "wildcard", "a")
            .unwrap();
        routes
            .add("^browse/movies$", PriorityHint::Derived, "exact", "a")
            .unwrap();

        let hit = routes.resolve("browse/movies").unwrap();
        assert_eq!(hit.handler, "exact");
        assert!(hit.captures.is_empty());
        assert_eq!(hit.priority, u32::MAX);

        let hit = routes.resolve("browse/anything").unwrap();
        assert_eq!(hit.handler, "wildcard");
        assert_eq!(hit.captures, vec!["anything".to_string()]);
        assert_eq!(hit.priority, 7);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let mut routes = table();
        routes.add("^tv/(.*)", PriorityHint::Derived, "first", "a").unwrap();
        routes.add("^tv/(.+)", PriorityHint::Derived, "second", "b").unwrap();
        routes.add("^t(.*)", PriorityHint::Derived, "shorter", "b").unwrap();

        assert_eq!(routes.resolve("tv/show").unwrap().handler, "first");
        assert_eq!(routes.resolve("tape").unwrap().handler, "shorter");
    }

    #[test]
    fn test_duplicate_leaves_table_unchanged() {
        let mut routes = table();
        routes.add("^x/(.*)", PriorityHint::Derived, "one", "a").unwrap();
        let err = routes
            .add("x/(.*)", PriorityHint::Derived, "two", "b")
            .unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateRoute { ref pattern } if pattern == "^x/(.*)"));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.resolve("x/1").unwrap().handler, "one");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut routes = table();
        let err = routes
            .add("^bad/(", PriorityHint::Derived, "h", "a")
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidPattern { .. }));
        assert!(routes.is_empty());
    }

    #[test]
    fn test_patterns_are_anchored_and_case_insensitive() {
        let mut routes = table();
        routes.add("movies:(.*)", PriorityHint::Derived, "m", "a").unwrap();

        assert!(routes.resolve("xmovies:1").is_none());
        let hit = routes.resolve("MOVIES:Alien").unwrap();
        assert_eq!(hit.captures, vec!["Alien".to_string()]);

        let mut strict = RouteTable::new(false);
        strict.add("movies:(.*)", PriorityHint::Derived, "m", "a").unwrap();
        assert!(strict.resolve("MOVIES:Alien").is_none());
    }

    #[test]
    fn test_non_participating_groups_omitted() {
        let mut routes = table();
        routes
            .add("^show/(a)?(b)?/(.*)", PriorityHint::Derived, "h", "a")
            .unwrap();
        let hit = routes.resolve("show/b/ep1").unwrap();
        assert_eq!(hit.captures, vec!["b".to_string(), "ep1".to_string()]);
    }

    #[test]
    fn test_captures_capped() {
        let mut routes = table();
        routes
            .add(
                "^(a)(b)(c)(d)(e)(f)(g)(h)(i)",
                PriorityHint::Derived,
                "h",
                "a",
            )
            .unwrap();
        let hit = routes.resolve("abcdefghi").unwrap();
        assert_eq!(hit.captures.len(), MAX_CAPTURES);
        assert_eq!(hit.captures.last().map(String::as_str), Some("g"));
    }

    #[test]
    fn test_fixed_priority_and_owner_filter() {
        let mut routes = table();
        routes.add("^a(.*)", PriorityHint::Derived, "derived", "x").unwrap();
        routes.add("^a(.+)", PriorityHint::Fixed(100), "fixed", "y").unwrap();

        assert_eq!(routes.resolve("abc").unwrap().handler, "fixed");
        let hit = routes.resolve_with("abc", |owner| owner != "y").unwrap();
        assert_eq!(hit.handler, "derived");
    }

    #[test]
    fn test_remove_and_remove_owned_by() {
        let mut routes = table();
        let a1 = routes.add("^a1", PriorityHint::Derived, "a1", "a").unwrap();
        routes.add("^a2", PriorityHint::Derived, "a2", "a").unwrap();
        routes.add("^b1", PriorityHint::Derived, "b1", "b").unwrap();

        assert_eq!(routes.owner_of(a1), Some("a"));
        assert_eq!(routes.remove(a1), Some("a1"));
        assert_eq!(routes.remove(a1), None);

        assert_eq!(routes.remove_owned_by("a"), vec!["a2"]);
        assert_eq!(routes.count_owned_by("a"), 0);
        assert_eq!(routes.count_owned_by("b"), 1);
        assert!(routes.resolve("b1").is_some());
    }
}
