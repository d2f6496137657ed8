/// One component of a subscription [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Literal(String),
    Wildcard,
}

/// A subscription selector over paths of object keys.
///
/// Each component is either a literal key or `*`, which matches any single
/// key. The empty pattern matches every path, including the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern(Vec<Component>);

impl Pattern {
    /// The empty pattern, matching any path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a pattern from components, where `"*"` means wildcard.
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            components
                .into_iter()
                .map(|component| match component.as_ref() {
                    "*" => Component::Wildcard,
                    literal => Component::Literal(literal.to_owned()),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `path` is at or below the subtree this pattern selects.
    pub fn matches(&self, path: &[String]) -> bool {
        self.0.is_empty()
            || (path.len() >= self.0.len()
                && self.0.iter().zip(path).all(|(component, key)| {
                    match component {
                        Component::Wildcard => true,
                        Component::Literal(literal) => literal == key,
                    }
                }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn empty_pattern_matches_everything() {
        let pattern = Pattern::root();
        assert!(pattern.matches(&[]));
        assert!(pattern.matches(&path(&["a"])));
        assert!(pattern.matches(&path(&["a", "b", "c"])));
    }

    #[test]
    fn literals_and_wildcards() {
        let pattern = Pattern::new(["users", "*", "profile"]);

        assert!(pattern.matches(&path(&["users", "u1", "profile"])));
        assert!(pattern.matches(&path(&["users", "u2", "profile", "nick"])));
        assert!(!pattern.matches(&path(&["users", "u1"])));
        assert!(!pattern.matches(&path(&["users", "u1", "settings"])));
        assert!(!pattern.matches(&path(&["groups", "u1", "profile"])));
        assert!(!pattern.matches(&[]));
    }

    #[test]
    fn wildcard_at_every_position() {
        let pattern = Pattern::new(["*", "*"]);
        assert!(pattern.matches(&path(&["a", "b"])));
        assert!(pattern.matches(&path(&["x", "y", "z"])));
        assert!(!pattern.matches(&path(&["a"])));
    }

    #[quickcheck_macros::quickcheck]
    fn equal_length_match_is_pointwise(pairs: Vec<(String, bool)>) -> bool {
        // For equal-length path and pattern, a match holds exactly when every
        // position is a wildcard or equal. Each input pair contributes the
        // path key and whether the pattern wildcards that position.
        let path: Vec<String> = pairs.iter().map(|(key, _)| key.clone()).collect();
        let components: Vec<String> = pairs
            .iter()
            .map(|(key, wild)| if *wild { "*".to_owned() } else { key.clone() })
            .collect();

        let pattern = Pattern::new(&components);
        let pointwise = pairs
            .iter()
            .zip(&components)
            .all(|((key, _), component)| component == "*" || component == key);

        pattern.matches(&path) == pointwise
    }

    #[quickcheck_macros::quickcheck]
    fn longer_pattern_never_matches(keys: Vec<String>) -> bool {
        let mut components = keys.clone();
        components.push("extra".to_owned());
        !Pattern::new(&components).matches(&keys)
    }
}
