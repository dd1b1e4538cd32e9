//! scalar string expansion
//!
//! Substitutes every variable reference in a string that currently resolves
//! to a scalar. Nested references are expanded innermost-first, so the name
//! being looked up is itself fully expanded before the store is asked.
//!
//! Anything that does not resolve to a scalar stays in the output: iterables
//! keep their reference form (stepping binds their current element over the
//! same name, at which point they do resolve), unknown names keep theirs, and
//! an unbalanced opener makes the rest of the string literal.
use crate::scan;
use crate::store::VariableStore;
use crate::value::Rval;

pub fn expand_scalar(store: &dyn VariableStore, text: &str) -> String {
    let mut expanded = String::with_capacity(text.len());
    let mut offset = 0;

    while let Some((open, marker)) = scan::find_next_reference(text, offset) {
        expanded.push_str(&text[offset..open]);

        let Some(close) = scan::find_matching_close(text, open + 2, marker) else {
            // unbalanced: the rest is literal
            expanded.push_str(&text[open..]);
            return expanded;
        };

        let name = expand_scalar(store, &text[open + 2..close]);
        match store.lookup(&name) {
            Some((Rval::Scalar(value), _)) => {
                tracing::trace!(name = %name, value = %value, "substituted");
                expanded.push_str(&value.to_string());
            }
            _ => {
                // not (yet) substitutable; keep the reference, inner
                // expansions included
                expanded.push('$');
                expanded.push(marker.open() as char);
                expanded.push_str(&name);
                expanded.push(marker.close() as char);
            }
        }

        offset = close + 1;
    }

    expanded.push_str(&text[offset..]);
    expanded
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::variables;
    use pretty_assertions::assert_eq;

    #[test]
    fn substitutes_resolvable_scalars() {
        let store = variables! { "host" => "alpha", "port" => 80 };
        assert_eq!(
            expand_scalar(&store, "deploy to $(host):$(port)"),
            "deploy to alpha:80"
        );
    }

    #[test]
    fn both_bracket_forms_expand() {
        let store = variables! { "host" => "alpha" };
        assert_eq!(expand_scalar(&store, "${host} $(host)"), "alpha alpha");
    }

    #[test]
    fn inner_references_expand_first() {
        let store = variables! { "i" => 1, "A[1]" => "one" };
        assert_eq!(expand_scalar(&store, "$(A[$(i)])"), "one");
    }

    #[test]
    fn unresolved_references_stay_verbatim() {
        let store = variables! { "i" => 1 };
        assert_eq!(expand_scalar(&store, "$(missing)"), "$(missing)");
        // the inner expansion is kept even when the outer does not resolve
        assert_eq!(expand_scalar(&store, "$(A[$(i)])"), "$(A[1])");
    }

    #[test]
    fn iterables_are_not_substituted() {
        let store = variables! { "ports" => [80, 443] };
        assert_eq!(expand_scalar(&store, "port $(ports)"), "port $(ports)");
    }

    #[test]
    fn unbalanced_tail_is_literal() {
        let store = variables! { "host" => "alpha" };
        assert_eq!(
            expand_scalar(&store, "$(host) and $(oops"),
            "alpha and $(oops"
        );
    }
}
