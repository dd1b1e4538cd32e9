//! wheels and the odometer stepper
//!
//! One [PromiseIterator] drives one promise through every combination of
//! values its iterable variable references can take. Preparation walks the
//! promise text once, innermost references first, and registers a wheel per
//! distinct reference that can fan out; the registration order is the
//! dependency order, a wheel whose name textually contains another reference
//! always lands to the right of that reference's own wheel.
//!
//! Stepping is a mixed-radix counter over the registry: the rightmost wheel
//! that still has values left is advanced, every wheel to its right is
//! re-expanded and restarted (its name or value set may depend on the value
//! that just changed), and the combination is handed to the caller unless
//! some wheel turned out empty or unresolvable, in which case the counter
//! keeps turning. The only termination condition is that no wheel can
//! advance.
use crate::expand::expand_scalar;
use crate::mangle;
use crate::scan;
use crate::store::VariableStore;
use crate::value::{DataType, Rval, Scalar};

/// Names the stepper owns while iterating containers. They get a wheel
/// unconditionally and never veto a combination, resolvable or not.
pub const RESERVED_ITERATION_VARS: [&str; 2] = ["this.k", "this.v"];

/// Element type family of a materialized wheel; decides the type tag used
/// when an element is re-bound into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WheelKind {
    StringList,
    IntList,
    RealList,
    FromContainer,
}

impl WheelKind {
    fn from_data_type(dtype: DataType) -> WheelKind {
        match dtype {
            DataType::StringList => WheelKind::StringList,
            DataType::IntList => WheelKind::IntList,
            DataType::RealList => WheelKind::RealList,
            DataType::Container => WheelKind::FromContainer,
            DataType::String | DataType::Int | DataType::Real => {
                unreachable!("non-iterable type {dtype} cannot back a wheel")
            }
        }
    }

    /// Container elements are bound as strings, whatever their primitive form
    fn element_type(self) -> DataType {
        match self {
            WheelKind::StringList | WheelKind::FromContainer => DataType::String,
            WheelKind::IntList => DataType::Int,
            WheelKind::RealList => DataType::Real,
        }
    }
}

/// What a wheel's expanded name currently resolves to
#[derive(Debug)]
enum Resolved {
    /// Not looked up yet, or the name does not resolve. Vetoes the current
    /// combination unless the name is reserved.
    Absent,
    /// A non-iterable value. The wheel holds one position and never vetoes:
    /// a reference only got this wheel because its type was unknowable at
    /// preparation time, and a scalar still means "iterate once".
    Scalar,
    /// Owned elements of the iterable the name resolves to. Empty vetoes
    /// the whole promise.
    Values { kind: WheelKind, elements: Vec<Scalar> },
}

#[derive(Debug, derive_new::new)]
struct Wheel {
    /// Reference text as written (separators mangled), nested references
    /// included. Never changes after registration.
    unexpanded: String,
    /// `unexpanded` with nested references substituted by their current
    /// values; recomputed whenever a wheel to the left turns
    #[new(default)]
    expanded: Option<String>,
    #[new(value = "Resolved::Absent")]
    resolved: Resolved,
    /// Position in [Resolved::Values]
    #[new(default)]
    index: usize,
}

impl Wheel {
    fn has_more(&self) -> bool {
        match &self.resolved {
            Resolved::Values { elements, .. } => self.index + 1 < elements.len(),
            Resolved::Absent | Resolved::Scalar => false,
        }
    }
}

/// Iteration state for exactly one promise
///
/// Create, [prepare](Self::prepare) once, call
/// [next_combination](Self::next_combination) until it reports `false`,
/// drop. All progress state lives here; instances on different threads are
/// independent as long as their stores are.
#[derive(Debug, Default)]
pub struct PromiseIterator {
    wheels: Vec<Wheel>,
    combinations: u64,
}

impl PromiseIterator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combinations yielded so far, for diagnostics
    pub fn combinations_yielded(&self) -> u64 {
        self.combinations
    }

    /// Register a wheel for every reference in `text` that can fan out
    ///
    /// Mangles qualified reference names in place, which is why `text` is
    /// mutable: per-iteration values must be bound under private aliases so
    /// foreign scopes stay untouched. Nested references are processed first,
    /// guaranteeing that a wheel always sits to the right of the wheels it
    /// depends on. Duplicate references collapse onto one wheel, so
    /// re-preparing the same text is harmless.
    pub fn prepare(&mut self, text: &mut String, store: &dyn VariableStore) {
        let end = text.len();
        self.prepare_region(text, 0, end, store);
    }

    fn prepare_region(
        &mut self,
        text: &mut String,
        start: usize,
        end: usize,
        store: &dyn VariableStore,
    ) {
        let mut offset = start;
        while offset < end {
            let Some((open, marker)) = scan::find_next_reference(&text[..end], offset) else {
                return;
            };

            let Some(close) = scan::find_matching_close(&text[..end], open + 2, marker) else {
                tracing::error!(
                    text = &text[open..end],
                    "unbalanced variable reference, treating the rest as literal"
                );
                return;
            };

            // nested references first, so their wheels land to the left
            self.prepare_region(text, open + 2, close, store);
            self.register(text, open + 2, close, store);

            offset = close + 1;
        }
    }

    /// Decide whether the reference at `start..end` needs a wheel and, if
    /// so, mangle it in place and append it
    fn register(
        &mut self,
        text: &mut String,
        start: usize,
        end: usize,
        store: &dyn VariableStore,
    ) {
        if !needs_wheel(&text[start..end], store) {
            return;
        }

        if let Some(mangled) = mangle::mangle(&text[start..end]) {
            // same byte length, surrounding offsets stay valid
            text.replace_range(start..end, &mangled);
        }

        let name = &text[start..end];
        if self.wheels.iter().any(|wheel| wheel.unexpanded == name) {
            tracing::debug!(wheel = %name, "duplicate wheel collapsed");
            return;
        }

        tracing::debug!(wheel = %name, position = self.wheels.len(), "wheel registered");
        self.wheels.push(Wheel::new(name.to_string()));
    }

    /// Advance to the next combination
    ///
    /// Returns `true` with one value per wheel bound in the store, ready for
    /// the promise body to be evaluated, or `false` when the combinations
    /// are exhausted. A promise with no wheels at all still yields exactly
    /// once.
    pub fn next_combination(&mut self, store: &mut dyn VariableStore) -> bool {
        if self.wheels.is_empty() {
            if self.combinations == 0 {
                self.combinations = 1;
                return true;
            }
            return false;
        }

        if self.combinations == 0 {
            self.resolve_from(store, 0);
            if !self.has_empty_wheel() {
                self.combinations += 1;
                return true;
            }
            // the very first combination is already vetoed; start turning
        }

        loop {
            let Some(turning) = self.rightmost_incrementable() else {
                tracing::debug!(combinations = self.combinations, "iteration exhausted");
                return false;
            };

            self.wheels[turning].index += 1;
            self.bind_current(store, turning);
            // everything to the right may depend on the value that just
            // changed; re-expand and restart it
            self.resolve_from(store, turning + 1);

            if !self.has_empty_wheel() {
                self.combinations += 1;
                return true;
            }
            // some wheel is empty or unresolved under the new assignment;
            // this combination does not exist, keep turning
        }
    }

    /// Rightmost wheel that still has values left, the odometer tie-break:
    /// dependent wheels exhaust all their combinations before anything to
    /// their left advances
    fn rightmost_incrementable(&self) -> Option<usize> {
        self.wheels.iter().rposition(Wheel::has_more)
    }

    /// Re-expand and restart every wheel at or to the right of `from`
    ///
    /// A wheel whose expanded name comes out unchanged keeps its
    /// materialized values (no point re-querying the store) but still
    /// restarts from element zero and re-binds it: a wheel further left may
    /// have just overwritten the same slot. A changed name means the old
    /// values described a different variable entirely, so they are dropped
    /// and the store is asked about the new name.
    fn resolve_from(&mut self, store: &mut dyn VariableStore, from: usize) {
        for i in from..self.wheels.len() {
            let expanded = expand_scalar(&*store, &self.wheels[i].unexpanded);

            if self.wheels[i].expanded.as_deref() == Some(expanded.as_str()) {
                self.wheels[i].index = 0;
                self.bind_current(store, i);
                continue;
            }

            tracing::trace!(
                wheel = %self.wheels[i].unexpanded,
                name = %expanded,
                "expanded name changed, re-resolving"
            );

            let mut alias_value = None;
            let resolved = match store.lookup(&expanded) {
                Some((rval, dtype)) if dtype.is_iterable() => Resolved::Values {
                    kind: WheelKind::from_data_type(dtype),
                    elements: rval.iterable_elements(),
                },
                Some((Rval::Scalar(value), dtype)) => {
                    if mangle::is_mangled(&expanded) {
                        // nothing else will ever publish the mangled alias
                        alias_value = Some((value.clone(), dtype));
                    }
                    Resolved::Scalar
                }
                Some((_, dtype)) => {
                    unreachable!("type {dtype} claims to be a non-iterable non-scalar")
                }
                None => {
                    tracing::debug!(name = %expanded, "wheel variable does not resolve");
                    Resolved::Absent
                }
            };

            if let Some((value, dtype)) = alias_value {
                store.bind(&expanded, value, dtype);
            }

            let wheel = &mut self.wheels[i];
            wheel.expanded = Some(expanded);
            wheel.resolved = resolved;
            wheel.index = 0;
            self.bind_current(store, i);
        }
    }

    /// Bind the wheel's current element under its expanded name, if it has
    /// one to bind
    fn bind_current(&self, store: &mut dyn VariableStore, index: usize) {
        let wheel = &self.wheels[index];
        let (Some(name), Resolved::Values { kind, elements }) =
            (&wheel.expanded, &wheel.resolved)
        else {
            return;
        };

        if let Some(element) = elements.get(wheel.index) {
            store.bind(name, element.clone(), kind.element_type());
        }
    }

    /// A combination only exists if every wheel has a value to contribute.
    /// Reserved names are exempt, the stepper writes those itself.
    fn has_empty_wheel(&self) -> bool {
        self.wheels.iter().any(|wheel| {
            if RESERVED_ITERATION_VARS.contains(&wheel.unexpanded.as_str()) {
                return false;
            }

            match &wheel.resolved {
                Resolved::Absent => true,
                Resolved::Scalar => false,
                Resolved::Values { elements, .. } => elements.is_empty(),
            }
        })
    }
}

/// The decision rule for one reference, applied in order, first match wins
fn needs_wheel(name: &str, store: &dyn VariableStore) -> bool {
    // 1. still contains an inner expansion: the eventual type is unknowable
    //    until the inner part takes a value during stepping
    if scan::find_next_reference(name, 0).is_some() {
        return true;
    }

    // 2. currently resolves to an iterable, empty included: an empty
    //    iterable must veto the whole promise, and only a wheel can do that
    if let Some((_, dtype)) = store.lookup(name) {
        if dtype.is_iterable() {
            return true;
        }
    }

    // 3. stepper-written iteration metadata, resolvable or not
    if RESERVED_ITERATION_VARS.contains(&name) {
        return true;
    }

    // 4. a scalar or an unknown name cannot change across this promise's
    //    iteration, so no per-combination rebinding is needed
    false
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;
    use crate::variables;
    use pretty_assertions::assert_eq;

    /// Prepare `text` against `store` and collect the rendered promise text
    /// of every yielded combination
    fn run(store: &mut MemoryStore, text: &str) -> (Vec<String>, PromiseIterator) {
        let mut text = text.to_string();
        let mut iterator = PromiseIterator::new();
        iterator.prepare(&mut text, &*store);

        let mut rendered = vec![];
        while iterator.next_combination(&mut *store) {
            rendered.push(expand_scalar(&*store, &text));
        }

        (rendered, iterator)
    }

    #[test]
    fn promise_without_references_runs_exactly_once() {
        let mut store = variables! {};
        let (rendered, iterator) = run(&mut store, "restart the service");

        assert_eq!(rendered, vec!["restart the service"]);
        assert_eq!(iterator.combinations_yielded(), 1);

        // and never again
        let mut iterator = iterator;
        assert!(!iterator.next_combination(&mut store));
        assert!(!iterator.next_combination(&mut store));
    }

    #[test]
    fn scalar_references_do_not_get_wheels() {
        let mut store = variables! { "host" => "alpha" };
        let (rendered, iterator) = run(&mut store, "ping $(host)");

        assert!(iterator.wheels.is_empty());
        assert_eq!(rendered, vec!["ping alpha"]);
    }

    #[test]
    fn two_independent_lists_enumerate_the_cartesian_product() {
        let mut store = variables! { "i" => [1, 2], "j" => ["a", "b"] };
        let (rendered, iterator) = run(&mut store, "$(i) and $(j)");

        // rightmost wheel exhausts fastest
        assert_eq!(rendered, vec!["1 and a", "1 and b", "2 and a", "2 and b"]);
        assert_eq!(iterator.combinations_yielded(), 4);
    }

    #[test]
    fn dependent_wheel_sits_right_of_its_index_variable() {
        let mut store = variables! {
            "i" => [0, 1],
            "A[0]" => ["p", "q"],
            "A[1]" => ["r", "s"],
        };
        let (rendered, iterator) = run(&mut store, "$(A[$(i)])");

        let names: Vec<_> = iterator
            .wheels
            .iter()
            .map(|wheel| wheel.unexpanded.as_str())
            .collect();
        assert_eq!(names, vec!["i", "A[$(i)]"]);

        // all of A[0] is exhausted before i advances
        assert_eq!(rendered, vec!["p", "q", "r", "s"]);
    }

    #[test]
    fn empty_iterable_short_circuits_the_whole_promise() {
        let mut store = variables! { "i" => [1, 2, 3], "none" => [] };
        let (rendered, iterator) = run(&mut store, "$(i) with $(none)");

        assert_eq!(rendered, Vec::<String>::new());
        assert_eq!(iterator.combinations_yielded(), 0);
    }

    #[test]
    fn unresolvable_assignments_are_skipped_not_fatal() {
        // A[1] is never defined: the combinations under i=1 do not exist
        let mut store = variables! { "i" => [0, 1], "A[0]" => ["p", "q"] };
        let (rendered, _) = run(&mut store, "$(A[$(i)])");

        assert_eq!(rendered, vec!["p", "q"]);
    }

    #[test]
    fn duplicate_references_collapse_onto_one_wheel() {
        let mut store = variables! { "i" => [1, 2] };
        let (rendered, iterator) = run(&mut store, "$(i) eq $(i)");

        assert_eq!(iterator.wheels.len(), 1);
        assert_eq!(rendered, vec!["1 eq 1", "2 eq 2"]);
    }

    #[test]
    fn preparing_twice_registers_nothing_new() {
        let store = variables! { "i" => [1, 2] };
        let mut text = "$(i)".to_string();

        let mut iterator = PromiseIterator::new();
        iterator.prepare(&mut text, &store);
        iterator.prepare(&mut text, &store);

        assert_eq!(iterator.wheels.len(), 1);
    }

    #[test]
    fn qualified_names_iterate_through_a_private_alias() {
        let mut store = variables! { "ns:scope.list" => ["x", "y"] };
        let mut text = "$(ns:scope.list)".to_string();

        let mut iterator = PromiseIterator::new();
        iterator.prepare(&mut text, &store);
        assert_eq!(text, "$(ns*scope#list)");

        let mut rendered = vec![];
        while iterator.next_combination(&mut store) {
            rendered.push(expand_scalar(&store, &text));
        }
        assert_eq!(rendered, vec!["x", "y"]);

        // the foreign scope itself was never touched
        let (rval, dtype) = store.lookup("ns:scope.list").unwrap();
        assert_eq!(
            rval,
            &Rval::List(vec![Scalar::from("x"), Scalar::from("y")])
        );
        assert!(dtype.is_iterable());
    }

    #[test]
    fn inner_selected_scalars_iterate_once_per_selection() {
        // the outer reference only has a wheel because its name embeds
        // $(sel); each expansion of it resolves to a plain scalar
        let mut store = variables! {
            "sel" => ["a", "b"],
            "cfg[a]" => "left",
            "cfg[b]" => "right",
        };
        let (rendered, iterator) = run(&mut store, "$(cfg[$(sel)])");

        assert_eq!(rendered, vec!["left", "right"]);
        assert_eq!(iterator.combinations_yielded(), 2);
    }

    #[test]
    fn mangled_scalar_selection_binds_the_alias() {
        let mut store = variables! {
            "which" => ["tag"],
            "ns:cfg.tag" => "v1",
        };
        let (rendered, _) = run(&mut store, "$(ns:cfg.$(which))");

        assert_eq!(rendered, vec!["v1"]);
    }

    #[test]
    fn containers_iterate_their_primitive_children() {
        // serde_json objects arrive sorted by key: burst, cpu, nested
        let mut store = variables! {
            "limits" => { "cpu": 2, "burst": true, "nested": { "skipped": 1 } },
        };
        let (rendered, _) = run(&mut store, "limit=$(limits)");

        assert_eq!(rendered, vec!["limit=true", "limit=2"]);
    }

    #[test]
    fn unbalanced_reference_is_literal_and_iteration_proceeds() {
        let mut store = variables! { "i" => [1, 2] };
        let (rendered, iterator) = run(&mut store, "$(i) then $(broken");

        assert_eq!(iterator.wheels.len(), 1);
        assert_eq!(rendered, vec!["1 then $(broken", "2 then $(broken"]);
    }

    #[test]
    fn reserved_iteration_names_never_veto() {
        let mut store = variables! { "i" => [1, 2] };
        let (rendered, iterator) = run(&mut store, "$(i): $(this.k)");

        // this.k has a wheel even though it resolves to nothing
        assert_eq!(iterator.wheels.len(), 2);
        assert_eq!(rendered, vec!["1: $(this.k)", "2: $(this.k)"]);
    }

    #[test]
    fn three_wheels_roll_like_an_odometer() {
        let mut store = variables! {
            "a" => [1, 2],
            "b" => ["x", "y"],
            "c" => [true, false],
        };
        let (rendered, iterator) = run(&mut store, "$(a)$(b)$(c)");

        assert_eq!(
            rendered,
            vec![
                "1xtrue", "1xfalse", "1ytrue", "1yfalse", //
                "2xtrue", "2xfalse", "2ytrue", "2yfalse",
            ]
        );
        assert_eq!(iterator.combinations_yielded(), 8);
    }
}
