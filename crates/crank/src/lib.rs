//! # crank - promise iteration engine
//!
//! For CLI usage see the `crank` binary (`crank iterate --help`).
//!
//! ## Introduction for developers
//!
//! Read this to understand how `crank` works internally.
//!
//! ### Terms
//!
//! - a `promise` is one desired-state statement; the part this crate cares
//!   about is its text, which may embed variable references
//! - a `reference` is `$(name)` or `${name}`; the name may itself contain
//!   references (`$(A[$(i)])`) and may be qualified with a namespace and
//!   scope (`ns:scope.var`)
//! - a `wheel` is the unit of iteration: one reference together with the
//!   ordered values it currently resolves to and a position in them
//! - a `combination` is one assignment of a single value to every wheel; the
//!   promise body is evaluated once per combination
//!
//! ### Preparation
//!
//! see [iteration::PromiseIterator::prepare]
//!
//! The promise text is walked once by the [scan] module's reference scanner,
//! innermost references first. Each reference either gets a wheel or it
//! doesn't:
//!
//! - it still contains an inner reference: wheel. What it names depends on
//!   values that change while stepping, so its type is unknowable up front.
//! - it resolves to a list or container right now, empty included: wheel.
//! - it is one of the reserved iteration names (`this.k`, `this.v`): wheel.
//! - anything else (a scalar, an unknown name): no wheel. Its value cannot
//!   change across this promise's iteration.
//!
//! Because inner references are processed first, a wheel always sits to the
//! right of every wheel it depends on. Duplicates collapse.
//!
//! Qualified names are rewritten in place by [mangle] (`ns:scope.var`
//! becomes `ns*scope#var`): per-iteration values are bound under that
//! private alias so the foreign scope's real binding is never overwritten.
//!
//! ### Stepping
//!
//! see [iteration::PromiseIterator::next_combination]
//!
//! The registry is stepped like an odometer: the rightmost wheel that has
//! values left advances, and every wheel to its right is re-expanded
//! ([expand::expand_scalar] recomputes its name from the values now bound)
//! and restarted. A wheel whose name did not change keeps its materialized
//! values; one whose name changed asks the [store] again and starts over. A
//! combination in which some wheel is empty or unresolved does not exist and
//! is skipped. The engine's only side effect is binding each wheel's current
//! element into the store's iteration scope, one scalar per wheel per
//! combination.
//!
//! ### Ownership
//!
//! One [iteration::PromiseIterator] per promise, created before its
//! evaluation and dropped after; all progress state lives inside it. Nothing
//! here blocks, locks or spawns; iterators on different threads are
//! independent as long as each owns a disjoint store.
//!
pub mod expand;
pub mod iteration;
pub mod mangle;
pub mod scan;
pub mod store;
pub mod value;
