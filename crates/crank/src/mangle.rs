//! separator mangling for per-iteration aliases
//!
//! Binding an iteration value under a foreign scope's literal name (say
//! `ns:scope.var`) would corrupt that scope for every other consumer. Instead
//! the separators are rewritten to private placeholder characters, producing
//! an alias (`ns*scope#var`) that only the owning promise's evaluation ever
//! binds or reads. The store can map an alias back with [unmangle] when a
//! lookup misses.
//!
//! Mangling only ever applies to the part of a reference name before its
//! first nested reference or index bracket; anything past that point becomes
//! its own reference (and gets mangled on its own) if and when it matters.

/// Placeholder for the namespace separator `:`
pub const MANGLED_NS: char = '*';
/// Placeholder for the scope separator `.`
pub const MANGLED_SCOPE: char = '#';

const NS_SEPARATOR: char = ':';
const SCOPE_SEPARATOR: char = '.';

/// The current-iteration scope; names under it are already local and are
/// never mangled
const CURRENT_SCOPE: &str = "this";

/// Rewrite the separators in a reference name, or `None` if nothing changed
///
/// Only the first `:` and the first `.` before any `$` or `[` are candidates;
/// a `.` whose scope identifier is `this` stays untouched. Pure and
/// idempotent: a second pass finds no separators left.
pub fn mangle(ref_text: &str) -> Option<String> {
    let limit = ref_text
        .find(['$', '['])
        .unwrap_or(ref_text.len());
    let prefix = &ref_text[..limit];

    let colon = prefix.find(NS_SEPARATOR);
    let scope_start = colon.map(|c| c + 1).unwrap_or(0);
    let dot = prefix[scope_start..]
        .find(SCOPE_SEPARATOR)
        .map(|d| d + scope_start)
        .filter(|&d| &prefix[scope_start..d] != CURRENT_SCOPE);

    if colon.is_none() && dot.is_none() {
        return None;
    }

    let mut mangled: Vec<u8> = ref_text.bytes().collect();
    if let Some(position) = colon {
        mangled[position] = MANGLED_NS as u8;
    }
    if let Some(position) = dot {
        mangled[position] = MANGLED_SCOPE as u8;
    }

    let mangled = String::from_utf8(mangled).expect("single-byte separator rewrite keeps utf-8");
    tracing::trace!(from = %ref_text, to = %mangled, "reference name mangled");
    Some(mangled)
}

/// Whether a name carries mangled separators
pub fn is_mangled(name: &str) -> bool {
    let limit = name.find(['$', '[']).unwrap_or(name.len());
    name[..limit].contains([MANGLED_NS, MANGLED_SCOPE])
}

/// Map a mangled alias back to the name it shadows
pub fn unmangle(name: &str) -> String {
    let limit = name.find(['$', '[']).unwrap_or(name.len());

    let mut plain = String::with_capacity(name.len());
    for (index, c) in name.char_indices() {
        plain.push(match c {
            MANGLED_NS if index < limit => NS_SEPARATOR,
            MANGLED_SCOPE if index < limit => SCOPE_SEPARATOR,
            other => other,
        });
    }

    plain
}
