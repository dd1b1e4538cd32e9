//! token scanner for variable references
//!
//! A reference opens with the two-byte sequence `$(` or `${` and runs to the
//! matching close bracket of the same form. References nest: the name inside
//! `$(A[$(i)])` contains a whole reference of its own, and the matching close
//! for the outer one is found by first resolving the inner one's close.
//!
//! An opener without a balancing close is not a crash, it is a recoverable
//! parse error: [find_matching_close] reports it as `None` and callers treat
//! the rest of the string as literal text.

/// Which bracket form opened a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Paren,
    Brace,
}

impl Marker {
    pub fn open(self) -> u8 {
        match self {
            Marker::Paren => b'(',
            Marker::Brace => b'{',
        }
    }

    pub fn close(self) -> u8 {
        match self {
            Marker::Paren => b')',
            Marker::Brace => b'}',
        }
    }
}

/// Find the next reference opener at or after `offset`
///
/// Returns the byte position of the `$` and the bracket form used. Contained
/// references are not skipped; callers that want to jump over a whole
/// reference pair this with [find_matching_close].
pub fn find_next_reference(text: &str, offset: usize) -> Option<(usize, Marker)> {
    let bytes = text.as_bytes();
    let mut i = offset;

    while i + 1 < bytes.len() {
        if bytes[i] == b'$' {
            match bytes[i + 1] {
                b'(' => return Some((i, Marker::Paren)),
                b'{' => return Some((i, Marker::Brace)),
                _ => {}
            }
        }
        i += 1;
    }

    None
}

/// Find the close bracket balancing an opener of form `marker`
///
/// `after_open` points just past the two-byte opener. Nested references of
/// either bracket form are resolved recursively, each one's own close first,
/// so a stray `)` inside `${...}` is ordinary text. Returns `None` when the
/// string ends before balance; the caller must treat everything from the
/// opener on as literal.
pub fn find_matching_close(text: &str, after_open: usize, marker: Marker) -> Option<usize> {
    let bytes = text.as_bytes();
    let close = marker.close();
    let mut i = after_open;

    while i < bytes.len() {
        if bytes[i] == close {
            return Some(i);
        }

        if let Some(inner) = opens_reference(bytes, i) {
            i = find_matching_close(text, i + 2, inner)? + 1;
            continue;
        }

        i += 1;
    }

    None
}

fn opens_reference(bytes: &[u8], i: usize) -> Option<Marker> {
    if bytes[i] != b'$' || i + 1 >= bytes.len() {
        return None;
    }

    match bytes[i + 1] {
        b'(' => Some(Marker::Paren),
        b'{' => Some(Marker::Brace),
        _ => None,
    }
}
