use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    pub suffixed: bool,
}

pub fn full_name(base: &str, extension: &str) -> String {
    format!("{base}.{extension}")
}

/// Pick a name for `candidate` that is not in `taken`.
///
/// A candidate that maps back onto the entry's own file never collides. Otherwise
/// ` (1)`, ` (2)`, ... are tried in turn; the counter is bounded by `taken.len() + 1`,
/// which always leaves at least one free name.
pub fn resolve(
    candidate: &str,
    extension: &str,
    original_full: &str,
    taken: &HashSet<String>,
) -> Resolution {
    let full = full_name(candidate, extension);
    if full == original_full || !taken.contains(&full) {
        return Resolution {
            name: candidate.to_string(),
            suffixed: false,
        };
    }

    for counter in 1..=taken.len() + 1 {
        let name = format!("{candidate} ({counter})");
        if !taken.contains(&full_name(&name, extension)) {
            return Resolution {
                name,
                suffixed: true,
            };
        }
    }

    unreachable!("{} taken names cannot block {} suffixes", taken.len(), taken.len() + 1)
}
