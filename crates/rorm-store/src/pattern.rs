//! Glob-style key patterns as understood by `SCAN ... MATCH`.
//!
//! Supported syntax:
//! - `*` matches any run of characters, including none
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[^a]` match one character from (or outside) a class
//! - `\x` matches `x` literally
//!
//! An unterminated class is closed by the end of the pattern.

/// Returns `true` if `text` matches the glob `pattern`.
///
/// # Examples
///
/// ```
/// use rorm_store::glob_match;
///
/// assert!(glob_match("*try*", "app::User/ID/try13"));
/// assert!(glob_match("user/?", "user/7"));
/// assert!(!glob_match("user/[0-3]", "user/7"));
/// ```
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

/// Iterative matcher with a single backtrack point: the most recent `*`.
/// A later star always supersedes an earlier one, so the work is bounded by
/// `p.len() * t.len()`.
fn match_from(p: &[char], t: &[char]) -> bool {
    let (mut pi, mut ti) = (0, 0);
    // (pattern index after the star, text index the star currently covers up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            while pi < p.len() && p[pi] == '*' {
                pi += 1;
            }
            if pi == p.len() {
                return true;
            }
            backtrack = Some((pi, ti));
            continue;
        }
        if let Some(next) = match_one(p, pi, t[ti]) {
            pi = next;
            ti += 1;
            continue;
        }
        match backtrack {
            Some((star_pi, star_ti)) => {
                pi = star_pi;
                ti = star_ti + 1;
                backtrack = Some((star_pi, star_ti + 1));
            }
            None => return false,
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Match one text character against the pattern token at `p[pi]`.
/// Returns the index of the next token on success.
fn match_one(p: &[char], pi: usize, c: char) -> Option<usize> {
    match *p.get(pi)? {
        '?' => Some(pi + 1),
        '[' => {
            let (matched, next) = match_class(p, pi + 1, c);
            matched.then_some(next)
        }
        '\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Match `c` against the class starting at `p[start]` (just after `[`).
/// Returns the match result and the index following the closing `]`.
fn match_class(p: &[char], start: usize, c: char) -> (bool, usize) {
    let mut i = start;
    let negate = i < p.len() && p[i] == '^';
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < p.len() && p[i] != ']' {
        if p[i] == '\\' && i + 1 < p.len() {
            matched |= p[i + 1] == c;
            i += 2;
        } else if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let (lo, hi) = if p[i] <= p[i + 2] {
                (p[i], p[i + 2])
            } else {
                (p[i + 2], p[i])
            };
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= p[i] == c;
            i += 1;
        }
    }
    let next = if i < p.len() { i + 1 } else { i };
    (matched != negate, next)
}
