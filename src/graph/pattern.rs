//! Glob matching for keys, tag values, edge types and foreign-key patterns
//!
//! `*` matches any run of characters (including none), `?` matches exactly one.
//! Matching is case-sensitive and independent of any storage.

/// Returns true when `pattern` contains a wildcard character
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Match `text` against a glob `pattern`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    if !is_wildcard(pattern) {
        return pattern == text;
    }

    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    // dp[i][j] = true if t[0..i] matches p[0..j]
    let mut dp = vec![vec![false; p.len() + 1]; t.len() + 1];
    dp[0][0] = true;

    for j in 1..=p.len() {
        if p[j - 1] == '*' {
            dp[0][j] = dp[0][j - 1];
        } else {
            break;
        }
    }

    for i in 1..=t.len() {
        for j in 1..=p.len() {
            dp[i][j] = match p[j - 1] {
                '*' => dp[i][j - 1] || dp[i - 1][j],
                '?' => dp[i - 1][j - 1],
                c => dp[i - 1][j - 1] && c == t[i - 1],
            };
        }
    }

    dp[t.len()][p.len()]
}
