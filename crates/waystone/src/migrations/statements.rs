//! Statement splitting for change-set bodies

/// Statement terminator
const TERMINATOR: char = ';';
/// Line comment marker
const COMMENT: &str = "--";

/// Split one change-set body into individually executable statements
///
/// Fragments are split on `;`, leading comment lines are dropped, fragments
/// left empty are discarded, and the terminator is re-appended. Source order
/// is preserved.
///
/// A fragment that begins with `--` is not discarded as a whole: only its
/// leading comment lines go, and any SQL below them still runs. A fragment
/// made only of comments yields nothing.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(TERMINATOR)
        .map(strip_leading_comments)
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| format!("{}{}", fragment, TERMINATOR))
        .collect()
}

fn strip_leading_comments(fragment: &str) -> &str {
    let mut rest = fragment.trim();
    while rest.starts_with(COMMENT) {
        rest = match rest.split_once('\n') {
            Some((_, tail)) => tail.trim(),
            None => "",
        };
    }
    rest
}
