/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
#[macro_export]
macro_rules! log_if {
    ($cond: expr, $($fmt:tt)*) => {
        if $cond {
            eprint!($($fmt)*);
        }
    };
}

#[macro_export]
macro_rules! logln_if {
    ($cond: expr, $($fmt:tt)*) => {
        if $cond {
            eprintln!($($fmt)*);
        }
    };
}

/// Returns true if `name` can be used as an identifier in an assembler listing.
///
/// Identifiers start with a letter or `_` and continue with letters, digits,
/// `_`, `.` or `$`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

/// Quote a string for an assembler listing. Single quotes are used when
/// possible, otherwise double quotes with backslash escapes.
pub fn quote_string(s: &str) -> String {
    if !s.contains('\'') && !s.contains('\\') && !s.contains('\n') {
        return format!("'{}'", s);
    }
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}
