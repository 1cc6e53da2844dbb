//! Pure codepoint predicates used by the tokenizer. No state lives here.

/// Horizontal whitespace inside a line (indentation is handled separately).
pub fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

pub fn is_newline(c: char) -> bool {
    c == '\n' || c == '\r'
}

pub fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

pub fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

pub fn is_bin_digit(c: char) -> bool {
    c == '0' || c == '1'
}

/// First character of an identifier. GDScript accepts unicode letters here.
pub fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

pub fn is_identifier_part(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Characters that may continue a number literal once one has started.
pub fn is_number_part(c: char) -> bool {
    c.is_ascii_digit() || c == '_' || c == '.'
}

pub fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Characters a bare `$`/`%` node path may contain between slashes.
pub fn is_node_path_part(c: char) -> bool {
    is_identifier_part(c) || c == '/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_start() {
        assert!(is_identifier_start('_'));
        assert!(is_identifier_start('a'));
        assert!(is_identifier_start('Ä'));
        assert!(!is_identifier_start('1'));
        assert!(!is_identifier_start('$'));
    }

    #[test]
    fn test_space_excludes_newlines() {
        assert!(is_space(' '));
        assert!(is_space('\t'));
        assert!(!is_space('\n'));
        assert!(!is_space('\r'));
    }
}
