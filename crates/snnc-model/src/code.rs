//! Tokenized code fragments.
//!
//! Model code is C-like text with `$(identifier)` placeholders. A fragment is
//! split once into [`Token`]s; everything downstream (queue-need scanning,
//! symbol resolution) walks the tokens rather than re-searching the text.

/// One piece of a tokenized fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Literal text copied through unchanged
    Text(&'a str),
    /// `$(name)` placeholder; carries the name between the parentheses
    Placeholder(&'a str),
    /// `$(` with no closing parenthesis; carries the remainder of the fragment
    Unterminated(&'a str),
}

impl<'a> Token<'a> {
    /// Render the token back to its source form
    pub fn source(&self) -> String {
        match self {
            Token::Text(t) => (*t).to_string(),
            Token::Placeholder(n) => format!("$({n})"),
            Token::Unterminated(rest) => format!("$({rest}"),
        }
    }
}

/// Split `code` into text and placeholder tokens.
///
/// Concatenating [`Token::source`] over the result reproduces `code` exactly.
pub fn tokenize(code: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = code;
    while let Some(start) = rest.find("$(") {
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        match after.find(')') {
            Some(end) => {
                tokens.push(Token::Placeholder(&after[..end]));
                rest = &after[end + 1..];
            }
            None => {
                tokens.push(Token::Unterminated(after));
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

/// Names of all placeholders in `code`, in order of appearance
pub fn placeholders(code: &str) -> impl Iterator<Item = &str> {
    tokenize(code).into_iter().filter_map(|t| match t {
        Token::Placeholder(name) => Some(name),
        _ => None,
    })
}

/// True when `code` reads `var` from the presynaptic side, i.e. contains `$(<var>_pre)`
pub fn references_presynaptic(code: &str, var: &str) -> bool {
    placeholders(code).any(|name| name.strip_suffix("_pre") == Some(var))
}

/// True when `s` is a valid C identifier
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_and_placeholders() {
        let toks = tokenize("$(V) += $(a)*DT;");
        assert_eq!(
            toks,
            vec![
                Token::Placeholder("V"),
                Token::Text(" += "),
                Token::Placeholder("a"),
                Token::Text("*DT;"),
            ]
        );
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let toks = tokenize("x = $(V");
        assert_eq!(toks, vec![Token::Text("x = "), Token::Unterminated("V")]);
    }

    #[test]
    fn presynaptic_reference_detection() {
        let code = "$(g) * tanh(($(V_pre) - $(Epre)))";
        assert!(references_presynaptic(code, "V"));
        assert!(!references_presynaptic(code, "U"));
        assert!(!references_presynaptic("$(V)", "V"));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("inSynPNKC"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("V pre"));
        assert!(!is_identifier(""));
    }

    proptest::proptest! {
        #[test]
        fn tokenize_is_lossless(code in "[a-z$() +*;_]{0,40}") {
            let rebuilt: String = tokenize(&code).iter().map(Token::source).collect();
            proptest::prop_assert_eq!(rebuilt, code);
        }
    }
}
