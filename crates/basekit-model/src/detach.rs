//! Detach markers on dynamic property names.
//!
//! A dynamic property can opt into detachment through its name: a leading
//! `@` detaches the value (`"@displayValue"`), and `@(N)` additionally
//! chunks list values into slices of `N` elements (`"@(500)vertices"`).
//! The marker stays part of the wire-level property name; parsing only
//! informs the serializer's detach decisions.

/// Detach semantics carried by a property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropName<'a> {
    /// The name exactly as written, marker included.
    pub raw: &'a str,
    /// True when the name starts with `@`.
    pub detach: bool,
    /// Chunk size from an `@(N)` marker, when present and positive.
    pub chunk: Option<usize>,
}

/// Parses the detach marker off a property name.
///
/// Malformed size markers (`@()name`, `@(x)name`, unclosed parens) are not
/// errors; the name is treated as a plain `@` detach. A zero size is
/// meaningless and ignored the same way.
pub fn parse_prop_name(raw: &str) -> PropName<'_> {
    let Some(rest) = raw.strip_prefix('@') else {
        return PropName {
            raw,
            detach: false,
            chunk: None,
        };
    };

    let chunk = rest
        .strip_prefix('(')
        .and_then(|tail| tail.split_once(')'))
        .and_then(|(digits, _)| digits.parse::<usize>().ok())
        .filter(|size| *size > 0);

    PropName {
        raw,
        detach: true,
        chunk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(raw: &str) -> (bool, Option<usize>) {
        let info = parse_prop_name(raw);
        assert_eq!(info.raw, raw);
        (info.detach, info.chunk)
    }

    #[test]
    fn plain_names_carry_no_marker() {
        assert_eq!(parsed("vertices"), (false, None));
        assert_eq!(parsed(""), (false, None));
        assert_eq!(parsed("a@b"), (false, None));
    }

    #[test]
    fn at_prefix_detaches() {
        assert_eq!(parsed("@displayValue"), (true, None));
        assert_eq!(parsed("@"), (true, None));
    }

    #[test]
    fn size_marker_chunks() {
        assert_eq!(parsed("@(500)vertices"), (true, Some(500)));
        assert_eq!(parsed("@(1)x"), (true, Some(1)));
    }

    #[test]
    fn malformed_size_markers_degrade_to_plain_detach() {
        assert_eq!(parsed("@(x)vertices"), (true, None));
        assert_eq!(parsed("@()vertices"), (true, None));
        assert_eq!(parsed("@(12vertices"), (true, None));
        assert_eq!(parsed("@(0)vertices"), (true, None));
    }
}
