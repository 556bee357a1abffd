use super::types::{PathQuery, QueryError, Selector};

/// Parse a path expression.
///
/// Accepts an optional leading `$`, dotted member access, bracketed names,
/// indexes and wildcards, and `..name` recursive descent. A bare leading
/// member (`repository.name`) is treated as if it followed `$.`.
pub fn parse(expr: &str) -> Result<PathQuery, QueryError> {
    let chars: Vec<char> = expr.trim().chars().collect();
    if chars.is_empty() {
        return Err(QueryError::Empty);
    }

    let len = chars.len();
    let mut selectors = Vec::new();
    let mut i = 0;

    if chars[0] == '$' {
        i = 1;
    } else if chars[0] != '.' && chars[0] != '[' {
        let (name, next) = read_name(&chars, 0)?;
        selectors.push(Selector::Child(name));
        i = next;
    }

    while i < len {
        match chars[i] {
            '.' => {
                // `..name`: recursive descent
                if i + 1 < len && chars[i + 1] == '.' {
                    let (name, next) = read_name(&chars, i + 2)?;
                    selectors.push(Selector::Descendant(name));
                    i = next;
                    continue;
                }
                if i + 1 < len && chars[i + 1] == '*' {
                    selectors.push(Selector::Wildcard);
                    i += 2;
                    continue;
                }
                let (name, next) = read_name(&chars, i + 1)?;
                selectors.push(Selector::Child(name));
                i = next;
            }
            '[' => {
                let close = find_close(&chars, i)?;
                let inner: String = chars[i + 1..close].iter().collect();
                selectors.push(bracket_selector(inner.trim())?);
                i = close + 1;
            }
            ch => return Err(QueryError::UnexpectedChar { ch, offset: i }),
        }
    }

    Ok(PathQuery {
        source: expr.to_string(),
        selectors,
    })
}

/// Read a bare member name starting at `start`. Returns the name and the
/// offset just past it.
fn read_name(chars: &[char], start: usize) -> Result<(String, usize), QueryError> {
    let mut end = start;
    while end < chars.len() && is_name_char(chars[end]) {
        end += 1;
    }
    if end == start {
        return Err(QueryError::ExpectedName(start));
    }
    Ok((chars[start..end].iter().collect(), end))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Find the `]` closing the bracket opened at `open`, skipping over quoted names.
fn find_close(chars: &[char], open: usize) -> Result<usize, QueryError> {
    let mut quote: Option<char> = None;
    let mut esc = false;
    for (offset, &c) in chars.iter().enumerate().skip(open + 1) {
        if esc {
            esc = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => esc = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Ok(offset),
            (None, _) => {}
        }
    }
    Err(QueryError::UnterminatedBracket(open))
}

fn bracket_selector(inner: &str) -> Result<Selector, QueryError> {
    if inner == "*" {
        return Ok(Selector::Wildcard);
    }
    for q in ['"', '\''] {
        if inner.len() >= 2 && inner.starts_with(q) && inner.ends_with(q) {
            let body = &inner[1..inner.len() - 1];
            let escaped = format!("\\{q}");
            return Ok(Selector::Child(
                body.replace(&escaped, &q.to_string()).replace("\\\\", "\\"),
            ));
        }
    }
    inner
        .parse::<i64>()
        .map(Selector::Index)
        .map_err(|_| QueryError::InvalidBracket(inner.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors(expr: &str) -> Vec<Selector> {
        parse(expr).unwrap().selectors
    }

    #[test]
    fn bare_dotted_path() {
        assert_eq!(
            selectors("repository.private"),
            vec![
                Selector::Child("repository".into()),
                Selector::Child("private".into())
            ]
        );
    }

    #[test]
    fn rooted_path_matches_bare_path() {
        assert_eq!(selectors("$.repository.private"), selectors("repository.private"));
    }

    #[test]
    fn root_alone_selects_nothing_further() {
        assert!(selectors("$").is_empty());
    }

    #[test]
    fn index_and_wildcards() {
        assert_eq!(
            selectors("commits[0].added[*]"),
            vec![
                Selector::Child("commits".into()),
                Selector::Index(0),
                Selector::Child("added".into()),
                Selector::Wildcard,
            ]
        );
        assert_eq!(
            selectors("labels.*"),
            vec![Selector::Child("labels".into()), Selector::Wildcard]
        );
    }

    #[test]
    fn negative_index() {
        assert_eq!(
            selectors("commits[-1]"),
            vec![Selector::Child("commits".into()), Selector::Index(-1)]
        );
    }

    #[test]
    fn quoted_member_with_dots() {
        assert_eq!(
            selectors(r#"$["head.commit"]['id']"#),
            vec![
                Selector::Child("head.commit".into()),
                Selector::Child("id".into())
            ]
        );
    }

    #[test]
    fn recursive_descent() {
        assert_eq!(
            selectors("$..login"),
            vec![Selector::Descendant("login".into())]
        );
    }

    #[test]
    fn hyphenated_names() {
        assert_eq!(selectors("x-custom"), vec![Selector::Child("x-custom".into())]);
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(parse(""), Err(QueryError::Empty));
        assert_eq!(parse("   "), Err(QueryError::Empty));
        assert_eq!(parse("repository."), Err(QueryError::ExpectedName(11)));
        assert_eq!(parse("commits[0"), Err(QueryError::UnterminatedBracket(7)));
        assert!(matches!(parse("commits[abc]"), Err(QueryError::InvalidBracket(_))));
        assert!(matches!(
            parse("repository name"),
            Err(QueryError::UnexpectedChar { ch: ' ', .. })
        ));
    }
}
