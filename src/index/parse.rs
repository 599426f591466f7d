//! Relation-line parsing.
//!
//! Turns Debian control relation syntax (`a (>= 1.0), b | c:any, d`) into a
//! flat clause sequence. OR-alternatives are not nested: every alternative
//! becomes its own clause carrying the `or_continues` marker, and a group is
//! terminated by the first clause without it.

use super::{CompOp, DepType, DependencyClause};

/// Parse one relation field into flat clauses.
///
/// All clauses produced from one line share `kind`. Returns a plain string
/// reason on malformed input; the builder wraps it with record identity.
pub fn parse_relations(kind: DepType, line: &str) -> Result<Vec<DependencyClause>, String> {
    let mut clauses = Vec::new();

    for group in split_nonempty(line, ',') {
        let alternatives: Vec<&str> = split_nonempty(group, '|').collect();
        if alternatives.is_empty() {
            return Err("empty OR-group".into());
        }

        let last = alternatives.len() - 1;
        for (position, alternative) in alternatives.iter().enumerate() {
            let mut clause = parse_target(alternative)?;
            clause.dep_type = kind;
            clause.or_continues = position != last;
            clauses.push(clause);
        }
    }

    Ok(clauses)
}

/// Parse a Provides field into the list of provided names. Version
/// annotations (`foo (= 1.0)`) are accepted and discarded; the provides
/// relation in the cache is unversioned.
pub fn parse_provides(line: &str) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    for entry in split_nonempty(line, ',') {
        let name = match entry.find('(') {
            Some(start) => {
                if !entry.trim_end().ends_with(')') {
                    return Err(format!("unterminated version annotation in '{}'", entry));
                }
                entry[..start].trim()
            }
            None => entry,
        };
        let name = strip_arch_qualifier(name);
        if name.is_empty() {
            return Err(format!("empty provided name in '{}'", line));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

fn split_nonempty(line: &str, separator: char) -> impl Iterator<Item = &str> {
    line.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

/// Parse one alternative: `name[:arch] [(op version)]`.
fn parse_target(alternative: &str) -> Result<DependencyClause, String> {
    let (name_part, constraint_part) = match alternative.find('(') {
        Some(start) => {
            let rest = alternative[start + 1..].trim_end();
            let Some(inner) = rest.strip_suffix(')') else {
                return Err(format!("unterminated version constraint in '{}'", alternative));
            };
            (alternative[..start].trim(), Some(inner.trim()))
        }
        None => (alternative, None),
    };

    let name = strip_arch_qualifier(name_part);
    if name.is_empty() {
        return Err(format!("missing target name in '{}'", alternative));
    }

    let (comp, constraint) = match constraint_part {
        Some(inner) => parse_constraint(inner)?,
        None => (CompOp::None, String::new()),
    };

    Ok(DependencyClause {
        target_name: name.to_string(),
        constraint,
        comp,
        dep_type: DepType::Unspecified,
        or_continues: false,
    })
}

/// `libc6:amd64` and `foo:any` refer to the package name itself.
fn strip_arch_qualifier(name: &str) -> &str {
    match name.split_once(':') {
        Some((bare, _)) => bare.trim(),
        None => name.trim(),
    }
}

/// Parse the inside of a version constraint: operator followed by version.
/// Bare `<` and `>` keep their historical inclusive meaning.
fn parse_constraint(inner: &str) -> Result<(CompOp, String), String> {
    let operators: [(&str, CompOp); 7] = [
        ("<=", CompOp::LessEq),
        (">=", CompOp::GreaterEq),
        ("<<", CompOp::Less),
        (">>", CompOp::Greater),
        ("!=", CompOp::NotEqual),
        ("=", CompOp::Equal),
        // Checked after the two-character forms.
        ("<", CompOp::LessEq),
    ];

    let (comp, version) = operators
        .iter()
        .find_map(|(token, op)| inner.strip_prefix(token).map(|rest| (*op, rest)))
        .or_else(|| inner.strip_prefix('>').map(|rest| (CompOp::GreaterEq, rest)))
        .ok_or_else(|| format!("missing comparison operator in '({})'", inner))?;

    let version = version.trim();
    if version.is_empty() {
        return Err(format!("missing version in '({})'", inner));
    }

    Ok((comp, version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_unversioned_clause() {
        let clauses = parse_relations(DepType::Depends, "libc6").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].target_name, "libc6");
        assert_eq!(clauses[0].comp, CompOp::None);
        assert!(clauses[0].constraint.is_empty());
        assert!(!clauses[0].or_continues);
    }

    #[test]
    fn test_versioned_clause() {
        let clauses = parse_relations(DepType::Depends, "libc6 (>= 2.14)").unwrap();
        assert_eq!(clauses[0].comp, CompOp::GreaterEq);
        assert_eq!(clauses[0].constraint, "2.14");
    }

    #[test]
    fn test_or_group_markers() {
        let clauses =
            parse_relations(DepType::Depends, "mail-reader | mutt (>= 1.5), postfix").unwrap();
        assert_eq!(clauses.len(), 3);
        assert!(clauses[0].or_continues);
        assert!(!clauses[1].or_continues);
        assert!(!clauses[2].or_continues);
        assert_eq!(clauses[1].constraint, "1.5");
    }

    #[test]
    fn test_strict_operators() {
        let clauses =
            parse_relations(DepType::Conflicts, "old-pkg (<< 3.0), new-pkg (>> 1.0)").unwrap();
        assert_eq!(clauses[0].comp, CompOp::Less);
        assert_eq!(clauses[1].comp, CompOp::Greater);
    }

    #[test]
    fn test_bare_angle_brackets_are_inclusive() {
        let clauses = parse_relations(DepType::Depends, "a (< 2.0), b (> 1.0)").unwrap();
        assert_eq!(clauses[0].comp, CompOp::LessEq);
        assert_eq!(clauses[1].comp, CompOp::GreaterEq);
    }

    #[test]
    fn test_arch_qualifier_is_stripped() {
        let clauses = parse_relations(DepType::Depends, "python3:any (>= 3.11)").unwrap();
        assert_eq!(clauses[0].target_name, "python3");
    }

    #[test]
    fn test_dep_type_applied_to_every_clause() {
        let clauses = parse_relations(DepType::Recommends, "a | b | c").unwrap();
        assert_eq!(clauses.len(), 3);
        assert!(clauses.iter().all(|c| c.dep_type == DepType::Recommends));
        assert!(clauses[0].or_continues && clauses[1].or_continues);
        assert!(!clauses[2].or_continues);
    }

    #[test]
    fn test_unterminated_constraint_fails() {
        assert!(parse_relations(DepType::Depends, "libc6 (>= 2.14").is_err());
    }

    #[test]
    fn test_missing_operator_fails() {
        assert!(parse_relations(DepType::Depends, "libc6 (2.14)").is_err());
    }

    #[test]
    fn test_missing_version_fails() {
        assert!(parse_relations(DepType::Depends, "libc6 (>=)").is_err());
    }

    #[test]
    fn test_provides_plain_and_versioned() {
        let names = parse_provides("www-browser, mail-reader (= 1.0)").unwrap();
        assert_eq!(names, vec!["www-browser".to_string(), "mail-reader".to_string()]);
    }

    #[test]
    fn test_provides_empty_line() {
        assert!(parse_provides("").unwrap().is_empty());
    }

    #[test]
    fn test_provides_unterminated_annotation_fails() {
        assert!(parse_provides("foo (= 1.0").is_err());
    }
}
