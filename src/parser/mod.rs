//! Parse the user input.

mod amount;
mod bill;

pub use bill::{parse_bill, parse_item, parse_payment, parse_shares};

use crate::error::InputError;

pub fn parse_names(s: &str) -> Result<Vec<String>, InputError> {
    let parts = split_words(s);
    if parts.is_empty() {
        Err(InputError::InvalidSyntax(
            "at least one name must be provided".to_string(),
        ))
    } else {
        Ok(parts)
    }
}

/// Parse `group_name [member_name...]`. A leading `#` on the group is optional.
pub fn parse_group_and_members(s: &str) -> Result<(String, Vec<String>), InputError> {
    let mut parts = split_words(s);
    if parts.is_empty() {
        Err(InputError::InvalidSyntax(
            "missing group name. Format must be 'group_name [member_name...]'".to_string(),
        ))
    } else {
        let members = parts.split_off(1);
        let group = parts
            .pop()
            .expect("Just checked that the Vec contains at least one element");
        Ok((strip_group_marker(group), members))
    }
}

pub fn parse_group(s: &str) -> Result<String, InputError> {
    let (group, members) = parse_group_and_members(s)?;
    if members.is_empty() {
        Ok(group)
    } else {
        Err(InputError::InvalidSyntax(format!(
            "expected only a group name, found `{}`",
            s.trim()
        )))
    }
}

/// Split the numeric ID at the start of `s` from the rest of the input.
pub fn parse_id<'a>(s: &'a str, what: &'static str) -> Result<(i64, &'a str), InputError> {
    let s = s.trim_start();
    let (id, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
    let id = id
        .parse::<i64>()
        .ok()
        .filter(|&id| id > 0)
        .ok_or_else(|| InputError::invalid_number(id, what))?;
    Ok((id, rest))
}

/// Parse `group_name [limit]`.
pub fn parse_group_and_limit(s: &str, default_limit: usize) -> Result<(String, usize), InputError> {
    let (group, rest) = parse_group_and_members(s)?;
    match rest.as_slice() {
        [] => Ok((group, default_limit)),
        [limit] => {
            let limit = limit
                .parse::<usize>()
                .ok()
                .filter(|&l| l > 0)
                .ok_or_else(|| InputError::invalid_number(limit, "limit"))?;
            Ok((group, limit))
        }
        _ => Err(InputError::InvalidSyntax(
            "format must be 'group_name [limit]'".to_string(),
        )),
    }
}

fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(|x| x.to_lowercase()).collect()
}

fn strip_group_marker(group: String) -> String {
    match group.strip_prefix('#') {
        Some(name) => name.to_string(),
        None => group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() -> anyhow::Result<()> {
        let names = parse_names("alice  Bob CAROL ")?;
        assert_eq!(names, vec!["alice", "bob", "carol"]);

        let result = parse_names("   ");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_parse_group_and_members() -> anyhow::Result<()> {
        let (group_name, members) = parse_group_and_members("#g1 p1  P2 p3 ")?;
        assert_eq!(group_name, "g1");
        assert_eq!(members, vec!["p1", "p2", "p3"]);

        let (group_name, members) = parse_group_and_members(" g1  ")?;
        assert_eq!(group_name, "g1");
        assert_eq!(members, Vec::<String>::new());

        assert!(parse_group_and_members("").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_group() -> anyhow::Result<()> {
        assert_eq!(parse_group(" #Flat ")?, "flat");
        assert!(parse_group("flat extra").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_id() -> anyhow::Result<()> {
        assert_eq!(parse_id(" 12 Soda 2", "bill ID")?, (12, "Soda 2"));
        assert_eq!(parse_id("7", "item ID")?, (7, ""));
        assert!(parse_id("x7 Soda", "bill ID").is_err());
        assert!(parse_id("0", "bill ID").is_err());
        assert!(parse_id("", "bill ID").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_group_and_limit() -> anyhow::Result<()> {
        assert_eq!(parse_group_and_limit("#flat", 10)?, ("flat".to_string(), 10));
        assert_eq!(parse_group_and_limit("flat 3", 10)?, ("flat".to_string(), 3));
        assert!(parse_group_and_limit("flat three", 10).is_err());
        assert!(parse_group_and_limit("flat 0", 10).is_err());
        assert!(parse_group_and_limit("flat 1 2", 10).is_err());
        Ok(())
    }
}
