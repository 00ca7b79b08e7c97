//! Functions that check the validity of user input.
//!
//! These functions are called after the parsing phase and execute
//! checks that are not easily done by the parser.

use std::sync::Arc;

use tokio::sync::Mutex;

mod bill;

use crate::database::Database;
use crate::error::InputError;
use crate::types::{Group, User};
pub use bill::{
    validate_assignees, validate_bill_can_be_finalized, validate_item, validate_member_removal,
    validate_new_bill, validate_payment,
};

/// Names must be alphanumeric (underscores are allowed), ASCII only and
/// start with a letter.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

pub fn validate_name(name: &str) -> Result<(), InputError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(InputError::invalid_name(name))
    }
}

pub fn validate_names<T: AsRef<str>>(names: &[T]) -> Result<(), InputError> {
    for name in names {
        validate_name(name.as_ref())?;
    }
    Ok(())
}

/// Look up the given user names, failing on the first one that is not registered.
pub async fn validate_users_exist<D: Database, T: AsRef<str>>(
    names: &[T],
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Vec<User>> {
    let mut users = Vec::with_capacity(names.len());
    for name in names {
        let user = database
            .lock()
            .await
            .get_user_by_name(name.as_ref())?
            .ok_or_else(|| InputError::unregistered_user(name.as_ref()))?;
        users.push(user);
    }
    Ok(users)
}

/// Verify that a group with the given name exists and return it.
pub async fn validate_group_exists<D: Database>(
    group_name: &str,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Group> {
    let group = database
        .lock()
        .await
        .get_group_by_name(group_name)?
        .ok_or_else(|| InputError::unregistered_group(group_name))?;
    Ok(group)
}

/// Check that all `users` are members of `group`.
pub async fn validate_members<D: Database>(
    group: &Group,
    users: &[&User],
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<()> {
    let members = database.lock().await.get_group_members(group.id)?;
    for user in users {
        if !members.iter().any(|m| m.id == user.id) {
            return Err(InputError::not_a_member(&user.name, &group.name).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("alice"));
        assert!(is_valid_name("Bob_2"));
        assert!(!is_valid_name("2bob"));
        assert!(!is_valid_name("_bob"));
        assert!(!is_valid_name("bòb"));
        assert!(!is_valid_name("bob-smith"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_validate_names() {
        assert!(validate_names(&["alice", "bob"]).is_ok());
        assert!(validate_names(&["alice", "#bob"]).is_err());
    }
}
