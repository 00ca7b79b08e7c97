//! The signed-in user.
//!
//! Authentication itself is delegated; the session only remembers who is
//! acting so that handlers do not have to look it up again. It is passed
//! explicitly to every handler that needs it and is cleared on sign-out.

use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;

use crate::database::Database;
use crate::error::InputError;
use crate::types::User;

#[derive(Clone, Debug, Default)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// Load the user with the given name and make it the acting user.
    pub async fn sign_in<D: Database>(
        &mut self,
        name: &str,
        database: &Arc<Mutex<D>>,
    ) -> anyhow::Result<&User> {
        let user = database
            .lock()
            .await
            .get_user_by_name(name)?
            .ok_or_else(|| InputError::unregistered_user(name))?;
        info!("User {} signed in", user.id);
        Ok(&*self.user.insert(user))
    }

    /// Make an already loaded user the acting user, e.g. right after signup.
    pub fn sign_in_as(&mut self, user: User) -> &User {
        info!("User {} signed in", user.id);
        self.user.insert(user)
    }

    pub fn sign_out(&mut self) -> Option<User> {
        let user = self.user.take();
        if let Some(user) = &user {
            info!("User {} signed out", user.id);
        }
        user
    }

    /// The acting user, or an error asking to sign in.
    pub fn require_user(&self) -> Result<&User, InputError> {
        self.user.as_ref().ok_or(InputError::NotSignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user() -> User {
        User {
            id: 1,
            name: "alice".to_string(),
            payment_account: None,
        }
    }

    #[test]
    fn test_sign_in_and_out() {
        let mut session = Session::new();
        assert!(matches!(
            session.require_user(),
            Err(InputError::NotSignedIn)
        ));

        session.sign_in_as(make_user());
        assert_eq!(session.require_user().ok(), Some(&make_user()));

        assert_eq!(session.sign_out(), Some(make_user()));
        assert!(session.require_user().is_err());
        assert_eq!(session.sign_out(), None);
    }
}
