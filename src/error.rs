use thiserror::Error;

use crate::money::Money;
use crate::types::{BillId, ItemId};

/// Failures of the ledger computations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("item {0} is not assigned to anyone: split this item before proceeding")]
    UnassignedItem(ItemId),

    #[error("the shares of item {item_id} total {total}%, they must total 100%: adjust shares")]
    InvalidShare { item_id: ItemId, total: u64 },

    #[error("the ledger does not balance: {0}")]
    ImbalancedLedger(String),

    #[error("bill {0} is referenced by an expense but its shares were not provided")]
    UnresolvedBill(BillId),

    #[error("the bill total is {expected} but its items add up to {actual}")]
    BillTotalMismatch { expected: Money, actual: Money },

    #[error("amount overflow while computing item {0}")]
    AmountOverflow(ItemId),

    #[error("amount overflow while computing balances")]
    BalanceOverflow,
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error(
        "invalid name `{0}`: names must be alphanumeric, can only \
             include ASCII characters and must start with a letter"
    )]
    InvalidName(String),

    #[error("`{0}` is not a registered user")]
    UnregisteredUser(String),

    #[error("`{0}` is not a registered group")]
    UnregisteredGroup(String),

    #[error("the name `{0}` is already taken")]
    NameTaken(String),

    #[error("`{0}` is not a member of group `{1}`")]
    NotAMember(String, String),

    #[error("the creator of group `{0}` cannot leave it")]
    CannotRemoveCreator(String),

    #[error("bill {0} does not exist")]
    UnknownBill(BillId),

    #[error("item {0} does not exist")]
    UnknownItem(ItemId),

    #[error("bill {0} is already completed")]
    BillAlreadyCompleted(BillId),

    #[error("bill {0} is not part of a group")]
    BillWithoutGroup(BillId),

    #[error("bill {0} has no items")]
    BillWithoutItems(BillId),

    #[error("the amount must be greater than zero")]
    NonPositiveAmount,

    #[error("the quantity must be at least one")]
    InvalidQuantity,

    #[error("a user cannot pay themselves")]
    SelfPayment,

    #[error("you must sign in first: /signin <name>")]
    NotSignedIn,

    #[error("invalid value `{0}` for {1}: expected a positive integer")]
    InvalidNumber(String, &'static str),

    #[error("invalid receipt: {0}")]
    InvalidReceipt(String),

    #[error("unknown command `{0}`, try /help")]
    UnknownCommand(String),
}

impl InputError {
    pub fn invalid_syntax(e: nom::Err<nom::error::Error<&str>>) -> Self {
        InputError::InvalidSyntax(e.to_string())
    }

    pub fn invalid_name(name: &str) -> Self {
        InputError::InvalidName(name.to_string())
    }

    pub fn unregistered_user(name: &str) -> Self {
        InputError::UnregisteredUser(name.to_string())
    }

    pub fn unregistered_group(name: &str) -> Self {
        InputError::UnregisteredGroup(name.to_string())
    }

    pub fn not_a_member(user: &str, group: &str) -> Self {
        InputError::NotAMember(user.to_string(), group.to_string())
    }

    pub fn invalid_number(value: &str, what: &'static str) -> Self {
        InputError::InvalidNumber(value.to_string(), what)
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("{message}: {cause}")]
    Query { message: String, cause: anyhow::Error },

    #[error("{0} was not found")]
    NotFound(String),

    #[error("stored data is corrupted: {0}")]
    Corrupted(String),
}

impl DatabaseError {
    pub fn new<T: AsRef<str>>(message: T, cause: anyhow::Error) -> Self {
        DatabaseError::Query {
            message: message.as_ref().to_string(),
            cause,
        }
    }

    pub fn not_found<T: AsRef<str>>(what: T) -> Self {
        DatabaseError::NotFound(what.as_ref().to_string())
    }

    pub fn corrupted<T: AsRef<str>>(what: T) -> Self {
        DatabaseError::Corrupted(what.as_ref().to_string())
    }
}

/// The error reported back to the user of the command interface.
///
/// `message` is meant for the log, `user_message` is what gets printed.
#[derive(Error)]
#[error("An error occurred: {user_message}")]
pub struct AppError {
    message: String,
    user_message: String,
}

impl AppError {
    pub fn new(message: String, user_message: String) -> Self {
        AppError {
            message,
            user_message,
        }
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Map any error raised by a handler to something the user can read.
    ///
    /// Input and share errors are shown as they are; database failures and
    /// ledger invariant violations are hidden behind a generic message.
    pub fn from_handler_error(e: anyhow::Error) -> Self {
        let message = format!("{e:#}");
        if let Some(input_error) = e.downcast_ref::<InputError>() {
            return AppError::new(message, input_error.to_string());
        }
        if let Some(ledger_error) = e.downcast_ref::<LedgerError>() {
            let user_message = match ledger_error {
                LedgerError::ImbalancedLedger(_)
                | LedgerError::AmountOverflow(_)
                | LedgerError::BalanceOverflow => {
                    "the ledger of this group is inconsistent, please report it".to_string()
                }
                other => other.to_string(),
            };
            return AppError::new(message, user_message);
        }
        if e.downcast_ref::<DatabaseError>().is_some() {
            let user_message = "cannot query the database, please try again later".to_string();
            return AppError::new(message, user_message);
        }
        AppError::new(message, "something went wrong".to_string())
    }

    pub fn is_internal(&self) -> bool {
        self.message != self.user_message
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_shown_to_the_user() {
        let e = anyhow::Error::from(InputError::SelfPayment);
        let app_error = AppError::from_handler_error(e);
        assert_eq!(app_error.user_message(), "a user cannot pay themselves");
    }

    #[test]
    fn test_ledger_invariant_violations_are_hidden() {
        let e = anyhow::Error::from(LedgerError::ImbalancedLedger("sum is 3".to_string()));
        let app_error = AppError::from_handler_error(e);
        assert!(app_error.user_message().contains("inconsistent"));
        assert!(format!("{:?}", app_error).contains("sum is 3"));

        let app_error = AppError::from_handler_error(LedgerError::BalanceOverflow.into());
        assert!(app_error.user_message().contains("inconsistent"));
        assert!(app_error.is_internal());

        let e = anyhow::Error::from(LedgerError::InvalidShare {
            item_id: 4,
            total: 99,
        });
        let app_error = AppError::from_handler_error(e);
        assert!(app_error.user_message().contains("adjust shares"));
    }

    #[test]
    fn test_database_errors_are_hidden() {
        let e = anyhow::Error::from(DatabaseError::new(
            "cannot get bill",
            anyhow::anyhow!("disk I/O error"),
        ));
        let app_error = AppError::from_handler_error(e);
        assert_eq!(
            app_error.user_message(),
            "cannot query the database, please try again later"
        );
        assert!(app_error.is_internal());
    }
}
