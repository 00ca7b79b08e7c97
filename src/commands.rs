//! Definition of the commands and dispatch to their handlers.
//!
//! One command per line: `/name payload`. The payload is passed untouched to
//! the handler, which parses it.

use std::sync::Arc;

use log::{debug, error, warn};
use tokio::sync::Mutex;

use crate::database::Database;
use crate::endpoints::{
    handle_add_item, handle_add_members, handle_assign, handle_attach_receipt, handle_balance,
    handle_finalize, handle_history, handle_import, handle_list_groups, handle_list_members,
    handle_new_bill, handle_new_group, handle_payment, handle_remove_item, handle_remove_member,
    handle_show_bill, handle_signin, handle_signout, handle_signup, handle_suggest,
    handle_whoami,
};
use crate::error::{AppError, InputError};
use crate::session::Session;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    SignUp(String),
    SignIn(String),
    SignOut,
    WhoAmI,
    NewGroup(String),
    AddMembers(String),
    RemoveMember(String),
    Members(String),
    Groups,
    Bill(String),
    Item(String),
    RemoveItem(String),
    Assign(String),
    ShowBill(String),
    Import(String),
    Attach(String),
    Finalize(String),
    Pay(String),
    Settle(String),
    Balance(String),
    Suggest(String),
    History(String),
}

const DESCRIPTIONS: &[(&str, &str)] = &[
    ("help", "shows this message."),
    ("signup", "/signup name [payment_account] registers a new user and signs in."),
    ("signin", "/signin name signs in as an existing user."),
    ("signout", "signs out."),
    ("whoami", "shows the signed-in user and their groups."),
    ("newgroup", "/newgroup #group member1 member2 creates a group you belong to."),
    ("addmembers", "/addmembers #group member1 member2 adds members to a group."),
    ("removemember", "/removemember #group member removes a member from a group."),
    ("members", "/members #group lists the members of a group."),
    ("groups", "lists your groups and how much each one spent."),
    ("bill", "/bill [#group] 24.50 [- description] creates a pending bill."),
    ("item", "/item bill_id name 12.00 [x2] adds an item to a pending bill."),
    ("removeitem", "/removeitem item_id removes an item from a pending bill."),
    ("assign", "/assign item_id alice/50 bob/50 splits an item by percentage."),
    ("showbill", "/showbill bill_id shows a bill with its items and shares."),
    ("import", "/import receipt.json [#group] creates a bill from a parsed receipt."),
    ("attach", "/attach bill_id image attaches a receipt image to a pending bill."),
    ("finalize", "/finalize bill_id [payer] writes a bill to the ledger of its group."),
    ("pay", "/pay #group member 10.00 [- description] records a payment to a member."),
    ("settle", "/settle #group member 10.00 records a settlement with a member."),
    ("balance", "/balance #group shows who owes whom."),
    ("suggest", "/suggest #group suggests the transfers that settle the group."),
    ("history", "/history #group [n] shows the last n ledger entries (default 10)."),
];

impl Command {
    pub fn parse(line: &str) -> Result<Command, InputError> {
        let line = line.trim();
        let (name, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command_name = name
            .strip_prefix('/')
            .ok_or_else(|| InputError::UnknownCommand(name.to_string()))?
            .to_lowercase();
        let payload = payload.trim().to_string();

        let command = match command_name.as_str() {
            "help" | "start" => Command::Help,
            "signup" => Command::SignUp(payload),
            "signin" => Command::SignIn(payload),
            "signout" => Command::SignOut,
            "whoami" => Command::WhoAmI,
            "newgroup" => Command::NewGroup(payload),
            "addmembers" => Command::AddMembers(payload),
            "removemember" => Command::RemoveMember(payload),
            "members" => Command::Members(payload),
            "groups" => Command::Groups,
            "bill" | "b" => Command::Bill(payload),
            "item" | "i" => Command::Item(payload),
            "removeitem" => Command::RemoveItem(payload),
            "assign" | "a" => Command::Assign(payload),
            "showbill" => Command::ShowBill(payload),
            "import" => Command::Import(payload),
            "attach" => Command::Attach(payload),
            "finalize" => Command::Finalize(payload),
            "pay" => Command::Pay(payload),
            "settle" => Command::Settle(payload),
            "balance" => Command::Balance(payload),
            "suggest" => Command::Suggest(payload),
            "history" => Command::History(payload),
            _ => return Err(InputError::UnknownCommand(name.to_string())),
        };
        Ok(command)
    }

    pub fn descriptions() -> String {
        let mut result =
            "This ledger splits bills between the members of a group. Supported commands:\n"
                .to_string();
        for (name, description) in DESCRIPTIONS {
            result += &format!("/{name} - {description}\n");
        }
        result
    }
}

pub async fn execute<D: Database>(
    command: Command,
    session: &mut Session,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<String> {
    match command {
        Command::Help => Ok(Command::descriptions()),
        Command::SignUp(s) => handle_signup(session, database, &s).await,
        Command::SignIn(s) => handle_signin(session, database, &s).await,
        Command::SignOut => Ok(handle_signout(session)),
        Command::WhoAmI => handle_whoami(session, database).await,
        Command::NewGroup(s) => handle_new_group(session, database, &s).await,
        Command::AddMembers(s) => handle_add_members(session, database, &s).await,
        Command::RemoveMember(s) => handle_remove_member(session, database, &s).await,
        Command::Members(s) => handle_list_members(session, database, &s).await,
        Command::Groups => handle_list_groups(session, database).await,
        Command::Bill(s) => handle_new_bill(session, database, &s).await,
        Command::Item(s) => handle_add_item(session, database, &s).await,
        Command::RemoveItem(s) => handle_remove_item(session, database, &s).await,
        Command::Assign(s) => handle_assign(session, database, &s).await,
        Command::ShowBill(s) => handle_show_bill(session, database, &s).await,
        Command::Import(s) => handle_import(session, database, &s).await,
        Command::Attach(s) => handle_attach_receipt(session, database, &s).await,
        Command::Finalize(s) => handle_finalize(session, database, &s).await,
        Command::Pay(s) => handle_payment(session, database, &s, false).await,
        Command::Settle(s) => handle_payment(session, database, &s, true).await,
        Command::Balance(s) => handle_balance(session, database, &s).await,
        Command::Suggest(s) => handle_suggest(session, database, &s).await,
        Command::History(s) => handle_history(session, database, &s).await,
    }
}

/// Run one input line and return the text to print. Empty lines produce
/// nothing; errors produce their user-facing message.
pub async fn handle_line<D: Database>(
    line: &str,
    session: &mut Session,
    database: &Arc<Mutex<D>>,
) -> Option<String> {
    if line.trim().is_empty() {
        return None;
    }

    let result = match Command::parse(line) {
        Ok(command) => {
            debug!("Executing {:?}", command);
            execute(command, session, database).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(output) => Some(output),
        Err(e) => {
            let app_error = AppError::from_handler_error(e);
            if app_error.is_internal() {
                error!("Command `{}` failed: {:?}", line.trim(), app_error);
            } else {
                warn!("Command `{}` rejected: {:?}", line.trim(), app_error);
            }
            Some(format!("Error: {}", app_error.user_message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use crate::database::sqlite::SqliteDatabase;

    use super::*;

    #[test]
    fn test_parse_command() -> anyhow::Result<()> {
        assert_eq!(Command::parse("/help")?, Command::Help);
        assert_eq!(
            Command::parse("  /Bill #flat 20 - pizza ")?,
            Command::Bill("#flat 20 - pizza".to_string())
        );
        assert_eq!(Command::parse("/i 3 Soda 2")?, Command::Item("3 Soda 2".to_string()));
        assert_eq!(Command::parse("/groups")?, Command::Groups);

        assert!(matches!(
            Command::parse("/frobnicate"),
            Err(InputError::UnknownCommand(_))
        ));
        assert!(matches!(
            Command::parse("balance #flat"),
            Err(InputError::UnknownCommand(_))
        ));
        Ok(())
    }

    #[test]
    fn test_descriptions_list_every_command() -> anyhow::Result<()> {
        let descriptions = Command::descriptions();
        for (name, _) in DESCRIPTIONS {
            assert!(descriptions.contains(&format!("/{name} - ")));
            Command::parse(&format!("/{name}"))?;
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handle_line() -> anyhow::Result<()> {
        let dir = TempDir::new("splitledger")?;
        let database = Arc::new(Mutex::new(SqliteDatabase::new(dir.path().join("test.db"))?));
        let mut session = Session::new();

        assert_eq!(handle_line("   ", &mut session, &database).await, None);
        assert_eq!(
            handle_line("/groups", &mut session, &database).await,
            Some("Error: you must sign in first: /signin <name>".to_string())
        );
        assert_eq!(
            handle_line("/signup alice", &mut session, &database).await,
            Some("Welcome, alice! Your user ID is 1.".to_string())
        );
        assert_eq!(
            handle_line("/nope", &mut session, &database).await,
            Some("Error: unknown command `/nope`, try /help".to_string())
        );
        assert_eq!(
            handle_line("/groups", &mut session, &database).await,
            Some("Nothing to show!".to_string())
        );
        Ok(())
    }
}
