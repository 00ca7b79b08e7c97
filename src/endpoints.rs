//! Core implementation of the command handlers.
//!
//! This is split from `commands` so that the handlers can be tested against a
//! real database without going through the command loop. Every handler
//! returns the text to show to the user.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use log::{debug, error, info};
use tokio::sync::Mutex;

use crate::{
    database::Database,
    error::{DatabaseError, InputError, LedgerError},
    formatter::{
        format_amount, format_bill, format_debts, format_ledger, format_net_balances,
        format_shares, format_simple_list, format_transfers, Names,
    },
    ledger::{
        aggregate_balances, apply_transfers, resolve_bill, resolve_item, suggest_settlements,
        Balances,
    },
    parser::{
        parse_bill, parse_group, parse_group_and_limit, parse_group_and_members, parse_id,
        parse_item, parse_names, parse_payment, parse_shares,
    },
    receipt::parse_receipt,
    session::Session,
    types::{Bill, BillId, Group, GroupId, ItemAssignment, NewBill, NewLedgerEntry, User, UserId},
    validator::{
        validate_assignees, validate_bill_can_be_finalized, validate_group_exists, validate_item,
        validate_member_removal, validate_members, validate_name, validate_names,
        validate_new_bill, validate_payment, validate_users_exist,
    },
};

const DEFAULT_HISTORY_LIMIT: usize = 10;

pub async fn handle_signup<D: Database>(
    session: &mut Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let words = parse_names(payload)?;
    let (name, payment_account) = match words.as_slice() {
        [name] => (name.as_str(), None),
        [name, account] => (name.as_str(), Some(account.as_str())),
        _ => {
            return Err(InputError::InvalidSyntax(
                "format must be 'name [payment_account]'".to_string(),
            )
            .into())
        }
    };
    validate_name(name)?;

    let mut database = database.lock().await;
    if database.get_user_by_name(name)?.is_some() {
        return Err(InputError::NameTaken(name.to_string()).into());
    }
    let user = database.create_user(name, payment_account)?;
    info!("Registered user {} with ID {}", user.name, user.id);

    let user = session.sign_in_as(user);
    Ok(format!("Welcome, {}! Your user ID is {}.", user.name, user.id))
}

pub async fn handle_signin<D: Database>(
    session: &mut Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let name = parse_single_name(payload)?;
    validate_name(&name)?;

    let user = session.sign_in(&name, database).await?;
    Ok(format!("Signed in as {}.", user.name))
}

pub fn handle_signout(session: &mut Session) -> String {
    match session.sign_out() {
        Some(user) => format!("Goodbye, {}!", user.name),
        None => "You are not signed in.".to_string(),
    }
}

pub async fn handle_whoami<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let groups = database.lock().await.get_groups_of_user(user.id)?;
    let group_names: Vec<_> = groups.iter().map(|g| &g.name).collect();

    let mut result = format!("{} (ID {})\n", user.name, user.id);
    if let Some(account) = &user.payment_account {
        result += &format!("Payment account: {account}\n");
    }
    result += "Groups:\n";
    result += &format_simple_list(&group_names);
    Ok(result)
}

pub async fn handle_new_group<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let creator = session.require_user()?;
    let (group_name, members) = parse_group_and_members(payload)?;
    validate_name(&group_name)?;
    validate_names(&members)?;
    debug!("Creating group named {group_name}. Members: {:#?}", members);

    if database
        .lock()
        .await
        .get_group_by_name(&group_name)?
        .is_some()
    {
        return Err(InputError::NameTaken(group_name).into());
    }
    let members = validate_users_exist(&members, database).await?;

    let mut database = database.lock().await;
    let group = database.create_group(&group_name, creator.id)?;
    let member_ids: Vec<_> = members
        .iter()
        .map(|m| m.id)
        .filter(|&id| id != creator.id)
        .collect();
    database.add_group_members(group.id, &member_ids)?;
    info!("User {} created group {}", creator.id, group.id);

    let members = database.get_group_members(group.id)?;
    let member_names: Vec<_> = members.iter().map(|m| &m.name).collect();
    Ok(format!(
        "Created group {}. Members:\n{}",
        group.name,
        format_simple_list(&member_names)
    ))
}

pub async fn handle_add_members<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (group_name, members) = parse_group_and_members(payload)?;
    validate_name(&group_name)?;
    validate_names(&members)?;
    if members.is_empty() {
        return Err(InputError::InvalidSyntax(
            "format must be 'group_name member_name [member_name...]'".to_string(),
        )
        .into());
    }
    debug!("Adding members to group {group_name}. Members: {:#?}", members);

    let group = validate_group_exists(&group_name, database).await?;
    validate_members(&group, &[user], database).await?;
    let members = validate_users_exist(&members, database).await?;

    let member_ids: Vec<_> = members.iter().map(|m| m.id).collect();
    database
        .lock()
        .await
        .add_group_members(group.id, &member_ids)?;
    Ok("Members added.".to_string())
}

pub async fn handle_remove_member<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (group_name, members) = parse_group_and_members(payload)?;
    let member_name = match members.as_slice() {
        [member] => member,
        _ => {
            return Err(InputError::InvalidSyntax(
                "format must be 'group_name member_name'".to_string(),
            )
            .into())
        }
    };
    validate_name(&group_name)?;
    validate_name(member_name)?;
    debug!("Removing {member_name} from group {group_name}");

    let group = validate_group_exists(&group_name, database).await?;
    validate_members(&group, &[user], database).await?;
    let member = validate_users_exist(&[member_name], database)
        .await?
        .remove(0);
    validate_members(&group, &[&member], database).await?;
    validate_member_removal(&group, member.id)?;

    database
        .lock()
        .await
        .remove_group_member(group.id, member.id)?;
    Ok(format!("Removed {} from {}.", member.name, group.name))
}

pub async fn handle_list_members<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let group_name = parse_group(payload)?;
    validate_name(&group_name)?;

    let group = validate_group_exists(&group_name, database).await?;
    validate_members(&group, &[user], database).await?;

    let members = database.lock().await.get_group_members(group.id)?;
    let member_names: Vec<_> = members.iter().map(|m| &m.name).collect();
    Ok(format_simple_list(&member_names))
}

pub async fn handle_list_groups<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let database = database.lock().await;

    let mut lines = Vec::new();
    for group in database.get_groups_of_user(user.id)? {
        let spent = database.get_group_total_spent(group.id)?;
        lines.push(format!("{} (spent {})", group.name, format_amount(spent)));
    }
    Ok(format_simple_list(&lines))
}

pub async fn handle_new_bill<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (_, parsed) = parse_bill(payload).map_err(InputError::invalid_syntax)?;
    validate_new_bill(parsed.total)?;

    let group_id = match &parsed.group {
        Some(group_name) => Some(resolve_own_group(user, group_name, database).await?.id),
        None => None,
    };

    let mut bill = NewBill::new(user.id, group_id, parsed.total);
    bill.description = parsed.description.filter(|d| !d.is_empty());
    let bill = database.lock().await.create_bill(bill)?;
    info!("User {} created bill {}", user.id, bill.id);

    Ok(format!(
        "Created bill {} of {}. Add items with /item {} <name> <price> [xN].",
        bill.id,
        format_amount(bill.total),
        bill.id
    ))
}

pub async fn handle_add_item<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (bill_id, rest) = parse_id(payload, "bill ID")?;
    let (_, item) = parse_item(rest).map_err(InputError::invalid_syntax)?;
    validate_item(&item)?;

    let bill = load_pending_bill(bill_id, user, database).await?;
    let mut items = database.lock().await.add_bill_items(bill.id, &[item])?;
    let item = items
        .pop()
        .ok_or_else(|| DatabaseError::corrupted(format!("item of bill {bill_id} not returned")))?;

    Ok(format!(
        "Added item {}: {} {} x{}.",
        item.id,
        item.name,
        format_amount(item.price),
        item.quantity
    ))
}

pub async fn handle_remove_item<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (item_id, rest) = parse_id(payload, "item ID")?;
    expect_no_arguments(rest)?;

    let item = database
        .lock()
        .await
        .get_item(item_id)?
        .ok_or(InputError::UnknownItem(item_id))?;
    load_pending_bill(item.bill_id, user, database).await?;

    database.lock().await.remove_bill_item(item.id)?;
    Ok(format!("Removed item {} ({}).", item.id, item.name))
}

/// Replace the share assignments of an item.
///
/// The new shares are resolved before being stored, so an item can never be
/// left with shares that do not add up to 100%.
pub async fn handle_assign<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (item_id, rest) = parse_id(payload, "item ID")?;
    let (_, shares) = parse_shares(rest).map_err(InputError::invalid_syntax)?;

    let item = database
        .lock()
        .await
        .get_item(item_id)?
        .ok_or(InputError::UnknownItem(item_id))?;
    let bill = load_pending_bill(item.bill_id, user, database).await?;

    if let Some(group_id) = bill.group_id {
        let group = load_group(group_id, database).await?;
        let members = database.lock().await.get_group_members(group_id)?;
        validate_assignees(&shares, Some((&group, &members)))?;
    }

    let names: Vec<_> = shares.iter().map(|s| &s.user_name).collect();
    let users = validate_users_exist(&names, database).await?;
    let assignments: Vec<_> = shares
        .iter()
        .zip(&users)
        .map(|(share, user)| ItemAssignment::new(item.id, user.id, share.percentage))
        .collect();

    let resolved = resolve_item(&item, &assignments)?;
    database
        .lock()
        .await
        .set_item_assignments(item.id, &assignments)?;
    debug!("Assigned item {}: {:?}", item.id, assignments);

    Ok(format!(
        "Item {} ({}) split:\n{}",
        item.id,
        item.name,
        format_shares(&resolved, &Names::new(&users))
    ))
}

pub async fn handle_show_bill<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (bill_id, rest) = parse_id(payload, "bill ID")?;
    expect_no_arguments(rest)?;

    let bill = load_bill(bill_id, user, database).await?;
    let (items, assignments) = {
        let database = database.lock().await;
        (
            database.get_bill_items(bill.id)?,
            database.get_bill_assignments(bill.id)?,
        )
    };
    let names = load_names(assignments.iter().map(|a| a.user_id), database).await?;

    let mut result = format_bill(&bill, &items, &assignments, &names);
    if let Some(image) = &bill.receipt_image {
        result += &format!("  receipt: {image}\n");
    }
    Ok(result)
}

/// Create a bill from a receipt file produced by the OCR service.
///
/// Payload: `<path> [#group]`.
pub async fn handle_import<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let payload = payload.trim();
    let (path, rest) = payload
        .split_once(char::is_whitespace)
        .unwrap_or((payload, ""));
    if path.is_empty() {
        return Err(InputError::InvalidSyntax(
            "format must be 'receipt_path [#group]'".to_string(),
        )
        .into());
    }

    let group_id = if rest.trim().is_empty() {
        None
    } else {
        let group_name = parse_group(rest)?;
        Some(resolve_own_group(user, &group_name, database).await?.id)
    };

    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| InputError::InvalidReceipt(format!("cannot read `{path}`: {e}")))?;
    let receipt = parse_receipt(&json)?;
    validate_new_bill(receipt.total)?;
    for item in &receipt.items {
        validate_item(item)?;
    }

    let mut bill = NewBill::new(user.id, group_id, receipt.total);
    bill.receipt_image = receipt.image_url;

    let mut database = database.lock().await;
    let bill = database.create_bill(bill)?;
    let items = if receipt.items.is_empty() {
        Vec::new()
    } else {
        database.add_bill_items(bill.id, &receipt.items)?
    };
    info!(
        "User {} imported bill {} with {} items",
        user.id,
        bill.id,
        items.len()
    );

    Ok(format_bill(&bill, &items, &[], &Names::new(&[])))
}

/// Attach a receipt image to a pending bill. Payload: `<bill_id> <image>`.
pub async fn handle_attach_receipt<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (bill_id, image) = parse_id(payload, "bill ID")?;
    let image = image.trim();
    if image.is_empty() || image.contains(char::is_whitespace) {
        return Err(InputError::InvalidSyntax(
            "format must be 'bill_id image_path'".to_string(),
        )
        .into());
    }

    let bill = load_pending_bill(bill_id, user, database).await?;
    database.lock().await.set_receipt_image(bill.id, image)?;
    Ok(format!("Attached {image} to bill {}.", bill.id))
}

/// Write a pending bill to the ledger of its group.
///
/// Payload: `<bill_id> [payer]`. The payer defaults to the signed-in user.
pub async fn handle_finalize<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (bill_id, rest) = parse_id(payload, "bill ID")?;
    let payer = if rest.trim().is_empty() {
        user.clone()
    } else {
        let payer_name = parse_single_name(rest)?;
        validate_name(&payer_name)?;
        validate_users_exist(&[payer_name], database).await?.remove(0)
    };

    let bill = load_bill(bill_id, user, database).await?;
    let (items, assignments) = {
        let database = database.lock().await;
        (
            database.get_bill_items(bill.id)?,
            database.get_bill_assignments(bill.id)?,
        )
    };
    let group_id = validate_bill_can_be_finalized(&bill, &items)?;
    let group = load_group(group_id, database).await?;
    validate_members(&group, &[&payer], database).await?;

    let shares = resolve_bill(&bill, &items, &assignments)?;

    let entry = NewLedgerEntry::new_expense(
        group_id,
        payer.id,
        bill.total,
        bill.id,
        bill.description.as_deref().unwrap_or(""),
    );
    let entry = database.lock().await.complete_bill(bill.id, entry)?;
    info!(
        "Bill {} finalized into ledger entry {} of group {}",
        bill.id, entry.id, group_id
    );

    let names = load_names(shares.keys().copied(), database).await?;
    Ok(format!(
        "Bill {} finalized: {} paid {}.\n{}",
        bill.id,
        payer.name,
        format_amount(bill.total),
        format_shares(&shares, &names)
    ))
}

/// Record a payment (or a settlement) from the signed-in user to another
/// member of the group.
pub async fn handle_payment<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
    is_settlement: bool,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (_, payment) = parse_payment(payload).map_err(InputError::invalid_syntax)?;

    let group = validate_group_exists(&payment.group, database).await?;
    let recipient = validate_users_exist(&[&payment.recipient], database)
        .await?
        .remove(0);
    validate_payment(user.id, recipient.id, payment.amount)?;
    validate_members(&group, &[user, &recipient], database).await?;

    let description = payment.description.unwrap_or_default();
    let entry = if is_settlement {
        NewLedgerEntry::new_settlement(group.id, user.id, recipient.id, payment.amount, &description)
    } else {
        NewLedgerEntry::new_payment(group.id, user.id, recipient.id, payment.amount, &description)
    };
    let entry = database.lock().await.append_ledger_entry(entry)?;
    info!(
        "Recorded {} {} in group {}",
        entry.kind.type_name(),
        entry.id,
        group.id
    );

    Ok(format!(
        "Recorded: {} paid {} {}.",
        user.name,
        recipient.name,
        format_amount(payment.amount)
    ))
}

pub async fn handle_balance<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let group_name = parse_group(payload)?;
    let group = resolve_own_group(user, &group_name, database).await?;

    let balances = compute_group_balances(&group, database).await?;
    if balances.is_settled() {
        return Ok("All clean!".to_string());
    }

    let net = balances.net()?;
    let names = load_names(net.keys().copied(), database).await?;
    Ok(format!(
        "{}\nNet balances:\n{}",
        format_debts(&balances.pairwise(), &names),
        format_net_balances(&net, &names)
    ))
}

pub async fn handle_suggest<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let group_name = parse_group(payload)?;
    let group = resolve_own_group(user, &group_name, database).await?;

    let net = compute_group_balances(&group, database).await?.net()?;
    let transfers = suggest_settlements(&net)?;
    if apply_transfers(&net, &transfers)?
        .values()
        .any(|balance| !balance.is_zero())
    {
        error!("Transfers {:?} do not settle group {}", transfers, group.id);
        return Err(LedgerError::ImbalancedLedger(format!(
            "the suggested transfers do not settle group {}",
            group.name
        ))
        .into());
    }

    let names = load_names(net.keys().copied(), database).await?;
    Ok(format_transfers(&transfers, &names))
}

/// Latest ledger entries of a group. Payload: `<group> [limit]`.
pub async fn handle_history<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
    payload: &str,
) -> anyhow::Result<String> {
    let user = session.require_user()?;
    let (group_name, limit) = parse_group_and_limit(payload, DEFAULT_HISTORY_LIMIT)?;
    let group = resolve_own_group(user, &group_name, database).await?;

    let entries = database
        .lock()
        .await
        .get_ledger_entries_with_limit(group.id, limit)?;
    let user_ids = entries
        .iter()
        .flat_map(|e| std::iter::once(e.payer_id).chain(e.kind.recipient_id()));
    let names = load_names(user_ids, database).await?;
    Ok(format_ledger(&entries, &names))
}

/// Resolve every completed bill of the group and fold its ledger.
async fn compute_group_balances<D: Database>(
    group: &Group,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Balances> {
    let database = database.lock().await;
    let entries = database.get_ledger_entries(group.id)?;

    let mut bill_shares = HashMap::new();
    for bill in database.get_completed_bills(group.id)? {
        let items = database.get_bill_items(bill.id)?;
        let assignments = database.get_bill_assignments(bill.id)?;
        bill_shares.insert(bill.id, resolve_bill(&bill, &items, &assignments)?);
    }

    let balances = aggregate_balances(&entries, &bill_shares)?;
    Ok(balances)
}

/// Look up a group by name and check that *user* belongs to it.
async fn resolve_own_group<D: Database>(
    user: &User,
    group_name: &str,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Group> {
    validate_name(group_name)?;
    let group = validate_group_exists(group_name, database).await?;
    validate_members(&group, &[user], database).await?;
    Ok(group)
}

async fn load_group<D: Database>(
    group_id: GroupId,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Group> {
    let group = database
        .lock()
        .await
        .get_group(group_id)?
        .ok_or_else(|| DatabaseError::corrupted(format!("group {group_id} does not exist")))?;
    Ok(group)
}

/// Load a bill visible to *user*: its creator and the members of its group.
/// Other users are told that the bill does not exist.
async fn load_bill<D: Database>(
    bill_id: BillId,
    user: &User,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Bill> {
    let database = database.lock().await;
    let bill = database
        .get_bill(bill_id)?
        .ok_or(InputError::UnknownBill(bill_id))?;

    if bill.creator_id != user.id {
        let is_member = match bill.group_id {
            Some(group_id) => database
                .get_group_members(group_id)?
                .iter()
                .any(|m| m.id == user.id),
            None => false,
        };
        if !is_member {
            return Err(InputError::UnknownBill(bill_id).into());
        }
    }
    Ok(bill)
}

async fn load_pending_bill<D: Database>(
    bill_id: BillId,
    user: &User,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Bill> {
    let bill = load_bill(bill_id, user, database).await?;
    if !bill.is_pending() {
        return Err(InputError::BillAlreadyCompleted(bill_id).into());
    }
    Ok(bill)
}

/// Display names for the given users, including those who left their groups.
async fn load_names<D: Database, I: IntoIterator<Item = UserId>>(
    user_ids: I,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Names> {
    let user_ids: BTreeSet<_> = user_ids.into_iter().collect();
    let database = database.lock().await;

    let mut users = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        if let Some(user) = database.get_user(user_id)? {
            users.push(user);
        }
    }
    Ok(Names::new(&users))
}

fn parse_single_name(payload: &str) -> Result<String, InputError> {
    let mut names = parse_names(payload)?;
    if names.len() == 1 {
        Ok(names.remove(0))
    } else {
        Err(InputError::InvalidSyntax(format!(
            "expected a single name, found `{}`",
            payload.trim()
        )))
    }
}

fn expect_no_arguments(rest: &str) -> Result<(), InputError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(InputError::InvalidSyntax(format!(
            "unexpected `{}`",
            rest.trim()
        )))
    }
}
