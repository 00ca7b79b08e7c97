//! The implementation of a data storage using Sqlite.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task::block_in_place;

use crate::{
    error::DatabaseError,
    money::Money,
    types::{
        Bill, BillId, BillItem, BillStatus, EntryKind, Group, GroupId, ItemAssignment, ItemId,
        LedgerEntry, NewBill, NewLedgerEntry, ParsedItem, User, UserId,
    },
};

use super::{Database, DatabaseResult};

mod schema;

const USER_COLUMNS: &str = "id, name, payment_account";
const GROUP_COLUMNS: &str = "id, name, creator_id";
const BILL_COLUMNS: &str =
    "id, creator_id, group_id, total, status, receipt_image, description";
const ITEM_COLUMNS: &str = "id, bill_id, name, price, quantity";
const ENTRY_COLUMNS: &str =
    "id, group_id, entry_type, payer_id, recipient_id, bill_id, amount, description, created_at";

pub struct SqliteDatabase {
    connection: Connection,
}

impl SqliteDatabase {
    pub fn new<P: AsRef<Path>>(path: P) -> DatabaseResult<SqliteDatabase> {
        block_in_place(|| {
            let connection = Connection::open(path)
                .map_err(|e| DatabaseError::new("cannot open database", e.into()))?;
            schema::create_all_tables(&connection)
                .map_err(|e| DatabaseError::new("cannot create tables", e))?;
            Ok(SqliteDatabase { connection })
        })
    }
}

impl Database for SqliteDatabase {
    fn create_user(&mut self, name: &str, payment_account: Option<&str>) -> DatabaseResult<User> {
        let fn_impl = || {
            let id: i64 = self.connection.query_row(
                "INSERT INTO app_user (name, payment_account) VALUES (?1, ?2) RETURNING id",
                params![name, payment_account],
                |row| row.get(0),
            )?;

            debug!("Created user {name} with ID {id}");

            Ok(User {
                id,
                name: name.to_string(),
                payment_account: payment_account.map(|p| p.to_string()),
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot create user", e)))
    }

    fn get_user(&self, user_id: UserId) -> DatabaseResult<Option<User>> {
        let fn_impl = || {
            let user = self
                .connection
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM app_user WHERE id = ?1"),
                    params![user_id],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get user", e)))
    }

    fn get_user_by_name(&self, name: &str) -> DatabaseResult<Option<User>> {
        let fn_impl = || {
            let user = self
                .connection
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM app_user WHERE name = ?1"),
                    params![name],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get user by name", e)))
    }

    fn create_group(&mut self, name: &str, creator_id: UserId) -> DatabaseResult<Group> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            let group_id: i64 = tx.query_row(
                "INSERT INTO expense_group (name, creator_id) VALUES (?1, ?2) RETURNING id",
                params![name, creator_id],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO group_member (group_id, user_id) VALUES (?1, ?2)",
                params![group_id, creator_id],
            )?;

            tx.commit()?;

            debug!("Created group {name} with ID {group_id}");

            Ok(Group {
                id: group_id,
                name: name.to_string(),
                creator_id,
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot create group", e)))
    }

    fn get_group(&self, group_id: GroupId) -> DatabaseResult<Option<Group>> {
        let fn_impl = || {
            let group = self
                .connection
                .query_row(
                    &format!("SELECT {GROUP_COLUMNS} FROM expense_group WHERE id = ?1"),
                    params![group_id],
                    group_from_row,
                )
                .optional()?;
            Ok(group)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get group", e)))
    }

    fn get_group_by_name(&self, name: &str) -> DatabaseResult<Option<Group>> {
        let fn_impl = || {
            let group = self
                .connection
                .query_row(
                    &format!("SELECT {GROUP_COLUMNS} FROM expense_group WHERE name = ?1"),
                    params![name],
                    group_from_row,
                )
                .optional()?;
            Ok(group)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get group", e)))
    }

    fn add_group_members(&mut self, group_id: GroupId, user_ids: &[UserId]) -> DatabaseResult<()> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            {
                let mut insert_member_stmt = tx.prepare_cached(
                    "INSERT OR IGNORE INTO group_member (group_id, user_id) VALUES (?1, ?2)",
                )?;
                // It's unclear how to use an IN clause, so we use a loop
                // https://github.com/rusqlite/rusqlite/issues/345
                for user_id in user_ids {
                    insert_member_stmt.execute(params![group_id, user_id])?;
                }
            }

            tx.commit()?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot add group members", e)))
    }

    fn remove_group_member(&mut self, group_id: GroupId, user_id: UserId) -> DatabaseResult<()> {
        debug!("Removing user {user_id} from group {group_id}");
        let fn_impl = || {
            self.connection.execute(
                "DELETE FROM group_member WHERE group_id = ?1 AND user_id = ?2",
                params![group_id, user_id],
            )?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot remove group member", e)))
    }

    fn get_group_members(&self, group_id: GroupId) -> DatabaseResult<Vec<User>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT u.id, u.name, u.payment_account FROM app_user u
                 INNER JOIN group_member gm ON gm.user_id = u.id
                 WHERE gm.group_id = ?1
                 ORDER BY u.name",
            )?;

            let member_iter = stmt.query_map(params![group_id], user_from_row)?;

            let members = member_iter.collect::<Result<_, _>>()?;
            Ok(members)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get group members", e)))
    }

    fn get_groups_of_user(&self, user_id: UserId) -> DatabaseResult<Vec<Group>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT g.id, g.name, g.creator_id FROM expense_group g
                 INNER JOIN group_member gm ON gm.group_id = g.id
                 WHERE gm.user_id = ?1
                 ORDER BY g.name",
            )?;

            let group_iter = stmt.query_map(params![user_id], group_from_row)?;

            let groups = group_iter.collect::<Result<_, _>>()?;
            Ok(groups)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get groups", e)))
    }

    fn create_bill(&mut self, bill: NewBill) -> DatabaseResult<Bill> {
        let fn_impl = || {
            let id: i64 = self.connection.query_row(
                "INSERT INTO bill (creator_id, group_id, total, status, receipt_image, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
                params![
                    bill.creator_id,
                    bill.group_id,
                    bill.total.minor_units(),
                    BillStatus::Pending.as_str(),
                    bill.receipt_image,
                    bill.description,
                ],
                |row| row.get(0),
            )?;

            debug!("bill_id is {id}");

            Ok(Bill {
                id,
                creator_id: bill.creator_id,
                group_id: bill.group_id,
                total: bill.total,
                status: BillStatus::Pending,
                receipt_image: bill.receipt_image.clone(),
                description: bill.description.clone(),
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot create bill", e)))
    }

    fn get_bill(&self, bill_id: BillId) -> DatabaseResult<Option<Bill>> {
        let fn_impl = || {
            let bill = self
                .connection
                .query_row(
                    &format!("SELECT {BILL_COLUMNS} FROM bill WHERE id = ?1"),
                    params![bill_id],
                    BillRow::from_row,
                )
                .optional()?;

            match bill {
                Some(bill) => Ok(Some(bill.into_bill()?)),
                None => Ok(None),
            }
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get bill", e)))
    }

    fn get_completed_bills(&self, group_id: GroupId) -> DatabaseResult<Vec<Bill>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(&format!(
                "SELECT {BILL_COLUMNS} FROM bill
                 WHERE group_id = ?1 AND status = ?2
                 ORDER BY id"
            ))?;

            let bill_iter = stmt.query_map(
                params![group_id, BillStatus::Completed.as_str()],
                BillRow::from_row,
            )?;

            let rows: Vec<BillRow> = bill_iter.collect::<Result<_, _>>()?;
            let bills = rows
                .into_iter()
                .map(BillRow::into_bill)
                .collect::<Result<_, _>>()?;
            Ok(bills)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get completed bills", e)))
    }

    fn add_bill_items(
        &mut self,
        bill_id: BillId,
        items: &[ParsedItem],
    ) -> DatabaseResult<Vec<BillItem>> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            let mut result = Vec::with_capacity(items.len());
            {
                let mut insert_item_stmt = tx.prepare_cached(
                    "INSERT INTO bill_item (bill_id, name, price, quantity)
                     VALUES (?1, ?2, ?3, ?4) RETURNING id",
                )?;
                for item in items {
                    let item_id: i64 = insert_item_stmt.query_row(
                        params![bill_id, item.name, item.price.minor_units(), item.quantity],
                        |row| row.get(0),
                    )?;
                    result.push(BillItem::new(
                        item_id,
                        bill_id,
                        &item.name,
                        item.price,
                        item.quantity,
                    ));
                }
            }

            tx.execute(
                "UPDATE bill SET updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                params![bill_id],
            )?;

            tx.commit()?;

            Ok(result)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot add bill items", e)))
    }

    fn get_bill_items(&self, bill_id: BillId) -> DatabaseResult<Vec<BillItem>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(&format!(
                "SELECT {ITEM_COLUMNS} FROM bill_item WHERE bill_id = ?1 ORDER BY id"
            ))?;

            let item_iter = stmt.query_map(params![bill_id], item_from_row)?;

            let items = item_iter.collect::<Result<_, _>>()?;
            Ok(items)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get bill items", e)))
    }

    fn get_item(&self, item_id: ItemId) -> DatabaseResult<Option<BillItem>> {
        let fn_impl = || {
            let item = self
                .connection
                .query_row(
                    &format!("SELECT {ITEM_COLUMNS} FROM bill_item WHERE id = ?1"),
                    params![item_id],
                    item_from_row,
                )
                .optional()?;
            Ok(item)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get item", e)))
    }

    fn remove_bill_item(&mut self, item_id: ItemId) -> DatabaseResult<()> {
        debug!("Removing item {item_id}");
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            tx.execute(
                "DELETE FROM item_assignment WHERE item_id = ?1",
                params![item_id],
            )?;
            let num_deleted_rows =
                tx.execute("DELETE FROM bill_item WHERE id = ?1", params![item_id])?;
            if num_deleted_rows == 0 {
                return Err(DatabaseError::not_found(format!("item {item_id}")).into());
            }

            tx.commit()?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot remove bill item", e)))
    }

    fn set_receipt_image(&mut self, bill_id: BillId, image: &str) -> DatabaseResult<()> {
        let fn_impl = || {
            let num_updated_rows = self.connection.execute(
                "UPDATE bill SET receipt_image = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                params![bill_id, image],
            )?;
            if num_updated_rows == 0 {
                return Err(DatabaseError::not_found(format!("bill {bill_id}")).into());
            }

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot set receipt image", e)))
    }

    fn set_item_assignments(
        &mut self,
        item_id: ItemId,
        assignments: &[ItemAssignment],
    ) -> DatabaseResult<()> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            tx.execute(
                "DELETE FROM item_assignment WHERE item_id = ?1",
                params![item_id],
            )?;

            {
                let mut insert_assignment_stmt = tx.prepare_cached(
                    "INSERT INTO item_assignment (item_id, user_id, share_percentage)
                     VALUES (?1, ?2, ?3)",
                )?;
                for assignment in assignments {
                    insert_assignment_stmt.execute(params![
                        item_id,
                        assignment.user_id,
                        assignment.share_percentage
                    ])?;
                }
            }

            tx.commit()?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot set item assignments", e)))
    }

    fn get_bill_assignments(&self, bill_id: BillId) -> DatabaseResult<Vec<ItemAssignment>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT a.item_id, a.user_id, a.share_percentage FROM item_assignment a
                 INNER JOIN bill_item i ON a.item_id = i.id
                 WHERE i.bill_id = ?1
                 ORDER BY a.id",
            )?;

            let assignment_iter = stmt.query_map(params![bill_id], |row| {
                Ok(ItemAssignment::new(row.get(0)?, row.get(1)?, row.get(2)?))
            })?;

            let assignments = assignment_iter.collect::<Result<_, _>>()?;
            Ok(assignments)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get bill assignments", e)))
    }

    fn complete_bill(
        &mut self,
        bill_id: BillId,
        entry: NewLedgerEntry,
    ) -> DatabaseResult<LedgerEntry> {
        debug!("Completing bill {bill_id}");
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            let num_updated_rows = tx.execute(
                "UPDATE bill SET status = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?1 AND status = ?3",
                params![
                    bill_id,
                    BillStatus::Completed.as_str(),
                    BillStatus::Pending.as_str()
                ],
            )?;
            if num_updated_rows == 0 {
                return Err(DatabaseError::not_found(format!("pending bill {bill_id}")).into());
            }

            let entry = insert_ledger_entry(&tx, entry.clone())?;

            tx.commit()?;

            Ok(entry)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot complete bill", e)))
    }

    fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> DatabaseResult<LedgerEntry> {
        let fn_impl = || Ok(insert_ledger_entry(&self.connection, entry.clone())?);

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot append ledger entry", e)))
    }

    fn get_ledger_entries(&self, group_id: GroupId) -> DatabaseResult<Vec<LedgerEntry>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(&format!(
                "SELECT {ENTRY_COLUMNS} FROM ledger_entry
                 WHERE group_id = ?1
                 ORDER BY created_at, id"
            ))?;

            let entry_iter = stmt.query_map(params![group_id], EntryRow::from_row)?;

            let rows: Vec<EntryRow> = entry_iter.collect::<Result<_, _>>()?;
            let entries = rows
                .into_iter()
                .map(EntryRow::into_entry)
                .collect::<Result<_, _>>()?;
            Ok(entries)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get ledger entries", e)))
    }

    fn get_ledger_entries_with_limit(
        &self,
        group_id: GroupId,
        limit: usize,
    ) -> DatabaseResult<Vec<LedgerEntry>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(&format!(
                "SELECT {ENTRY_COLUMNS} FROM ledger_entry
                 WHERE group_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            ))?;

            let entry_iter =
                stmt.query_map(params![group_id, limit as i64], EntryRow::from_row)?;

            let rows: Vec<EntryRow> = entry_iter.collect::<Result<_, _>>()?;
            let entries = rows
                .into_iter()
                .map(EntryRow::into_entry)
                .collect::<Result<_, _>>()?;
            Ok(entries)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get latest ledger entries", e)))
    }

    fn get_group_total_spent(&self, group_id: GroupId) -> DatabaseResult<Money> {
        let fn_impl = || {
            let total: i64 = self.connection.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger_entry
                 WHERE group_id = ?1 AND entry_type = 'expense'",
                params![group_id],
                |row| row.get(0),
            )?;
            Ok(Money::from_minor(total))
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get group total", e)))
    }
}

fn insert_ledger_entry(
    connection: &Connection,
    entry: NewLedgerEntry,
) -> rusqlite::Result<LedgerEntry> {
    let created_at = Utc::now();
    let id: i64 = connection.query_row(
        "INSERT INTO ledger_entry
         (group_id, entry_type, payer_id, recipient_id, bill_id, amount, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING id",
        params![
            entry.group_id,
            entry.kind.type_name(),
            entry.payer_id,
            entry.kind.recipient_id(),
            entry.kind.bill_id(),
            entry.amount.minor_units(),
            entry.description,
            created_at,
        ],
        |row| row.get(0),
    )?;

    debug!("Appended {} entry {id} to group {}", entry.kind.type_name(), entry.group_id);

    Ok(LedgerEntry::from_new(id, entry, created_at))
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        payment_account: row.get(2)?,
    })
}

fn group_from_row(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        creator_id: row.get(2)?,
    })
}

fn item_from_row(row: &Row) -> rusqlite::Result<BillItem> {
    Ok(BillItem {
        id: row.get(0)?,
        bill_id: row.get(1)?,
        name: row.get(2)?,
        price: Money::from_minor(row.get(3)?),
        quantity: row.get(4)?,
    })
}

struct BillRow {
    id: i64,
    creator_id: i64,
    group_id: Option<i64>,
    total: i64,
    status: String,
    receipt_image: Option<String>,
    description: Option<String>,
}

impl BillRow {
    fn from_row(row: &Row) -> rusqlite::Result<BillRow> {
        Ok(BillRow {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            group_id: row.get(2)?,
            total: row.get(3)?,
            status: row.get(4)?,
            receipt_image: row.get(5)?,
            description: row.get(6)?,
        })
    }

    fn into_bill(self) -> Result<Bill, DatabaseError> {
        let status = BillStatus::parse(&self.status).ok_or_else(|| {
            DatabaseError::corrupted(format!("bill {} has status `{}`", self.id, self.status))
        })?;
        Ok(Bill {
            id: self.id,
            creator_id: self.creator_id,
            group_id: self.group_id,
            total: Money::from_minor(self.total),
            status,
            receipt_image: self.receipt_image,
            description: self.description,
        })
    }
}

struct EntryRow {
    id: i64,
    group_id: i64,
    entry_type: String,
    payer_id: i64,
    recipient_id: Option<i64>,
    bill_id: Option<i64>,
    amount: i64,
    description: String,
    created_at: DateTime<Utc>,
}

impl EntryRow {
    fn from_row(row: &Row) -> rusqlite::Result<EntryRow> {
        Ok(EntryRow {
            id: row.get(0)?,
            group_id: row.get(1)?,
            entry_type: row.get(2)?,
            payer_id: row.get(3)?,
            recipient_id: row.get(4)?,
            bill_id: row.get(5)?,
            amount: row.get(6)?,
            description: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<LedgerEntry, DatabaseError> {
        let kind = match (self.entry_type.as_str(), self.bill_id, self.recipient_id) {
            ("expense", Some(bill_id), _) => EntryKind::Expense { bill_id },
            ("payment", _, Some(recipient_id)) => EntryKind::Payment { recipient_id },
            ("settlement", _, Some(recipient_id)) => EntryKind::Settlement { recipient_id },
            _ => {
                return Err(DatabaseError::corrupted(format!(
                    "ledger entry {} of type `{}` is incomplete",
                    self.id, self.entry_type
                )))
            }
        };
        Ok(LedgerEntry {
            id: self.id,
            group_id: self.group_id,
            payer_id: self.payer_id,
            amount: Money::from_minor(self.amount),
            description: self.description,
            kind,
            created_at: self.created_at,
        })
    }
}

fn map_error<T: AsRef<str>>(message: T, e: anyhow::Error) -> DatabaseError {
    match e.downcast::<DatabaseError>() {
        Ok(e) => e,
        Err(e) => DatabaseError::new(message, e),
    }
}
