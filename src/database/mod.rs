//! Persistence of users, groups, bills and ledger entries.

use crate::{
    error::DatabaseError,
    money::Money,
    types::{
        Bill, BillId, BillItem, Group, GroupId, ItemAssignment, ItemId, LedgerEntry, NewBill,
        NewLedgerEntry, ParsedItem, User, UserId,
    },
};

type DatabaseResult<T> = Result<T, DatabaseError>;

pub mod sqlite;

/// This trait abstracts over the type of database.
///
/// The implementation could save the data in any suitable database or even in memory.
/// Ledger entries are append-only: there is no way to update or delete them.
pub trait Database {
    /// Create a user and return it as stored.
    ///
    /// Names are unique; creating a user with an existing name is an error.
    fn create_user(&mut self, name: &str, payment_account: Option<&str>) -> DatabaseResult<User>;

    fn get_user(&self, user_id: UserId) -> DatabaseResult<Option<User>>;

    fn get_user_by_name(&self, name: &str) -> DatabaseResult<Option<User>>;

    /// Create a group owned by *creator_id*, who also becomes its first member.
    fn create_group(&mut self, name: &str, creator_id: UserId) -> DatabaseResult<Group>;

    fn get_group(&self, group_id: GroupId) -> DatabaseResult<Option<Group>>;

    fn get_group_by_name(&self, name: &str) -> DatabaseResult<Option<Group>>;

    /// Add the given users to a group.
    ///
    /// Users that are already members are ignored.
    fn add_group_members(&mut self, group_id: GroupId, user_ids: &[UserId]) -> DatabaseResult<()>;

    /// Remove a user from a group. If the user is not a member, it is a no-op.
    fn remove_group_member(&mut self, group_id: GroupId, user_id: UserId) -> DatabaseResult<()>;

    /// Get the members of a group, ordered by name.
    fn get_group_members(&self, group_id: GroupId) -> DatabaseResult<Vec<User>>;

    /// Get the groups the given user is a member of, ordered by name.
    fn get_groups_of_user(&self, user_id: UserId) -> DatabaseResult<Vec<Group>>;

    /// Create a pending bill.
    fn create_bill(&mut self, bill: NewBill) -> DatabaseResult<Bill>;

    fn get_bill(&self, bill_id: BillId) -> DatabaseResult<Option<Bill>>;

    /// Get the bills of a group that have been finalized into the ledger.
    fn get_completed_bills(&self, group_id: GroupId) -> DatabaseResult<Vec<Bill>>;

    /// Add items to a bill and return them with their IDs, in the same order.
    fn add_bill_items(&mut self, bill_id: BillId, items: &[ParsedItem])
        -> DatabaseResult<Vec<BillItem>>;

    /// Get the items of a bill, ordered by ID.
    fn get_bill_items(&self, bill_id: BillId) -> DatabaseResult<Vec<BillItem>>;

    fn get_item(&self, item_id: ItemId) -> DatabaseResult<Option<BillItem>>;

    /// Delete an item together with its assignments.
    fn remove_bill_item(&mut self, item_id: ItemId) -> DatabaseResult<()>;

    fn set_receipt_image(&mut self, bill_id: BillId, image: &str) -> DatabaseResult<()>;

    /// Replace all assignments of an item with the given ones.
    ///
    /// The replacement is atomic: either all new assignments are stored or
    /// the old ones are kept.
    fn set_item_assignments(
        &mut self,
        item_id: ItemId,
        assignments: &[ItemAssignment],
    ) -> DatabaseResult<()>;

    /// Get the assignments of all items of a bill, in insertion order.
    fn get_bill_assignments(&self, bill_id: BillId) -> DatabaseResult<Vec<ItemAssignment>>;

    /// Append an expense entry for *bill_id* and mark the bill as completed,
    /// in a single transaction.
    ///
    /// Fails if the bill is not pending anymore.
    fn complete_bill(
        &mut self,
        bill_id: BillId,
        entry: NewLedgerEntry,
    ) -> DatabaseResult<LedgerEntry>;

    /// Append an entry to the ledger of its group and return it as stored.
    fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> DatabaseResult<LedgerEntry>;

    /// Get all ledger entries of a group, ordered by creation time.
    fn get_ledger_entries(&self, group_id: GroupId) -> DatabaseResult<Vec<LedgerEntry>>;

    /// Get the latest *limit* ledger entries of a group, newest first.
    fn get_ledger_entries_with_limit(
        &self,
        group_id: GroupId,
        limit: usize,
    ) -> DatabaseResult<Vec<LedgerEntry>>;

    /// Sum of the expense entries recorded in a group.
    fn get_group_total_spent(&self, group_id: GroupId) -> DatabaseResult<Money>;
}
