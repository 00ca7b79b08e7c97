use chrono::{DateTime, Utc};

use crate::money::Money;

pub type UserId = i64;
pub type GroupId = i64;
pub type BillId = i64;
pub type ItemId = i64;
pub type EntryId = i64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub payment_account: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub creator_id: UserId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BillStatus {
    Pending,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bill {
    pub id: BillId,
    pub creator_id: UserId,
    pub group_id: Option<GroupId>,
    pub total: Money,
    pub status: BillStatus,
    pub receipt_image: Option<String>,
    pub description: Option<String>,
}

/// A bill as entered by the user, before it gets an ID.
#[derive(Clone, Debug)]
pub struct NewBill {
    pub creator_id: UserId,
    pub group_id: Option<GroupId>,
    pub total: Money,
    pub receipt_image: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BillItem {
    pub id: ItemId,
    pub bill_id: BillId,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

/// A bill item parsed from user input or from a receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedItem {
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemAssignment {
    pub item_id: ItemId,
    pub user_id: UserId,
    pub share_percentage: u32,
}

/// An assignment parsed from user input: users are still referenced by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedShare {
    pub user_name: String,
    pub percentage: u32,
}

/// What a ledger entry records. Payments and settlements move money between
/// two members; an expense records that the payer covered a whole bill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Expense { bill_id: BillId },
    Payment { recipient_id: UserId },
    Settlement { recipient_id: UserId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub group_id: GroupId,
    pub payer_id: UserId,
    pub amount: Money,
    pub description: String,
    pub kind: EntryKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub group_id: GroupId,
    pub payer_id: UserId,
    pub amount: Money,
    pub description: String,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: UserId,
    pub to: UserId,
    pub amount: Money,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<BillStatus> {
        match s {
            "pending" => Some(BillStatus::Pending),
            "completed" => Some(BillStatus::Completed),
            _ => None,
        }
    }
}

impl Bill {
    pub fn is_pending(&self) -> bool {
        self.status == BillStatus::Pending
    }
}

impl NewBill {
    pub fn new(creator_id: UserId, group_id: Option<GroupId>, total: Money) -> NewBill {
        NewBill {
            creator_id,
            group_id,
            total,
            receipt_image: None,
            description: None,
        }
    }
}

impl BillItem {
    pub fn new(id: ItemId, bill_id: BillId, name: &str, price: Money, quantity: u32) -> BillItem {
        BillItem {
            id,
            bill_id,
            name: name.to_string(),
            price,
            quantity,
        }
    }
}

impl ParsedItem {
    pub fn new(name: &str, price: Money, quantity: u32) -> ParsedItem {
        ParsedItem {
            name: name.to_string(),
            price,
            quantity,
        }
    }
}

impl ItemAssignment {
    pub fn new(item_id: ItemId, user_id: UserId, share_percentage: u32) -> ItemAssignment {
        ItemAssignment {
            item_id,
            user_id,
            share_percentage,
        }
    }
}

impl ParsedShare {
    pub fn new(user_name: &str, percentage: u32) -> ParsedShare {
        ParsedShare {
            user_name: user_name.to_string(),
            percentage,
        }
    }
}

impl EntryKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Expense { .. } => "expense",
            EntryKind::Payment { .. } => "payment",
            EntryKind::Settlement { .. } => "settlement",
        }
    }

    pub fn bill_id(&self) -> Option<BillId> {
        match self {
            EntryKind::Expense { bill_id } => Some(*bill_id),
            _ => None,
        }
    }

    pub fn recipient_id(&self) -> Option<UserId> {
        match self {
            EntryKind::Payment { recipient_id } | EntryKind::Settlement { recipient_id } => {
                Some(*recipient_id)
            }
            EntryKind::Expense { .. } => None,
        }
    }
}

impl NewLedgerEntry {
    pub fn new_expense(
        group_id: GroupId,
        payer_id: UserId,
        amount: Money,
        bill_id: BillId,
        description: &str,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            group_id,
            payer_id,
            amount,
            description: description.to_string(),
            kind: EntryKind::Expense { bill_id },
        }
    }

    pub fn new_payment(
        group_id: GroupId,
        payer_id: UserId,
        recipient_id: UserId,
        amount: Money,
        description: &str,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            group_id,
            payer_id,
            amount,
            description: description.to_string(),
            kind: EntryKind::Payment { recipient_id },
        }
    }

    pub fn new_settlement(
        group_id: GroupId,
        payer_id: UserId,
        recipient_id: UserId,
        amount: Money,
        description: &str,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            group_id,
            payer_id,
            amount,
            description: description.to_string(),
            kind: EntryKind::Settlement { recipient_id },
        }
    }
}

impl LedgerEntry {
    pub fn from_new(id: EntryId, entry: NewLedgerEntry, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            group_id: entry.group_id,
            payer_id: entry.payer_id,
            amount: entry.amount,
            description: entry.description,
            kind: entry.kind,
            created_at,
        }
    }
}

impl Transfer {
    pub fn new(from: UserId, to: UserId, amount: Money) -> Transfer {
        Transfer { from, to, amount }
    }
}
