//! Checks on bills, items and payments.

use crate::error::InputError;
use crate::money::Money;
use crate::types::{Bill, BillItem, Group, GroupId, ParsedItem, ParsedShare, User, UserId};

/// A bill must have a positive total.
pub fn validate_new_bill(total: Money) -> Result<(), InputError> {
    if total.is_positive() {
        Ok(())
    } else {
        Err(InputError::NonPositiveAmount)
    }
}

pub fn validate_item(item: &ParsedItem) -> Result<(), InputError> {
    if item.quantity == 0 {
        Err(InputError::InvalidQuantity)
    } else if item.price.is_negative() {
        Err(InputError::NonPositiveAmount)
    } else {
        Ok(())
    }
}

/// Some sanity checks on a bill before it is written to the ledger.
///
/// List of checks:
/// - the bill is still pending
/// - the bill belongs to a group
/// - the bill has at least one item
///
/// Share and total checks are done when the bill is resolved.
pub fn validate_bill_can_be_finalized(
    bill: &Bill,
    items: &[BillItem],
) -> Result<GroupId, InputError> {
    if !bill.is_pending() {
        return Err(InputError::BillAlreadyCompleted(bill.id));
    }
    let group_id = bill.group_id.ok_or(InputError::BillWithoutGroup(bill.id))?;
    if items.is_empty() {
        return Err(InputError::BillWithoutItems(bill.id));
    }
    Ok(group_id)
}

/// When a bill belongs to a group, only members can be assigned its items.
pub fn validate_assignees(
    shares: &[ParsedShare],
    members: Option<(&Group, &[User])>,
) -> Result<(), InputError> {
    if let Some((group, members)) = members {
        for share in shares {
            if !members.iter().any(|m| m.name == share.user_name) {
                return Err(InputError::not_a_member(&share.user_name, &group.name));
            }
        }
    }
    Ok(())
}

pub fn validate_payment(
    payer_id: UserId,
    recipient_id: UserId,
    amount: Money,
) -> Result<(), InputError> {
    if !amount.is_positive() {
        Err(InputError::NonPositiveAmount)
    } else if payer_id == recipient_id {
        Err(InputError::SelfPayment)
    } else {
        Ok(())
    }
}

/// The creator is the member a group can never lose.
pub fn validate_member_removal(group: &Group, user_id: UserId) -> Result<(), InputError> {
    if group.creator_id == user_id {
        Err(InputError::CannotRemoveCreator(group.name.clone()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::BillStatus;

    use super::*;

    fn make_bill(group_id: Option<GroupId>, status: BillStatus) -> Bill {
        Bill {
            id: 3,
            creator_id: 1,
            group_id,
            total: Money::from_minor(500),
            status,
            receipt_image: None,
            description: None,
        }
    }

    fn make_user(id: UserId, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            payment_account: None,
        }
    }

    #[test]
    fn test_validate_bill_can_be_finalized() {
        let items = vec![BillItem::new(1, 3, "Rice", Money::from_minor(500), 1)];

        let bill = make_bill(Some(9), BillStatus::Pending);
        assert_eq!(validate_bill_can_be_finalized(&bill, &items).ok(), Some(9));

        let bill = make_bill(Some(9), BillStatus::Completed);
        assert!(matches!(
            validate_bill_can_be_finalized(&bill, &items),
            Err(InputError::BillAlreadyCompleted(3))
        ));

        let bill = make_bill(None, BillStatus::Pending);
        assert!(matches!(
            validate_bill_can_be_finalized(&bill, &items),
            Err(InputError::BillWithoutGroup(3))
        ));

        let bill = make_bill(Some(9), BillStatus::Pending);
        assert!(matches!(
            validate_bill_can_be_finalized(&bill, &[]),
            Err(InputError::BillWithoutItems(3))
        ));
    }

    #[test]
    fn test_validate_item() {
        assert!(validate_item(&ParsedItem::new("Rice", Money::from_minor(500), 1)).is_ok());
        assert!(validate_item(&ParsedItem::new("Water", Money::ZERO, 1)).is_ok());
        assert!(validate_item(&ParsedItem::new("Rice", Money::from_minor(500), 0)).is_err());
        assert!(validate_item(&ParsedItem::new("Rice", Money::from_minor(-1), 1)).is_err());
    }

    #[test]
    fn test_validate_assignees() {
        let group = Group {
            id: 1,
            name: "flat".to_string(),
            creator_id: 1,
        };
        let members = vec![make_user(1, "alice"), make_user(2, "bob")];
        let shares = vec![ParsedShare::new("alice", 50), ParsedShare::new("bob", 50)];
        assert!(validate_assignees(&shares, Some((&group, &members))).is_ok());

        let shares = vec![ParsedShare::new("alice", 50), ParsedShare::new("carol", 50)];
        assert!(matches!(
            validate_assignees(&shares, Some((&group, &members))),
            Err(InputError::NotAMember(..))
        ));
        assert!(validate_assignees(&shares, None).is_ok());
    }

    #[test]
    fn test_validate_payment() {
        assert!(validate_payment(1, 2, Money::from_minor(100)).is_ok());
        assert!(matches!(
            validate_payment(1, 1, Money::from_minor(100)),
            Err(InputError::SelfPayment)
        ));
        assert!(matches!(
            validate_payment(1, 2, Money::ZERO),
            Err(InputError::NonPositiveAmount)
        ));
    }

    #[test]
    fn test_validate_member_removal() {
        let group = Group {
            id: 1,
            name: "flat".to_string(),
            creator_id: 1,
        };
        assert!(validate_member_removal(&group, 1).is_err());
        assert!(validate_member_removal(&group, 2).is_ok());
    }
}
