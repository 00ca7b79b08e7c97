//! Parse money amounts typed by the user.

use std::{cmp::Ordering, iter::repeat, num::ParseIntError};

use nom::{
    character::complete::multispace0, combinator::map_res, sequence::preceded, AsChar, IResult,
    InputTakeAtPosition,
};

use crate::money::Money;

/// Parse an amount in major units into [`Money`].
///
/// Both `.` and `,` are accepted as decimal separator. The fractional part is
/// padded or truncated to two digits, so `12.5` is 1250 and `12.345` is 1234.
pub fn parse_amount(s: &str) -> IResult<&str, Money> {
    fn do_parse(x: &str) -> Result<Money, AmountError> {
        if !x.chars().any(|c| c.is_ascii_digit()) {
            return Err(AmountError::NotANumber);
        }
        let components: Vec<_> = x.split(&[',', '.']).collect();
        let minor_units = match components.len() {
            1 => (components[0].to_string() + &make_string_of_char('0', 2)).parse::<i64>()?,
            2 => {
                let integer_part = components[0].to_string();
                let fractional_part = components[1].to_string();

                let fractional_part_len = fractional_part.len();
                let fractional_part = match fractional_part_len.cmp(&2) {
                    Ordering::Less => {
                        fractional_part + &make_string_of_char('0', 2 - fractional_part_len)
                    }
                    Ordering::Greater => fractional_part[0..2].to_string(),
                    Ordering::Equal => fractional_part,
                };
                (integer_part + &fractional_part).parse::<i64>()?
            }
            _ => return Err(AmountError::TooManySeparators),
        };
        Ok(Money::from_minor(minor_units))
    }

    preceded(multispace0, map_res(decimal1, do_parse))(s)
}

#[derive(Debug)]
enum AmountError {
    NotANumber,
    TooManySeparators,
}

impl From<ParseIntError> for AmountError {
    fn from(_: ParseIntError) -> Self {
        AmountError::NotANumber
    }
}

fn decimal1(s: &str) -> IResult<&str, &str> {
    s.split_at_position1_complete(
        |item| !item.is_dec_digit() && item != ',' && item != '.',
        nom::error::ErrorKind::Float,
    )
}

fn make_string_of_char(c: char, length: usize) -> String {
    repeat(c).take(length).collect::<String>()
}
