//! Field-level checks for create and edit inputs.

use sew_schemas::{NewOrder, NewParty, NewSubOrder, Party};

use crate::WorkflowError;

pub const MAX_DESCRIPTION_LEN: usize = 255;

pub fn quantity(q: i32) -> Result<(), WorkflowError> {
    if q <= 0 {
        return Err(WorkflowError::validation(format!(
            "quantity must be > 0, got {q}"
        )));
    }
    Ok(())
}

pub fn order_price(price_cents: Option<i64>) -> Result<(), WorkflowError> {
    match price_cents {
        Some(p) if p < 0 => Err(WorkflowError::validation(format!(
            "order price must be >= 0, got {p}"
        ))),
        _ => Ok(()),
    }
}

pub fn bid_price(price_cents: i64) -> Result<(), WorkflowError> {
    if price_cents <= 0 {
        return Err(WorkflowError::validation(format!(
            "bid price must be > 0, got {price_cents}"
        )));
    }
    Ok(())
}

pub fn description(d: &str) -> Result<(), WorkflowError> {
    let d = d.trim();
    if d.is_empty() {
        return Err(WorkflowError::validation("description is required"));
    }
    if d.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(WorkflowError::validation(format!(
            "description longer than {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn required(field: &str, v: &str) -> Result<(), WorkflowError> {
    if v.trim().is_empty() {
        return Err(WorkflowError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn email(e: &str) -> Result<(), WorkflowError> {
    let e = e.trim();
    match e.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(WorkflowError::validation(format!("invalid email: {e:?}"))),
    }
}

fn capacity(c: Option<i32>) -> Result<(), WorkflowError> {
    match c {
        Some(c) if c < 0 => Err(WorkflowError::validation(format!(
            "capacity must be >= 0, got {c}"
        ))),
        _ => Ok(()),
    }
}

pub fn new_order(o: &NewOrder) -> Result<(), WorkflowError> {
    description(&o.description)?;
    quantity(o.quantity)?;
    required("address", &o.address)?;
    order_price(o.price_cents)
}

pub fn new_sub_order(s: &NewSubOrder) -> Result<(), WorkflowError> {
    quantity(s.quantity)
}

pub fn new_party(p: &NewParty) -> Result<(), WorkflowError> {
    required("name", &p.name)?;
    email(&p.email)?;
    capacity(p.capacity)
}

/// Re-check a registry row after an edit.
pub fn party(p: &Party) -> Result<(), WorkflowError> {
    required("name", &p.name)?;
    email(&p.email)?;
    capacity(p.capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sew_schemas::{ClientId, PartyRole};

    fn order() -> NewOrder {
        NewOrder {
            client: ClientId::new(1),
            description: "wedding dresses".to_string(),
            quantity: 4,
            deadline_utc: Utc::now(),
            address: "3 quai du Port".to_string(),
            product: None,
            price_cents: Some(0),
        }
    }

    #[test]
    fn accepts_a_well_formed_order() {
        assert!(new_order(&order()).is_ok());
    }

    #[test]
    fn rejects_bad_order_fields() {
        let mut o = order();
        o.quantity = 0;
        assert!(new_order(&o).is_err());

        let mut o = order();
        o.price_cents = Some(-1);
        assert!(new_order(&o).is_err());

        let mut o = order();
        o.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(new_order(&o).is_err());

        let mut o = order();
        o.address = "   ".to_string();
        let err = new_order(&o).unwrap_err();
        assert_eq!(err, WorkflowError::validation("address is required"));
    }

    #[test]
    fn bid_price_must_be_positive() {
        assert!(bid_price(1).is_ok());
        assert!(bid_price(0).is_err());
    }

    #[test]
    fn party_email_needs_both_halves() {
        let mut p = NewParty {
            role: PartyRole::Workshop,
            name: "Atelier Lune".to_string(),
            email: "lune@".to_string(),
            phone: None,
            address: None,
            store_name: None,
            notes: None,
            capacity: Some(40),
        };
        assert!(new_party(&p).is_err());
        p.email = "contact@lune.fr".to_string();
        assert!(new_party(&p).is_ok());
    }
}
