//! Role-based visibility and the "paid by" labels a user may use.
//!
//! Staff see every invoice. Any other user is confined to the point of sale
//! assigned to them; without an assignment they see nothing at all.

use crate::models::{PointOfSale, User};
use serde::Serialize;
use service_core::error::AppError;
use thiserror::Error;

/// Payer label for payments made by the central office.
pub const OFFICE_LABEL: &str = "OFICINA";

const POS_LABEL_PREFIX: &str = "PDV - ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "point_of_sale_id", rename_all = "snake_case")]
pub enum AccessScope {
    All,
    PointOfSale(i64),
    Nothing,
}

impl AccessScope {
    pub fn allows(&self, pos_id: i64) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::PointOfSale(own) => *own == pos_id,
            AccessScope::Nothing => false,
        }
    }

    /// SQL bind values: `visible` gates the whole query, `pos_id` narrows it.
    pub fn filter(&self) -> ScopeFilter {
        match self {
            AccessScope::All => ScopeFilter {
                visible: true,
                pos_id: None,
            },
            AccessScope::PointOfSale(id) => ScopeFilter {
                visible: true,
                pos_id: Some(*id),
            },
            AccessScope::Nothing => ScopeFilter {
                visible: false,
                pos_id: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFilter {
    pub visible: bool,
    pub pos_id: Option<i64>,
}

impl ScopeFilter {
    /// Unrestricted lookup, for internal reads and public confirmations.
    pub fn everything() -> Self {
        AccessScope::All.filter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayerLabelError {
    #[error("Invalid 'paid by' selection")]
    Invalid,
    #[error("Not allowed to register payments on behalf of another point of sale")]
    NotAllowed,
}

impl From<PayerLabelError> for AppError {
    fn from(err: PayerLabelError) -> Self {
        match err {
            PayerLabelError::Invalid => AppError::bad_request(err),
            PayerLabelError::NotAllowed => AppError::forbidden(err),
        }
    }
}

/// The authenticated user together with their assigned point of sale.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
    pub point_of_sale: Option<PointOfSale>,
}

impl Viewer {
    pub fn from_user(user: &User, point_of_sale: Option<PointOfSale>) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            point_of_sale,
        }
    }

    pub fn scope(&self) -> AccessScope {
        if self.is_staff {
            return AccessScope::All;
        }
        match &self.point_of_sale {
            Some(pos) => AccessScope::PointOfSale(pos.pos_id),
            None => AccessScope::Nothing,
        }
    }

    /// Labels offered in the "paid by" selector, office first.
    pub fn payer_options(&self, all_pos: &[PointOfSale]) -> Vec<String> {
        if self.is_staff {
            let mut names: Vec<&PointOfSale> = all_pos.iter().collect();
            names.sort_by(|a, b| a.name.cmp(&b.name));
            return std::iter::once(OFFICE_LABEL.to_string())
                .chain(names.into_iter().map(PointOfSale::payer_label))
                .collect();
        }
        match &self.point_of_sale {
            Some(pos) => vec![OFFICE_LABEL.to_string(), pos.payer_label()],
            None => Vec::new(),
        }
    }

    /// Preselected label: the given point of sale for staff, the user's own
    /// point of sale otherwise.
    pub fn default_payer(&self, invoice_pos: Option<&PointOfSale>) -> Option<String> {
        if self.is_staff {
            return invoice_pos.map(PointOfSale::payer_label);
        }
        self.point_of_sale.as_ref().map(PointOfSale::payer_label)
    }

    pub fn validate_payer_label(
        &self,
        label: &str,
        all_pos: &[PointOfSale],
    ) -> Result<String, PayerLabelError> {
        let label = label.trim();
        if label == OFFICE_LABEL {
            return Ok(label.to_string());
        }

        if self.is_staff {
            let name = label
                .strip_prefix(POS_LABEL_PREFIX)
                .ok_or(PayerLabelError::Invalid)?;
            let exists = all_pos
                .iter()
                .any(|pos| pos.name.to_lowercase() == name.to_lowercase());
            return if exists {
                Ok(label.to_string())
            } else {
                Err(PayerLabelError::Invalid)
            };
        }

        match &self.point_of_sale {
            Some(pos) if pos.payer_label() == label => Ok(label.to_string()),
            _ => Err(PayerLabelError::NotAllowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(id: i64, name: &str) -> PointOfSale {
        PointOfSale {
            pos_id: id,
            name: name.to_string(),
            city: "Bogotá".to_string(),
            user_id: None,
        }
    }

    fn staff() -> Viewer {
        Viewer {
            user_id: 1,
            username: "admin".to_string(),
            is_staff: true,
            point_of_sale: None,
        }
    }

    fn cashier(point_of_sale: Option<PointOfSale>) -> Viewer {
        Viewer {
            user_id: 2,
            username: "caja".to_string(),
            is_staff: false,
            point_of_sale,
        }
    }

    #[test]
    fn scope_follows_role_and_assignment() {
        assert_eq!(staff().scope(), AccessScope::All);
        assert_eq!(
            cashier(Some(pos(7, "Usaquén"))).scope(),
            AccessScope::PointOfSale(7)
        );
        assert_eq!(cashier(None).scope(), AccessScope::Nothing);
    }

    #[test]
    fn unassigned_user_sees_nothing() {
        let scope = cashier(None).scope();
        assert!(!scope.allows(1));
        assert!(!scope.filter().visible);
    }

    #[test]
    fn assigned_user_only_sees_own_pos() {
        let scope = cashier(Some(pos(7, "Usaquén"))).scope();
        assert!(scope.allows(7));
        assert!(!scope.allows(8));
        assert_eq!(
            scope.filter(),
            ScopeFilter {
                visible: true,
                pos_id: Some(7)
            }
        );
    }

    #[test]
    fn staff_options_list_office_then_every_pos_by_name() {
        let all = vec![pos(2, "Zona T"), pos(1, "Chapinero")];
        assert_eq!(
            staff().payer_options(&all),
            vec!["OFICINA", "PDV - Chapinero", "PDV - Zona T"]
        );
    }

    #[test]
    fn cashier_options_are_office_and_own_pos() {
        let all = vec![pos(2, "Zona T"), pos(1, "Chapinero")];
        assert_eq!(
            cashier(Some(pos(1, "Chapinero"))).payer_options(&all),
            vec!["OFICINA", "PDV - Chapinero"]
        );
        assert!(cashier(None).payer_options(&all).is_empty());
    }

    #[test]
    fn staff_may_use_any_existing_pos_case_insensitively() {
        let all = vec![pos(1, "Chapinero")];
        assert_eq!(
            staff().validate_payer_label("PDV - CHAPINERO", &all),
            Ok("PDV - CHAPINERO".to_string())
        );
        assert_eq!(
            staff().validate_payer_label("PDV - Suba", &all),
            Err(PayerLabelError::Invalid)
        );
        assert_eq!(
            staff().validate_payer_label("Caja menor", &all),
            Err(PayerLabelError::Invalid)
        );
    }

    #[test]
    fn cashier_cannot_pay_on_behalf_of_another_pos() {
        let all = vec![pos(1, "Chapinero"), pos(2, "Zona T")];
        let viewer = cashier(Some(pos(1, "Chapinero")));
        assert_eq!(
            viewer.validate_payer_label("OFICINA", &all),
            Ok("OFICINA".to_string())
        );
        assert_eq!(
            viewer.validate_payer_label("PDV - Chapinero", &all),
            Ok("PDV - Chapinero".to_string())
        );
        assert_eq!(
            viewer.validate_payer_label("PDV - Zona T", &all),
            Err(PayerLabelError::NotAllowed)
        );
    }

    #[test]
    fn default_payer_uses_invoice_pos_for_staff() {
        let centro = pos(3, "Centro");
        assert_eq!(
            staff().default_payer(Some(&centro)),
            Some("PDV - Centro".to_string())
        );
        assert_eq!(
            cashier(Some(pos(1, "Chapinero"))).default_payer(Some(&centro)),
            Some("PDV - Chapinero".to_string())
        );
    }

    #[test]
    fn payer_label_errors_map_to_http_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            AppError::from(PayerLabelError::Invalid).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(PayerLabelError::NotAllowed).status(),
            StatusCode::FORBIDDEN
        );
    }
}
