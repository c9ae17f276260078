pub mod access;
pub mod database;
pub mod email;
pub mod jwt;
pub mod metrics;
pub mod receipts;
pub mod reconciliation;
pub mod storage;
pub mod tokens;

pub use access::{AccessScope, PayerLabelError, ScopeFilter, Viewer, OFFICE_LABEL};
pub use database::Database;
pub use email::{mailer_from_config, Attachment, DisabledMailer, Mailer, OutgoingEmail, SmtpMailer};
pub use jwt::{AccessTokenClaims, JwtService, TokenResponse};
pub use receipts::{ReceiptError, ReceiptService};
pub use storage::{LocalStorage, Storage};
pub use tokens::{ConfirmationSubject, ConfirmationTokens, TokenError};
